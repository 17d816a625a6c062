use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS developers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(100) NOT NULL UNIQUE,
        skills TEXT NOT NULL DEFAULT '[]',
        workload INTEGER NOT NULL DEFAULT 0,
        status VARCHAR(20) NOT NULL DEFAULT 'Active',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS bugs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title VARCHAR(255) NOT NULL,
        description TEXT NOT NULL,
        severity VARCHAR(20) NOT NULL,
        predicted_severity VARCHAR(20),
        confidence_score REAL,
        status VARCHAR(20) NOT NULL DEFAULT 'Open',
        source VARCHAR(100) NOT NULL DEFAULT 'Manual',
        assigned_developer_id INTEGER,
        assigned_developer VARCHAR(100),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (assigned_developer_id) REFERENCES developers(id) ON DELETE SET NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_bugs_severity ON bugs (severity)",
    "CREATE INDEX IF NOT EXISTS idx_bugs_status ON bugs (status)",
    "CREATE INDEX IF NOT EXISTS idx_bugs_source ON bugs (source)",
    "CREATE INDEX IF NOT EXISTS idx_bugs_created_at ON bugs (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_bugs_developer ON bugs (assigned_developer_id)",
    "
    CREATE TABLE IF NOT EXISTS predictions_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        bug_id INTEGER NOT NULL,
        model_version VARCHAR(50) NOT NULL,
        predicted_severity VARCHAR(20) NOT NULL,
        confidence REAL NOT NULL,
        features_used TEXT,
        prediction_time TEXT NOT NULL,
        FOREIGN KEY (bug_id) REFERENCES bugs(id) ON DELETE CASCADE
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_predictions_bug ON predictions_log (bug_id)",
    "
    CREATE TABLE IF NOT EXISTS api_keys (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        key_hash CHAR(64) NOT NULL UNIQUE,
        key_preview VARCHAR(8) NOT NULL,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(100) NOT NULL,
        company VARCHAR(100),
        is_active INTEGER NOT NULL DEFAULT 1,
        usage_count INTEGER NOT NULL DEFAULT 0,
        rate_limit INTEGER NOT NULL DEFAULT 1000,
        created_at TEXT NOT NULL,
        last_used_at TEXT,
        expires_at TEXT
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_api_keys_email ON api_keys (email)",
];

/// Builds the pool without touching the database; connections open on first use.
pub fn connect_lazy(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    Ok(SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy_with(options))
}

/// Single-connection in-memory database; each new connection would be a fresh database.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

/// Keeps retrying [`ensure_schema`] until the database accepts it.
pub async fn ensure_schema_with_retry(pool: SqlitePool, every: Duration) {
    let mut attempt: u32 = 1;
    loop {
        match ensure_schema(&pool).await {
            Ok(()) => {
                log::info!("database schema ready after {attempt} attempt(s)");
                return;
            }
            Err(e) => log::warn!("database schema not ready (attempt {attempt}): {e}"),
        }
        attempt += 1;
        tokio::time::sleep(every).await;
    }
}

pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
