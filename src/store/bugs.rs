//! Bug rows, plus the aggregate queries that read them.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{developers, predictions};
use crate::models::{
    Bug, BugDraft, BugFilter, BugStatus, BugUpdate, DeveloperWorkload, NewPrediction, Page,
    Severity, Stats,
};

const BUG_COLUMNS: &str = "id, title, description, severity, predicted_severity, confidence_score, \
     status, source, assigned_developer, assigned_developer_id, created_at, updated_at";

pub const SEARCH_LIMIT: i64 = 50;

/// Writes the bug and its first prediction log row in one transaction.
pub async fn insert(
    pool: &SqlitePool,
    draft: &BugDraft,
    prediction: &NewPrediction,
) -> Result<Bug, sqlx::Error> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;
    let bug = sqlx::query_as::<_, Bug>(&format!(
        "INSERT INTO bugs (title, description, severity, predicted_severity, confidence_score,
                           status, source, assigned_developer, assigned_developer_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING {BUG_COLUMNS}"
    ))
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(draft.severity)
    .bind(draft.severity)
    .bind(draft.confidence)
    .bind(BugStatus::Open)
    .bind(&draft.source)
    .bind(&draft.assigned_developer)
    .bind(draft.assigned_developer_id)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    predictions::insert(&mut *tx, bug.id, prediction).await?;
    tx.commit().await?;
    Ok(bug)
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Bug>, sqlx::Error> {
    sqlx::query_as::<_, Bug>(&format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let found = sqlx::query_scalar::<_, i64>("SELECT id FROM bugs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Newest first; id breaks ties between rows created in the same instant.
pub async fn list(pool: &SqlitePool, filter: &BugFilter, page: Page) -> Result<Vec<Bug>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {BUG_COLUMNS} FROM bugs WHERE 1 = 1"));
    if let Some(severity) = filter.severity {
        qb.push(" AND severity = ").push_bind(severity);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(source) = &filter.source {
        qb.push(" AND source = ").push_bind(source.clone());
    }
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    qb.build_query_as::<Bug>().fetch_all(pool).await
}

/// Applies only the populated fields. `None` when the bug does not exist.
pub async fn update(pool: &SqlitePool, id: i64, changes: &BugUpdate) -> Result<Option<Bug>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let Some(mut bug) = sqlx::query_as::<_, Bug>(&format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
    else {
        return Ok(None);
    };

    if let Some(title) = &changes.title {
        bug.title = title.clone();
    }
    if let Some(description) = &changes.description {
        bug.description = description.clone();
    }
    if let Some(status) = changes.status {
        bug.status = status;
    }
    if let Some(severity) = changes.severity {
        bug.severity = severity;
    }
    if let Some(name) = &changes.assigned_developer {
        bug.assigned_developer_id = developers::find_by_name(&mut *tx, name)
            .await?
            .map(|dev| dev.id);
        bug.assigned_developer = Some(name.clone());
    }
    bug.updated_at = Utc::now();

    sqlx::query(
        "UPDATE bugs
         SET title = ?, description = ?, status = ?, severity = ?,
             assigned_developer = ?, assigned_developer_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&bug.title)
    .bind(&bug.description)
    .bind(bug.status)
    .bind(bug.severity)
    .bind(&bug.assigned_developer)
    .bind(bug.assigned_developer_id)
    .bind(bug.updated_at)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(bug))
}

/// Removes the bug and its prediction log. `false` when nothing was deleted.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM predictions_log WHERE bug_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let res = sqlx::query("DELETE FROM bugs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if res.rows_affected() == 0 {
        return Ok(false);
    }
    tx.commit().await?;
    Ok(true)
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Case-insensitive substring match over title or description.
///
/// Both sides are folded by SQLite's `lower()`, so a term always matches text
/// it appears in verbatim.
pub async fn search(pool: &SqlitePool, term: &str, limit: i64) -> Result<Vec<Bug>, sqlx::Error> {
    let pattern = format!("%{}%", escape_like(term));
    sqlx::query_as::<_, Bug>(&format!(
        "SELECT {BUG_COLUMNS} FROM bugs
         WHERE lower(title) LIKE lower(?1) ESCAPE '\\' OR lower(description) LIKE lower(?1) ESCAPE '\\'
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    ))
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn stats(pool: &SqlitePool) -> Result<Stats, sqlx::Error> {
    let total_bugs = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bugs")
        .fetch_one(pool)
        .await?;

    let mut by_severity: Map<String, Value> = Severity::ALL
        .iter()
        .map(|s| (s.to_string(), Value::from(0)))
        .collect();
    let rows = sqlx::query_as::<_, (String, i64)>("SELECT severity, COUNT(*) FROM bugs GROUP BY severity")
        .fetch_all(pool)
        .await?;
    for (severity, count) in rows {
        by_severity.insert(severity, Value::from(count));
    }

    let mut by_status: Map<String, Value> = BugStatus::ALL
        .iter()
        .map(|s| (s.to_string(), Value::from(0)))
        .collect();
    let rows = sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM bugs GROUP BY status")
        .fetch_all(pool)
        .await?;
    for (status, count) in rows {
        by_status.insert(status, Value::from(count));
    }

    let average = sqlx::query_scalar::<_, Option<f64>>("SELECT AVG(confidence_score) FROM bugs")
        .fetch_one(pool)
        .await?
        .unwrap_or(0.0);

    let total_developers = developers::count(pool).await?;

    let count_of = |map: &Map<String, Value>, key: BugStatus| {
        map.get(key.as_str()).and_then(Value::as_i64).unwrap_or(0)
    };

    Ok(Stats {
        total_bugs,
        open_bugs: count_of(&by_status, BugStatus::Open),
        closed_bugs: count_of(&by_status, BugStatus::Closed),
        by_severity,
        by_status,
        average_confidence: (average * 100.0).round() / 100.0,
        total_developers,
    })
}

/// Bug counts per status for one developer, taken from the bug rows.
pub async fn workload_for_developer(
    pool: &SqlitePool,
    developer_id: i64,
    developer_name: &str,
) -> Result<DeveloperWorkload, sqlx::Error> {
    let (total, open, in_progress, resolved) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'Open' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'In Progress' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'Resolved' THEN 1 ELSE 0 END), 0)
         FROM bugs WHERE assigned_developer_id = ?",
    )
    .bind(developer_id)
    .fetch_one(pool)
    .await?;

    Ok(DeveloperWorkload {
        developer_id,
        developer_name: developer_name.to_string(),
        total,
        open,
        in_progress,
        resolved,
    })
}
