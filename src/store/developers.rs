use chrono::Utc;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};

use crate::models::{CreateDeveloper, Developer, DeveloperStatus, DeveloperUpdate, Page};

const DEVELOPER_COLUMNS: &str = "id, name, email, skills, workload, status, created_at, updated_at";

/// Fails with a unique violation when the email is taken.
pub async fn insert(pool: &SqlitePool, dev: &CreateDeveloper) -> Result<Developer, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as::<_, Developer>(&format!(
        "INSERT INTO developers (name, email, skills, workload, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         RETURNING {DEVELOPER_COLUMNS}"
    ))
    .bind(dev.name.trim())
    .bind(&dev.email)
    .bind(Json(&dev.skills))
    .bind(dev.workload)
    .bind(dev.status)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<Developer>, sqlx::Error> {
    sqlx::query_as::<_, Developer>(&format!("SELECT {DEVELOPER_COLUMNS} FROM developers WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<Option<Developer>, sqlx::Error> {
    sqlx::query_as::<_, Developer>(&format!("SELECT {DEVELOPER_COLUMNS} FROM developers WHERE email = ?"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn list(
    pool: &SqlitePool,
    status: Option<DeveloperStatus>,
    page: Page,
) -> Result<Vec<Developer>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {DEVELOPER_COLUMNS} FROM developers"));
    if let Some(status) = status {
        qb.push(" WHERE status = ").push_bind(status);
    }
    qb.push(" ORDER BY id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);
    qb.build_query_as::<Developer>().fetch_all(pool).await
}

/// First developer with exactly this name.
pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Developer>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Developer>(&format!(
        "SELECT {DEVELOPER_COLUMNS} FROM developers WHERE name = ? ORDER BY id LIMIT 1"
    ))
    .bind(name)
    .fetch_optional(executor)
    .await
}

/// Developers eligible for assignment, in insertion order.
pub async fn active_candidates(pool: &SqlitePool) -> Result<Vec<Developer>, sqlx::Error> {
    sqlx::query_as::<_, Developer>(&format!(
        "SELECT {DEVELOPER_COLUMNS} FROM developers WHERE status = ? ORDER BY id"
    ))
    .bind(DeveloperStatus::Active)
    .fetch_all(pool)
    .await
}

pub async fn update(
    pool: &SqlitePool,
    id: i64,
    changes: &DeveloperUpdate,
) -> Result<Option<Developer>, sqlx::Error> {
    let Some(mut dev) = get(pool, id).await? else {
        return Ok(None);
    };
    if let Some(name) = &changes.name {
        dev.name = name.trim().to_string();
    }
    if let Some(email) = &changes.email {
        dev.email = email.clone();
    }
    if let Some(skills) = &changes.skills {
        dev.skills = Json(skills.clone());
    }
    if let Some(workload) = changes.workload {
        dev.workload = workload;
    }
    if let Some(status) = changes.status {
        dev.status = status;
    }
    dev.updated_at = Utc::now();

    sqlx::query(
        "UPDATE developers
         SET name = ?, email = ?, skills = ?, workload = ?, status = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&dev.name)
    .bind(&dev.email)
    .bind(&dev.skills)
    .bind(dev.workload)
    .bind(dev.status)
    .bind(dev.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(Some(dev))
}

/// Bugs keep their assignee name; the foreign key clears their developer id.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM developers WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM developers")
        .fetch_one(pool)
        .await
}
