use chrono::{DateTime, TimeZone, Utc};
use sqlx::SqlitePool;

use crate::models::{ApiKey, ApiKeyUpdate, NewApiKey};

const KEY_COLUMNS: &str = "id, key_hash, key_preview, name, email, company, is_active, usage_count, \
     rate_limit, created_at, last_used_at, expires_at";

pub async fn insert(pool: &SqlitePool, key: &NewApiKey) -> Result<ApiKey, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(&format!(
        "INSERT INTO api_keys (key_hash, key_preview, name, email, company, is_active, usage_count,
                               rate_limit, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, 1, 0, ?, ?, ?)
         RETURNING {KEY_COLUMNS}"
    ))
    .bind(&key.key_hash)
    .bind(&key.key_preview)
    .bind(&key.name)
    .bind(&key.email)
    .bind(&key.company)
    .bind(key.rate_limit)
    .bind(Utc::now())
    .bind(key.expires_at)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(&format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_hash(pool: &SqlitePool, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(&format!("SELECT {KEY_COLUMNS} FROM api_keys WHERE key_hash = ?"))
        .bind(key_hash)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_email(pool: &SqlitePool, email: &str) -> Result<Vec<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(&format!(
        "SELECT {KEY_COLUMNS} FROM api_keys WHERE email = ? ORDER BY created_at DESC, id DESC"
    ))
    .bind(email)
    .fetch_all(pool)
    .await
}

pub async fn update(pool: &SqlitePool, id: i64, changes: &ApiKeyUpdate) -> Result<Option<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(&format!(
        "UPDATE api_keys
         SET name = COALESCE(?1, name),
             is_active = COALESCE(?2, is_active),
             rate_limit = COALESCE(?3, rate_limit)
         WHERE id = ?4
         RETURNING {KEY_COLUMNS}"
    ))
    .bind(&changes.name)
    .bind(changes.is_active)
    .bind(changes.rate_limit)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn deactivate(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("UPDATE api_keys SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let res = sqlx::query("DELETE FROM api_keys WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| Utc.from_utc_datetime(&midnight))
        .unwrap_or(now)
}

/// Counts one request against the key's daily quota.
///
/// The check and the increment are one statement, so concurrent requests
/// cannot both take the last slot. The counter restarts on the first use of
/// a new UTC day. `None` means the key is unknown, inactive, expired or out
/// of quota; the caller looks the row up again to tell which.
pub async fn consume(
    pool: &SqlitePool,
    key_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<ApiKey>, sqlx::Error> {
    sqlx::query_as::<_, ApiKey>(&format!(
        "UPDATE api_keys
         SET usage_count = CASE WHEN last_used_at IS NULL OR last_used_at < ?1
                                THEN 1 ELSE usage_count + 1 END,
             last_used_at = ?2
         WHERE key_hash = ?3
           AND is_active = 1
           AND (expires_at IS NULL OR expires_at > ?2)
           AND (CASE WHEN last_used_at IS NULL OR last_used_at < ?1
                     THEN 0 ELSE usage_count END) < rate_limit
         RETURNING {KEY_COLUMNS}"
    ))
    .bind(start_of_day(now))
    .bind(now)
    .bind(key_hash)
    .fetch_optional(pool)
    .await
}
