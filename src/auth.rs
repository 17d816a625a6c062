use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::ApiKey;
use crate::store::api_keys;

pub const KEY_PREFIX: &str = "bt_";
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Fresh plaintext key. Only its hash is ever stored.
pub fn generate_key() -> String {
    format!(
        "{KEY_PREFIX}{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

pub fn hash_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Last eight characters, shown back to the owner as `...abcd1234`.
pub fn preview(key: &str) -> String {
    let start = key.len().saturating_sub(8);
    key.get(start..).unwrap_or(key).to_string()
}

#[derive(Debug, Clone)]
pub enum KeyCheck {
    Valid(ApiKey),
    Invalid,
    Inactive,
    Expired,
    /// Today's quota is used up; carries the daily limit.
    RateLimited(i64),
}

fn check(record: Option<ApiKey>, now: DateTime<Utc>) -> KeyCheck {
    let Some(record) = record else {
        return KeyCheck::Invalid;
    };
    if !record.is_active {
        return KeyCheck::Inactive;
    }
    if record.expires_at.is_some_and(|at| at <= now) {
        return KeyCheck::Expired;
    }
    if record.remaining_today(now) == 0 {
        return KeyCheck::RateLimited(record.rate_limit);
    }
    KeyCheck::Valid(record)
}

/// Validates a key without counting a request against it.
pub async fn inspect(pool: &SqlitePool, key: &str, now: DateTime<Utc>) -> Result<KeyCheck, sqlx::Error> {
    let record = api_keys::get_by_hash(pool, &hash_key(key)).await?;
    Ok(check(record, now))
}

/// Counts one request against the key, or says why it was refused.
pub async fn authorize(pool: &SqlitePool, key: &str, now: DateTime<Utc>) -> Result<ApiKey, ApiError> {
    let hash = hash_key(key);
    if let Some(record) = api_keys::consume(pool, &hash, now).await? {
        return Ok(record);
    }

    Err(match inspect(pool, key, now).await? {
        KeyCheck::RateLimited(limit) => {
            ApiError::RateLimited(format!("Rate limit of {limit} requests per day exceeded"))
        }
        KeyCheck::Inactive => ApiError::Unauthorized("API key is inactive".into()),
        KeyCheck::Expired => ApiError::Unauthorized("API key has expired".into()),
        // consume lost a race against a day rollover or reactivation
        KeyCheck::Valid(_) | KeyCheck::Invalid => ApiError::Unauthorized("Invalid API key".into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(now: DateTime<Utc>) -> ApiKey {
        ApiKey {
            id: 1,
            key_hash: hash_key("bt_test"),
            key_preview: "bt_test".into(),
            name: "ci".into(),
            email: "ci@example.com".into(),
            company: None,
            is_active: true,
            usage_count: 0,
            rate_limit: 100,
            created_at: now,
            last_used_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn generated_keys_are_prefixed_and_unique() {
        let a = generate_key();
        let b = generate_key();
        assert!(a.starts_with(KEY_PREFIX));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = hash_key("bt_abc");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_key("bt_abc"));
        assert_ne!(h, hash_key("bt_abd"));
    }

    #[test]
    fn preview_keeps_the_tail() {
        assert_eq!(preview("bt_0123456789abcdef"), "89abcdef");
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn check_reports_each_refusal() {
        let now = Utc::now();
        assert!(matches!(check(None, now), KeyCheck::Invalid));
        assert!(matches!(check(Some(key(now)), now), KeyCheck::Valid(k) if k.id == 1));

        let inactive = ApiKey {
            is_active: false,
            ..key(now)
        };
        assert!(matches!(check(Some(inactive), now), KeyCheck::Inactive));

        let expired = ApiKey {
            expires_at: Some(now - Duration::seconds(1)),
            ..key(now)
        };
        assert!(matches!(check(Some(expired), now), KeyCheck::Expired));

        let exhausted = ApiKey {
            usage_count: 100,
            last_used_at: Some(now),
            ..key(now)
        };
        assert!(matches!(check(Some(exhausted), now), KeyCheck::RateLimited(100)));
    }
}
