use actix_web::{HttpResponse, web};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::auth::{self, KeyCheck};
use crate::error::{ApiError, ApiResult};
use crate::models::{ApiKeyStats, ApiKeyUpdate, CreateApiKey, NewApiKey};
use crate::store::api_keys;

fn key_not_found() -> ApiError {
    ApiError::not_found("API key not found")
}

// === POST /api/keys ===
/// The plaintext key appears in this response and nowhere else.
pub async fn create(pool: web::Data<SqlitePool>, body: web::Json<CreateApiKey>) -> ApiResult<HttpResponse> {
    let req = body.into_inner();
    req.validate()?;

    let key = auth::generate_key();
    let record = api_keys::insert(
        &pool,
        &NewApiKey {
            key_hash: auth::hash_key(&key),
            key_preview: auth::preview(&key),
            name: req.name,
            email: req.email,
            company: req.company,
            rate_limit: req.rate_limit,
            expires_at: req.expires_in_days.map(|days| Utc::now() + Duration::days(days)),
        },
    )
    .await?;
    log::info!("issued api key {} for {}", record.id, record.email);
    Ok(HttpResponse::Created().json(record.view(Some(key))))
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub email: String,
}

// === GET /api/keys/my-keys?email= ===
pub async fn list_mine(pool: web::Data<SqlitePool>, query: web::Query<OwnerQuery>) -> ApiResult<HttpResponse> {
    let keys = api_keys::list_by_email(&pool, &query.email).await?;
    let views: Vec<_> = keys.iter().map(|k| k.view(None)).collect();
    Ok(HttpResponse::Ok().json(views))
}

// === GET /api/keys/{id} ===
pub async fn get(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let record = api_keys::get(&pool, path.into_inner())
        .await?
        .ok_or_else(key_not_found)?;
    Ok(HttpResponse::Ok().json(record.view(None)))
}

// === GET /api/keys/{id}/stats ===
pub async fn stats(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let record = api_keys::get(&pool, path.into_inner())
        .await?
        .ok_or_else(key_not_found)?;
    let now = Utc::now();
    Ok(HttpResponse::Ok().json(ApiKeyStats {
        id: record.id,
        name: record.name.clone(),
        email: record.email.clone(),
        total_requests: record.usage_count,
        rate_limit: record.rate_limit,
        remaining_requests: record.remaining_today(now),
        last_used: record.last_used_at,
        created_at: record.created_at,
        is_active: record.is_active,
        expires_at: record.expires_at,
    }))
}

// === PUT /api/keys/{id} ===
pub async fn update(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<ApiKeyUpdate>,
) -> ApiResult<HttpResponse> {
    let changes = body.into_inner();
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    changes.validate()?;

    let record = api_keys::update(&pool, path.into_inner(), &changes)
        .await?
        .ok_or_else(key_not_found)?;
    Ok(HttpResponse::Ok().json(record.view(None)))
}

// === POST /api/keys/{id}/deactivate ===
pub async fn deactivate(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if !api_keys::deactivate(&pool, id).await? {
        return Err(key_not_found());
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "API key deactivated successfully", "key_id": id })))
}

// === DELETE /api/keys/{id} ===
pub async fn delete(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if !api_keys::delete(&pool, id).await? {
        return Err(key_not_found());
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "API key deleted successfully", "key_id": id })))
}

#[derive(Debug, Deserialize)]
pub struct ValidateQuery {
    pub api_key: String,
}

// === POST /api/keys/validate?api_key= ===
/// Reports whether a key would be accepted, without counting a request.
pub async fn validate(pool: web::Data<SqlitePool>, query: web::Query<ValidateQuery>) -> ApiResult<HttpResponse> {
    let now = Utc::now();
    let body = match auth::inspect(&pool, &query.api_key, now).await? {
        KeyCheck::Valid(record) => json!({
            "valid": true,
            "key_id": record.id,
            "name": record.name,
            "email": record.email,
            "rate_limit": record.rate_limit,
            "usage_count": record.used_today(now),
            "remaining_requests": record.remaining_today(now),
        }),
        KeyCheck::Invalid => json!({ "valid": false, "error": "Invalid API key" }),
        KeyCheck::Inactive => json!({ "valid": false, "error": "API key is inactive" }),
        KeyCheck::Expired => json!({ "valid": false, "error": "API key has expired" }),
        KeyCheck::RateLimited(limit) => json!({
            "valid": false,
            "error": format!("Rate limit of {limit} requests per day exceeded"),
        }),
    };
    Ok(HttpResponse::Ok().json(body))
}
