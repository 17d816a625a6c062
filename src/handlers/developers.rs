use actix_web::{HttpResponse, web};
use serde_json::json;
use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};
use crate::models::{CreateDeveloper, DeveloperQuery, DeveloperUpdate, Page};
use crate::store::{self, bugs, developers};

fn developer_not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Developer with ID {id} not found"))
}

fn duplicate_email(email: &str) -> ApiError {
    ApiError::bad_request(format!("Developer with email {email} already exists"))
}

// === POST /api/developers ===
pub async fn create(pool: web::Data<SqlitePool>, body: web::Json<CreateDeveloper>) -> ApiResult<HttpResponse> {
    let dev = body.into_inner();
    dev.validate()?;
    if developers::get_by_email(&pool, &dev.email).await?.is_some() {
        return Err(duplicate_email(&dev.email));
    }

    // the UNIQUE constraint still catches a concurrent insert
    match developers::insert(&pool, &dev).await {
        Ok(created) => Ok(HttpResponse::Created().json(created)),
        Err(e) if store::is_unique_violation(&e) => Err(duplicate_email(&dev.email)),
        Err(e) => Err(e.into()),
    }
}

// === GET /api/developers ===
pub async fn list(pool: web::Data<SqlitePool>, query: web::Query<DeveloperQuery>) -> ApiResult<HttpResponse> {
    let page = Page::from_query(query.skip, query.limit)?;
    let found = developers::list(&pool, query.status, page).await?;
    Ok(HttpResponse::Ok().json(found))
}

// === GET /api/developers/{id} ===
pub async fn get(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let dev = developers::get(&pool, id)
        .await?
        .ok_or_else(|| developer_not_found(id))?;
    Ok(HttpResponse::Ok().json(dev))
}

// === PUT /api/developers/{id} ===
pub async fn update(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<DeveloperUpdate>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let changes = body.into_inner();
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    changes.validate()?;

    if let Some(email) = &changes.email {
        if let Some(other) = developers::get_by_email(&pool, email).await? {
            if other.id != id {
                return Err(duplicate_email(email));
            }
        }
    }

    match developers::update(&pool, id, &changes).await {
        Ok(Some(dev)) => Ok(HttpResponse::Ok().json(dev)),
        Ok(None) => Err(developer_not_found(id)),
        Err(e) if store::is_unique_violation(&e) => {
            Err(duplicate_email(changes.email.as_deref().unwrap_or_default()))
        }
        Err(e) => Err(e.into()),
    }
}

// === DELETE /api/developers/{id} ===
pub async fn delete(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if !developers::delete(&pool, id).await? {
        return Err(developer_not_found(id));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": format!("Developer {id} deleted successfully") })))
}

// === GET /api/developers/{id}/workload ===
pub async fn workload(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let dev = developers::get(&pool, id)
        .await?
        .ok_or_else(|| developer_not_found(id))?;
    let counts = bugs::workload_for_developer(&pool, dev.id, &dev.name).await?;
    Ok(HttpResponse::Ok().json(counts))
}
