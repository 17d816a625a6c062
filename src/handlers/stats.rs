use actix_web::{HttpResponse, web};
use sqlx::SqlitePool;

use crate::error::ApiResult;
use crate::store::bugs;

// === GET /api/stats ===
pub async fn stats(pool: web::Data<SqlitePool>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(bugs::stats(&pool).await?))
}
