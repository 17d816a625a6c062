use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;

use crate::classify::Triage;
use crate::db;

// === GET / ===
pub async fn root(triage: web::Data<Triage>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "AI Bug Classification API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "classifier": triage.classifier().model_version(),
    }))
}

// === GET /health ===
pub async fn health(pool: web::Data<SqlitePool>) -> HttpResponse {
    let timestamp = Utc::now().to_rfc3339();
    match db::ping(&pool).await {
        Ok(()) => HttpResponse::Ok().json(json!({
            "status": "healthy",
            "database": "connected",
            "timestamp": timestamp,
        })),
        Err(e) => {
            log::error!("health check failed: {e}");
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unhealthy",
                "database": "disconnected",
                "error": e.to_string(),
                "timestamp": timestamp,
            }))
        }
    }
}
