#![allow(dead_code)]

use bugtriage::db;
use bugtriage::models::{CreateDeveloper, Developer, DeveloperStatus};
use bugtriage::store::developers;
use serde_json::{Value, json};
use sqlx::SqlitePool;

/// Builds the full route table over `$pool` with an offline classifier.
/// The optional second argument is the API key gate.
macro_rules! test_app {
    ($pool:expr) => {
        test_app!($pool, bugtriage::middleware::ApiKeyAuth::new(false))
    };
    ($pool:expr, $auth:expr) => {{
        let auth = $auth;
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($pool.clone()))
                .app_data(actix_web::web::Data::new(bugtriage::classify::Triage::new(
                    bugtriage::classify::RemoteClassifier::offline(),
                )))
                .configure(move |cfg| bugtriage::handlers::config(cfg, auth)),
        )
        .await
    }};
}

pub async fn pool() -> SqlitePool {
    db::connect_in_memory().await.expect("in-memory database")
}

pub async fn seed_developer(pool: &SqlitePool, name: &str, email: &str, workload: i64) -> Developer {
    developers::insert(
        pool,
        &CreateDeveloper {
            name: name.to_string(),
            email: email.to_string(),
            skills: vec!["backend".to_string()],
            workload,
            status: DeveloperStatus::Active,
        },
    )
    .await
    .expect("seed developer")
}

pub fn bug_body(title: &str, description: &str) -> Value {
    json!({ "title": title, "description": description })
}

pub async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .expect("count rows")
}
