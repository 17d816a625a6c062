#[macro_use]
mod common;

use actix_web::http::{StatusCode, header};
use actix_web::test;
use bugtriage::middleware::ApiKeyAuth;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use common::pool;

/// Issues a key through the API; yields `(id, plaintext key)`.
macro_rules! issue {
    ($app:expr, $rate_limit:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/keys")
            .set_json(json!({
                "name": "ci runner",
                "email": "ci@example.com",
                "rate_limit": $rate_limit
            }))
            .to_request();
        let res = test::call_service(&$app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(res).await;
        (
            body["id"].as_i64().unwrap(),
            body["key"].as_str().unwrap().to_string(),
        )
    }};
}

async fn usage(pool: &SqlitePool, id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT usage_count FROM api_keys WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[actix_web::test]
async fn key_is_shown_once_and_only_its_hash_is_stored() {
    let pool = pool().await;
    let app = test_app!(pool);

    let req = test::TestRequest::post()
        .uri("/api/keys")
        .set_json(json!({
            "name": "dashboard",
            "email": "owner@example.com",
            "company": "Acme",
            "expires_in_days": 30
        }))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: Value = test::read_body_json(res).await;
    let key = created["key"].as_str().unwrap();
    assert!(key.starts_with("bt_"));
    assert_eq!(created["rate_limit"], 1000);
    assert_eq!(created["key_preview"], format!("...{}", &key[key.len() - 8..]));
    assert!(created["expires_at"].is_string());

    let stored: String = sqlx::query_scalar("SELECT key_hash FROM api_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stored, bugtriage::auth::hash_key(key));

    let req = test::TestRequest::get()
        .uri("/api/keys/my-keys?email=owner@example.com")
        .to_request();
    let mine: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine.len(), 1);
    assert!(mine[0].get("key").is_none());

    let req = test::TestRequest::get()
        .uri(&format!("/api/keys/{}", created["id"]))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert!(fetched.get("key").is_none());
    assert_eq!(fetched["company"], "Acme");
}

#[actix_web::test]
async fn create_validates_limits() {
    let pool = pool().await;
    let app = test_app!(pool);

    for body in [
        json!({ "name": "ab", "email": "a@example.com" }),
        json!({ "name": "valid", "email": "nope" }),
        json!({ "name": "valid", "email": "a@example.com", "rate_limit": 99 }),
        json!({ "name": "valid", "email": "a@example.com", "rate_limit": 10001 }),
        json!({ "name": "valid", "email": "a@example.com", "expires_in_days": 0 }),
        json!({ "name": "valid", "email": "a@example.com", "expires_in_days": 366 }),
    ] {
        let req = test::TestRequest::post().uri("/api/keys").set_json(&body).to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "{body}"
        );
    }
}

#[actix_web::test]
async fn required_gate_rejects_missing_and_bad_keys() {
    let pool = pool().await;
    let app = test_app!(pool, ApiKeyAuth::new(true));

    let req = test::TestRequest::get().uri("/api/bugs").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers().get(header::WWW_AUTHENTICATE).unwrap(), "ApiKey");

    let req = test::TestRequest::get()
        .uri("/api/bugs")
        .insert_header(("X-API-Key", "bt_not_a_real_key"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    // key management and health stay open
    let req = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let (id, key) = issue!(app, 100);

    let req = test::TestRequest::get()
        .uri("/api/bugs")
        .insert_header(("X-API-Key", key.as_str()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(usage(&pool, id).await, 1);
}

#[actix_web::test]
async fn optional_gate_still_checks_presented_keys() {
    let pool = pool().await;
    let app = test_app!(pool);

    let req = test::TestRequest::get().uri("/api/stats").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/stats")
        .insert_header(("X-API-Key", "bt_wrong"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let (id, key) = issue!(app, 100);
    for _ in 0..3 {
        let req = test::TestRequest::get()
            .uri("/api/stats")
            .insert_header(("X-API-Key", key.as_str()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    assert_eq!(usage(&pool, id).await, 3);
}

#[actix_web::test]
async fn exhausted_quota_is_429_and_resets_next_day() {
    let pool = pool().await;
    let app = test_app!(pool, ApiKeyAuth::new(true));
    let (id, key) = issue!(app, 100);

    sqlx::query("UPDATE api_keys SET usage_count = 100, last_used_at = ? WHERE id = ?")
        .bind(chrono::Utc::now())
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/api/stats")
        .insert_header(("X-API-Key", key.as_str()))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(usage(&pool, id).await, 100);

    sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
        .bind(chrono::Utc::now() - chrono::Duration::days(1))
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let req = test::TestRequest::get()
        .uri("/api/stats")
        .insert_header(("X-API-Key", key.as_str()))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert_eq!(usage(&pool, id).await, 1);
}

#[actix_web::test]
async fn deactivated_and_expired_keys_are_refused() {
    let pool = pool().await;
    let app = test_app!(pool, ApiKeyAuth::new(true));
    let (id, key) = issue!(app, 100);

    let req = test::TestRequest::post()
        .uri(&format!("/api/keys/{id}/deactivate"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["key_id"], id);

    let req = test::TestRequest::get()
        .uri("/api/bugs")
        .insert_header(("X-API-Key", key.as_str()))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "API key is inactive");

    let req = test::TestRequest::put()
        .uri(&format!("/api/keys/{id}"))
        .set_json(json!({ "is_active": true }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["is_active"], true);

    sqlx::query("UPDATE api_keys SET expires_at = ? WHERE id = ?")
        .bind(chrono::Utc::now() - chrono::Duration::minutes(1))
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();
    let req = test::TestRequest::get()
        .uri("/api/bugs")
        .insert_header(("X-API-Key", key.as_str()))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["message"], "API key has expired");
}

#[actix_web::test]
async fn validate_does_not_count_usage() {
    let pool = pool().await;
    let app = test_app!(pool);
    let (id, key) = issue!(app, 250);

    let req = test::TestRequest::post()
        .uri(&format!("/api/keys/validate?api_key={key}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["valid"], true);
    assert_eq!(body["key_id"], id);
    assert_eq!(body["remaining_requests"], 250);
    assert_eq!(usage(&pool, id).await, 0);

    let req = test::TestRequest::post()
        .uri("/api/keys/validate?api_key=bt_unknown")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["error"], "Invalid API key");

    let req = test::TestRequest::get().uri(&format!("/api/keys/{id}/stats")).to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total_requests"], 0);
    assert_eq!(stats["remaining_requests"], 250);
}

#[actix_web::test]
async fn update_and_delete_keys() {
    let pool = pool().await;
    let app = test_app!(pool);
    let (id, _) = issue!(app, 100);

    let req = test::TestRequest::put()
        .uri(&format!("/api/keys/{id}"))
        .set_json(json!({}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri(&format!("/api/keys/{id}"))
        .set_json(json!({ "name": "renamed", "rate_limit": 5000 }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["name"], "renamed");
    assert_eq!(updated["rate_limit"], 5000);
    assert_eq!(updated["is_active"], true);

    let req = test::TestRequest::delete().uri(&format!("/api/keys/{id}")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    for req in [
        test::TestRequest::get().uri(&format!("/api/keys/{id}")).to_request(),
        test::TestRequest::get().uri(&format!("/api/keys/{id}/stats")).to_request(),
        test::TestRequest::delete().uri(&format!("/api/keys/{id}")).to_request(),
        test::TestRequest::post().uri(&format!("/api/keys/{id}/deactivate")).to_request(),
    ] {
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_never_exceed_the_quota() {
    use bugtriage::auth::{authorize, hash_key};
    use bugtriage::error::ApiError;
    use bugtriage::models::NewApiKey;
    use bugtriage::store::api_keys;
    use futures_util::future::join_all;

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("keys.db").display());
    let pool = bugtriage::db::connect_lazy(&url).unwrap();
    bugtriage::db::ensure_schema(&pool).await.unwrap();

    let key = "bt_concurrent_quota_key";
    let record = api_keys::insert(
        &pool,
        &NewApiKey {
            key_hash: hash_key(key),
            key_preview: "uota_key".into(),
            name: "load test".into(),
            email: "load@example.com".into(),
            company: None,
            rate_limit: 100,
            expires_at: None,
        },
    )
    .await
    .unwrap();

    let now = chrono::Utc::now();
    let remaining = 5;
    sqlx::query("UPDATE api_keys SET usage_count = ?, last_used_at = ? WHERE id = ?")
        .bind(100 - remaining)
        .bind(now)
        .bind(record.id)
        .execute(&pool)
        .await
        .unwrap();

    let results = join_all((0..12).map(|_| authorize(&pool, key, now))).await;

    let granted = results.iter().filter(|r| r.is_ok()).count();
    let limited = results
        .iter()
        .filter(|r| matches!(r, Err(ApiError::RateLimited(_))))
        .count();
    assert_eq!(granted, remaining as usize);
    assert_eq!(limited, 12 - remaining as usize);
    assert_eq!(usage(&pool, record.id).await, 100);
}
