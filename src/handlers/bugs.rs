use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::classify::Triage;
use crate::error::{ApiError, ApiResult};
use crate::models::{BugDraft, BugFilter, BugReport, BugUpdate, DeveloperCandidate, NewPrediction, Page};
use crate::store::{bugs, developers, predictions};

fn bug_not_found(id: i64) -> ApiError {
    ApiError::not_found(format!("Bug with ID {id} not found"))
}

// === POST /api/bugs ===
/// Classifies and assigns the report, then stores it with its first prediction.
pub async fn create(
    pool: web::Data<SqlitePool>,
    triage: web::Data<Triage>,
    body: web::Json<BugReport>,
) -> ApiResult<HttpResponse> {
    let report = body.into_inner();
    report.validate()?;

    let candidates: Vec<DeveloperCandidate> = developers::active_candidates(&pool)
        .await?
        .into_iter()
        .map(DeveloperCandidate::from)
        .collect();
    let assessment = triage.assess(&report.title, &report.description, &candidates).await;

    let classification = assessment.classification.value();
    let suggestion = assessment.assignment.value();
    let draft = BugDraft {
        title: report.title,
        description: report.description,
        severity: classification.severity,
        confidence: classification.confidence,
        source: report.source,
        assigned_developer: suggestion.developer_name.clone(),
        assigned_developer_id: suggestion.developer_id,
    };
    let prediction = NewPrediction {
        model_version: assessment.model_version.clone(),
        predicted_severity: classification.severity,
        confidence: classification.confidence,
        features_used: json!({
            "reasoning": classification.reasoning,
            "impact_areas": classification.impact_areas,
            "degraded": assessment.classification.is_degraded(),
        })
        .to_string(),
    };

    let bug = bugs::insert(&pool, &draft, &prediction).await?;
    log::info!(
        "bug {} created: {} ({:.2}) assigned to {}",
        bug.id,
        bug.severity,
        draft.confidence,
        draft.assigned_developer
    );
    Ok(HttpResponse::Created().json(bug))
}

// === GET /api/bugs ===
pub async fn list(pool: web::Data<SqlitePool>, query: web::Query<BugFilter>) -> ApiResult<HttpResponse> {
    let page = query.page()?;
    let found = bugs::list(&pool, &query, page).await?;
    Ok(HttpResponse::Ok().json(found))
}

// === GET /api/bugs/{id} ===
pub async fn get(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let bug = bugs::get(&pool, id).await?.ok_or_else(|| bug_not_found(id))?;
    Ok(HttpResponse::Ok().json(bug))
}

// === PUT /api/bugs/{id} ===
pub async fn update(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    body: web::Json<BugUpdate>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let changes = body.into_inner();
    if changes.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    changes.validate()?;

    let bug = bugs::update(&pool, id, &changes)
        .await?
        .ok_or_else(|| bug_not_found(id))?;
    Ok(HttpResponse::Ok().json(bug))
}

// === DELETE /api/bugs/{id} ===
pub async fn delete(pool: web::Data<SqlitePool>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    if !bugs::delete(&pool, id).await? {
        return Err(bug_not_found(id));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": format!("Bug {id} deleted successfully") })))
}

// === GET /api/bugs/search/{term} ===
pub async fn search(pool: web::Data<SqlitePool>, path: web::Path<String>) -> ApiResult<HttpResponse> {
    let term = path.into_inner();
    let found = bugs::search(&pool, &term, bugs::SEARCH_LIMIT).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// === GET /api/bugs/{id}/predictions ===
pub async fn predictions(
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let page = Page::from_query(query.skip, query.limit)?;
    if !bugs::exists(&pool, id).await? {
        return Err(bug_not_found(id));
    }
    let rows = predictions::list_for_bug(&pool, id, page).await?;
    Ok(HttpResponse::Ok().json(rows))
}
