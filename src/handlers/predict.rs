use actix_web::{HttpResponse, web};
use sqlx::SqlitePool;

use crate::classify::Triage;
use crate::error::ApiResult;
use crate::models::{DeveloperCandidate, PredictionRequest, PredictionResponse};
use crate::store::developers;

// === POST /api/predict ===
/// Runs the full pipeline without writing anything.
pub async fn predict(
    pool: web::Data<SqlitePool>,
    triage: web::Data<Triage>,
    body: web::Json<PredictionRequest>,
) -> ApiResult<HttpResponse> {
    let req = body.into_inner();
    req.validate()?;

    let candidates: Vec<DeveloperCandidate> = developers::active_candidates(&pool)
        .await?
        .into_iter()
        .map(DeveloperCandidate::from)
        .collect();
    let assessment = triage.assess(&req.title, &req.description, &candidates).await;

    let degraded = assessment.classification.is_degraded();
    let classification = assessment.classification.into_inner();
    Ok(HttpResponse::Ok().json(PredictionResponse {
        severity: classification.severity,
        confidence: classification.confidence,
        suggested_developer: assessment.assignment.into_inner().developer_name,
        reasoning: classification.reasoning,
        impact_areas: classification.impact_areas,
        model_version: assessment.model_version,
        degraded,
    }))
}
