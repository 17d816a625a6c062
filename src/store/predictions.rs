use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};

use crate::models::{NewPrediction, Page, PredictionLog};

/// Appends one row; runs inside the caller's transaction when given one.
pub async fn insert<'e, E>(executor: E, bug_id: i64, prediction: &NewPrediction) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO predictions_log (bug_id, model_version, predicted_severity, confidence, features_used, prediction_time)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(bug_id)
    .bind(&prediction.model_version)
    .bind(prediction.predicted_severity)
    .bind(prediction.confidence)
    .bind(&prediction.features_used)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

pub async fn list_for_bug(
    pool: &SqlitePool,
    bug_id: i64,
    page: Page,
) -> Result<Vec<PredictionLog>, sqlx::Error> {
    sqlx::query_as::<_, PredictionLog>(
        "SELECT id, bug_id, model_version, predicted_severity, confidence, features_used, prediction_time
         FROM predictions_log
         WHERE bug_id = ?
         ORDER BY prediction_time DESC, id DESC
         LIMIT ? OFFSET ?",
    )
    .bind(bug_id)
    .bind(page.limit)
    .bind(page.skip)
    .fetch_all(pool)
    .await
}
