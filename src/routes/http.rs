//! HTTP endpoint handlers. Thin wrappers that forward to state methods;
//! every failure maps through `ApiError` into a structured JSON response.

use std::sync::Arc;

use axum::{extract::State, Json};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> Json<HealthOut> {
    Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, category_id = %body.category_id))]
pub async fn http_post_question_set(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuestionSetRequest>,
) -> Result<Json<QuestionSetResponse>, ApiError> {
    let resp = state.fetch_question_set(body).await?;
    info!(
        target: "quiz",
        groups = resp.groups.len(),
        fresh = resp.meta.stats.fresh_total,
        repeated = resp.meta.stats.repeated_total,
        "HTTP question set served"
    );
    Ok(Json(resp))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, answers = body.answers.len()))]
pub async fn http_post_attempt(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubmitAttemptRequest>,
) -> Result<Json<SubmitAttemptResponse>, ApiError> {
    let resp = state.submit_attempt(body).await?;
    info!(
        target: "quiz",
        points = resp.outcome.total_points,
        new = resp.outcome.new_count,
        repeated = resp.outcome.repeated_count,
        "HTTP attempt scored"
    );
    Ok(Json(resp))
}
