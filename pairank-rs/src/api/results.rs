//! Aggregate scores and rater progress

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;

use super::task::RaterQuery;
use super::with_ledger;
use crate::{ApiResult, AppState};

/// Progress report for one rater
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub rater_id: String,
    pub progress: usize,
    pub total_tasks: usize,
}

/// GET /results
///
/// Flat candidate -> score object.
pub async fn get_results(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, i64>>> {
    let scores = with_ledger(&state, |ledger| ledger.scores()).await?;
    Ok(Json(scores))
}

/// GET /status?rater_id=...
///
/// Read-only; raters who never requested a task report progress 0.
pub async fn get_status(
    State(state): State<AppState>,
    Query(query): Query<RaterQuery>,
) -> ApiResult<Json<StatusResponse>> {
    let rater_id = query.rater_id;
    let lookup = rater_id.clone();
    let progress = with_ledger(&state, move |ledger| ledger.status(&lookup)).await?;

    Ok(Json(StatusResponse {
        rater_id,
        progress: progress.position,
        total_tasks: progress.total,
    }))
}
