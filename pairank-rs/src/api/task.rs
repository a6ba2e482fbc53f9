//! Task presentation

use axum::{
    extract::{Query, State},
    response::Html,
};
use pairank_common::NextTask;
use serde::Deserialize;

use super::with_ledger;
use crate::{views, ApiResult, AppState};

/// Query parameters identifying a rater
#[derive(Debug, Deserialize)]
pub struct RaterQuery {
    /// Opaque rater identifier; must be non-empty
    #[serde(default)]
    pub rater_id: String,
}

/// GET /task?rater_id=...
///
/// Returns the rater's next comparison, creating their shuffled task order
/// on first contact, or the completion page once everything is rated.
pub async fn get_task(
    State(state): State<AppState>,
    Query(query): Query<RaterQuery>,
) -> ApiResult<Html<String>> {
    let html = with_ledger(&state, move |ledger| {
        let page = match ledger.next_task(&query.rater_id)? {
            NextTask::Pending {
                position,
                total,
                task,
            } => views::render_task(&query.rater_id, task, position, total),
            NextTask::Completed { total } => views::render_completed(total),
        };
        Ok(page)
    })
    .await?;

    Ok(Html(html))
}
