//! Vote submission

use axum::{
    extract::{rejection::FormRejection, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use pairank_common::scoring::Vote;
use pairank_common::Submission;
use serde::Deserialize;
use tracing::info;

use super::with_ledger;
use crate::{views, ApiError, ApiResult, AppState};

/// Form posted by the task page
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    pub rater_id: String,
    pub datapoint_id: String,
    pub left_weight: String,
    pub right_weight: String,
    /// "0" or "1"
    pub left_selected: String,
    /// "0" or "1"
    pub right_selected: String,
}

/// POST /submit
///
/// Applies the vote and advances the rater in one transaction, then
/// redirects to the next task or shows the completion page.
pub async fn submit_rating(
    State(state): State<AppState>,
    form: Result<Form<SubmitForm>, FormRejection>,
) -> ApiResult<Response> {
    let Form(form) = form.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let vote = Vote::from_form(&form.left_selected, &form.right_selected)?;
    let submission = Submission {
        rater_id: form.rater_id,
        datapoint_id: form.datapoint_id,
        left_weight: form.left_weight,
        right_weight: form.right_weight,
        vote,
    };

    info!(
        "Rater {} voted on {} ({} vs {}): left={} right={}",
        submission.rater_id,
        submission.datapoint_id,
        submission.left_weight,
        submission.right_weight,
        vote.left_selected,
        vote.right_selected
    );

    let rater_id = submission.rater_id.clone();
    let progress = with_ledger(&state, move |ledger| ledger.submit(&submission)).await?;

    if progress.is_complete() {
        return Ok(Html(views::render_completed(progress.total)).into_response());
    }

    let next = format!("/task?rater_id={}", urlencoding::encode(&rater_id));
    Ok(Redirect::to(&next).into_response())
}
