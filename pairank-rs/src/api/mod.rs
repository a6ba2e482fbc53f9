//! HTTP API handlers for pairank-rs

pub mod health;
pub mod results;
pub mod submit;
pub mod task;

pub use health::health_routes;
pub use results::{get_results, get_status};
pub use submit::submit_rating;
pub use task::get_task;

use crate::{ApiResult, AppState};
use pairank_common::Ledger;
use std::sync::Arc;

/// Run a ledger operation on the blocking pool
///
/// Ledger operations hold a std mutex and may write the snapshot file
/// while holding it, so they stay off the async worker threads.
pub(crate) async fn with_ledger<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Ledger) -> pairank_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let ledger = Arc::clone(&state.ledger);
    let value = tokio::task::spawn_blocking(move || f(&ledger)).await??;
    Ok(value)
}
