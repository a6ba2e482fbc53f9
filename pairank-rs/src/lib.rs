//! pairank-rs library - Rating Server
//!
//! HTTP front end for the pairwise rating ledger: hands out tasks,
//! accepts votes, reports progress and scores.

use axum::Router;
use chrono::{DateTime, Utc};
use pairank_common::Ledger;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod views;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Sessions, scores and their persistence
    pub ledger: Arc<Ledger>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
///
/// `static_dir`, when given, is served under `/static` so the image
/// references in the experiment definition resolve.
pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    use axum::routing::{get, post};

    let mut router = Router::new()
        .route("/task", get(api::get_task))
        .route("/submit", post(api::submit_rating))
        .route("/results", get(api::get_results))
        .route("/status", get(api::get_status))
        .merge(api::health_routes());

    if let Some(dir) = static_dir {
        router = router.nest_service("/static", ServeDir::new(dir));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
