//! JSON HTTP surface over the scan pipeline and history store.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::pipeline::ScanPipeline;
use crate::scraper::ListingScraper;

pub mod error;
pub mod extract;
mod handlers;

pub use error::ApiError;
pub use extract::LenientJson;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ScanPipeline,
    pub scraper: ListingScraper,
}

impl AppState {
    pub fn new(pipeline: ScanPipeline, scraper: ListingScraper) -> Self {
        Self { pipeline, scraper }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scan", post(handlers::scan))
        .route("/analyze-text", post(handlers::analyze_text))
        .route("/analyze-image", post(handlers::analyze_image))
        .route("/price-comparison", post(handlers::price_comparison))
        .route("/url-scraper", post(handlers::url_scraper))
        .route("/scan-history", get(handlers::scan_history))
        .route("/scan-history/summary", get(handlers::history_summary))
        .route(
            "/scans/:id",
            get(handlers::get_scan).delete(handlers::delete_scan),
        )
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
