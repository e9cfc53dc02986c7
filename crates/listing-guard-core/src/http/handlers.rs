use std::panic::AssertUnwindSafe;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use super::{error::ApiError, extract::LenientJson, AppState};
use crate::history::{summarize, HistorySummary};
use crate::llm::ListingText;
use crate::pipeline::ScanRequest;
use crate::pricing::PriceComparison;
use crate::report::{PriceSummary, ScanResponse};
use crate::scanner::{
    ImageAnalysis, RedFlag, RiskBand, ScoreBreakdown, Severity, TextAnalysis, NEUTRAL_SCAM_SCORE,
};
use crate::scraper::ScrapedListing;
use crate::store::ScanDetails;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "Failed to analyze listing".to_string())
}

fn failed_scan_response(message: String) -> ScanResponse {
    ScanResponse {
        id: Uuid::new_v4().to_string(),
        title: "Error analyzing listing".into(),
        url: None,
        image_url: None,
        scam_score: NEUTRAL_SCAM_SCORE,
        risk_band: RiskBand::from_score(NEUTRAL_SCAM_SCORE),
        analysis: "An error occurred while analyzing this listing. Please try again.".into(),
        red_flags: vec![RedFlag::new(
            Severity::Medium,
            "Analysis failed due to technical issues",
        )],
        alternatives: Vec::new(),
        price_comparison: PriceSummary {
            average_price: 0.0,
            percentage_difference: 0.0,
            is_suspiciously_low: false,
        },
        image_analysis: None,
        breakdown: ScoreBreakdown::default(),
        persisted: false,
        error: Some(message),
    }
}

pub async fn scan(
    State(state): State<AppState>,
    LenientJson(request): LenientJson<ScanRequest>,
) -> Response {
    match AssertUnwindSafe(state.pipeline.run(request))
        .catch_unwind()
        .await
    {
        Ok(outcome) => Json(ScanResponse::from(&outcome)).into_response(),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(error = %message, "scan pipeline panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(failed_scan_response(message)),
            )
                .into_response()
        }
    }
}

pub async fn analyze_text(
    State(state): State<AppState>,
    LenientJson(listing): LenientJson<ListingText>,
) -> Json<TextAnalysis> {
    match state.pipeline.analyst().analyze_text(&listing).await {
        Ok(analysis) => Json(analysis),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "text analysis failed");
            Json(TextAnalysis::failed())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageRequest {
    pub image_url: Option<String>,
}

pub async fn analyze_image(
    State(state): State<AppState>,
    LenientJson(request): LenientJson<ImageRequest>,
) -> Json<ImageAnalysis> {
    let Some(image_url) = request.image_url.filter(|url| !url.trim().is_empty()) else {
        warn!("image analysis requested without an image URL");
        return Json(ImageAnalysis::failed());
    };
    match state.pipeline.analyst().analyze_image(&image_url).await {
        Ok(analysis) => Json(analysis),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "image analysis failed");
            Json(ImageAnalysis::failed())
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PriceRequest {
    pub title: Option<String>,
    pub price: Option<String>,
}

pub async fn price_comparison(
    State(state): State<AppState>,
    LenientJson(request): LenientJson<PriceRequest>,
) -> Result<Json<PriceComparison>, ApiError> {
    let title = request
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Title is required".into()))?;
    let price = request.price.unwrap_or_else(|| "0".to_string());
    Ok(Json(state.pipeline.oracle().compare(&title, &price).await))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ScrapeRequest {
    pub url: Option<String>,
}

pub async fn url_scraper(
    State(state): State<AppState>,
    LenientJson(request): LenientJson<ScrapeRequest>,
) -> Result<Json<ScrapedListing>, ApiError> {
    let raw = request
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("No URL provided".into()))?;
    let url = Url::parse(raw.trim())
        .map_err(|_| ApiError::BadRequest("Invalid URL format".into()))?;

    let listing = state.scraper.scrape(&url).await.map_err(|err| {
        warn!(url = %url, error = %format!("{err:#}"), "scrape failed");
        ApiError::Internal(err.to_string())
    })?;
    Ok(Json(listing))
}

pub async fn scan_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScanDetails>>, ApiError> {
    state
        .pipeline
        .store()
        .load_history()
        .await
        .map(Json)
        .map_err(|err| {
            error!(error = %err, "failed to load scan history");
            ApiError::Internal("Failed to fetch scan history".into())
        })
}

pub async fn history_summary(
    State(state): State<AppState>,
) -> Result<Json<HistorySummary>, ApiError> {
    let scans = state.pipeline.store().list_scans().await.map_err(|err| {
        error!(error = %err, "failed to load scans for summary");
        ApiError::Internal("Failed to fetch scan history".into())
    })?;
    Ok(Json(summarize(&scans, state.pipeline.thresholds())))
}

fn parse_scan_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Scan {raw} not found")))
}

pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanDetails>, ApiError> {
    let id = parse_scan_id(&id)?;
    Ok(Json(state.pipeline.store().load_details(id).await?))
}

pub async fn delete_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_scan_id(&id)?;
    let store = state.pipeline.store();
    if store.find_scan(id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Scan {id} not found")));
    }

    // `delete_scan` leaves child rows in place.
    let red_flags = store.delete_red_flags_for(id).await?;
    let alternatives = store.delete_alternatives_for(id).await?;
    if !store.delete_scan(id).await? {
        return Err(ApiError::NotFound(format!("Scan {id} not found")));
    }
    info!(scan_id = %id, red_flags, alternatives, "scan deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
