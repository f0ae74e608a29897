//! API Request Handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use super::types::*;
use crate::core::analyzer::SecurityAnalyzer;
use crate::core::risk_score::recommendation;
use crate::models::config::ChainId;
use crate::models::errors::AppError;
use crate::utils::constants::{get_explorer_url, APP_VERSION};

type HandlerError = (StatusCode, Json<ApiResponse<()>>);

/// Shared application state
pub struct AppState {
    pub analyzer: SecurityAnalyzer,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(analyzer: SecurityAnalyzer) -> Self {
        Self {
            analyzer,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Map an analysis error to its HTTP status and public body
pub fn error_response(err: &AppError, start: Instant) -> HandlerError {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ApiResponse::error(ApiError::from(err), elapsed_ms(start))),
    )
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();

    let data = HealthData {
        status: "healthy".to_string(),
        version: APP_VERSION.to_string(),
        uptime_seconds: state.uptime_seconds(),
        chains: state
            .analyzer
            .supported_chains()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Token Analysis
// ============================================

pub async fn analyze_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenAnalysisRequest>,
) -> Result<Json<ApiResponse<TokenAnalysisData>>, HandlerError> {
    let start = Instant::now();

    let chain = ChainId::from_str(&req.chain).map_err(|e| error_response(&e, start))?;

    // Dropping this future (client disconnect) releases the analysis.
    let report = state
        .analyzer
        .analyze_token(&req.token_address, chain)
        .await
        .map_err(|e| error_response(&e, start))?;

    let explorer_url = format!(
        "{}/token/{}",
        get_explorer_url(chain.evm_id().unwrap_or_default()),
        report.address
    );
    let data = TokenAnalysisData {
        recommendation: recommendation(report.risk_level).to_string(),
        explorer_url,
        report,
    };

    Ok(Json(ApiResponse::success(data, elapsed_ms(start))))
}

// ============================================
// Stats
// ============================================

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StatsData>> {
    let start = Instant::now();

    let data = StatsData {
        analysis: state.analyzer.stats(),
        caches: state.analyzer.cache_stats(),
        uptime_seconds: state.uptime_seconds(),
        api_version: APP_VERSION.to_string(),
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}
