//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::models::errors::AppError;
use crate::models::types::SecurityReport;
use crate::utils::cache::CacheStats;
use crate::utils::stats::StatsSnapshot;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub retryable: bool,
}

impl ApiError {
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            code: "RATE_LIMITED".to_string(),
            message: format!("Rate limit exceeded. Retry after {} seconds", retry_after),
            details: Some(format!("retry_after: {}", retry_after)),
            retryable: true,
        }
    }
}

impl From<&AppError> for ApiError {
    /// User-facing message per code; operator detail only for input errors
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.user_message().to_string(),
            details: err.code.is_terminal().then(|| err.message.clone()),
            retryable: err.code.is_retryable(),
        }
    }
}

// ============================================
// Token Analysis
// ============================================

#[derive(Debug, Deserialize)]
pub struct TokenAnalysisRequest {
    #[serde(alias = "address")]
    pub token_address: String,
    /// Chain name, alias or numeric EVM id (e.g. "eth", "bsc", "137")
    #[serde(default = "default_chain")]
    pub chain: String,
}

fn default_chain() -> String {
    "eth".to_string()
}

#[derive(Debug, Serialize)]
pub struct TokenAnalysisData {
    pub report: SecurityReport,
    pub recommendation: String,
    pub explorer_url: String,
}

// ============================================
// Stats
// ============================================

#[derive(Debug, Serialize)]
pub struct StatsData {
    pub analysis: StatsSnapshot,
    pub caches: Vec<CacheStats>,
    pub uptime_seconds: u64,
    pub api_version: String,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub chains: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_from_app_error() {
        let err = AppError::not_a_contract("0xabc");
        let api: ApiError = (&err).into();
        assert_eq!(api.code, "NOT_A_CONTRACT");
        assert!(!api.retryable);
        assert!(api.details.is_some());

        let err = AppError::provider_init("connect refused to http://10.0.0.1");
        let api: ApiError = (&err).into();
        assert_eq!(api.code, "PROVIDER_INIT");
        assert!(api.retryable);
        assert!(api.details.is_none());
    }

    #[test]
    fn test_request_defaults_to_ethereum() {
        let req: TokenAnalysisRequest =
            serde_json::from_str(r#"{"address":"0xdAC17F958D2ee523a2206206994597C13D831ec7"}"#)
                .unwrap();
        assert_eq!(req.chain, "eth");
    }
}
