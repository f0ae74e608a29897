//! Centralized Error Handling Module
//!
//! Every failure carries a unique code so degraded or failed analyses can be
//! told apart in logs and by consumers.
//!
//! Only the analyzer-boundary codes (`UnsupportedChain`, `NotAContract`,
//! `InvalidAddress`, `ProviderInit`, `Timeout`, `UpstreamRateLimited`) ever
//! leave `SecurityAnalyzer::analyze_token`. The remaining codes are internal:
//! field-level failures are recovered into sentinel values before they reach
//! the boundary.

use std::fmt;
use std::sync::Arc;

/// Application-wide error type.
///
/// Clonable so that a single failed computation can be handed to every
/// waiter coalesced onto it.
#[derive(Debug, Clone)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable (operator facing) message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    /// Message suitable for end users, one per code
    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // ============================================
    // Analyzer boundary
    // ============================================
    /// Chain not configured or not EVM-compatible (terminal)
    UnsupportedChain,
    /// Target address holds no code (terminal)
    NotAContract,
    /// Address string is malformed (terminal)
    InvalidAddress,
    /// Chain client could not be built or used (transient, retried lazily)
    ProviderInit,
    /// Deadline exceeded or caller cancelled
    Timeout,
    /// Upstream RPC / explorer throttled us (transient)
    UpstreamRateLimited,

    // ============================================
    // Internal (recovered before the boundary)
    // ============================================
    /// RPC returned an error response or transport failed
    RpcError,
    /// RPC / explorer payload could not be decoded
    RpcInvalidResponse,
    /// Explorer API returned an error status
    ExplorerError,
    /// Invalid configuration value
    ConfigInvalidValue,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedChain => "UNSUPPORTED_CHAIN",
            Self::NotAContract => "NOT_A_CONTRACT",
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::ProviderInit => "PROVIDER_INIT",
            Self::Timeout => "TIMEOUT",
            Self::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            Self::RpcError => "RPC_ERROR",
            Self::RpcInvalidResponse => "RPC_INVALID_RESPONSE",
            Self::ExplorerError => "EXPLORER_ERROR",
            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",
        }
    }

    /// Distinct end-user message, pointing at a corrective action
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedChain => {
                "This blockchain is not supported yet. Please choose another chain."
            }
            Self::NotAContract => {
                "This address is not a smart contract. Please check the token address."
            }
            Self::InvalidAddress => "The address format is invalid. Please check and try again.",
            Self::ProviderInit => {
                "The blockchain connection is currently unavailable. Please try again later."
            }
            Self::Timeout => "The analysis took too long and was cancelled. Please try again.",
            Self::UpstreamRateLimited => {
                "Our data providers are busy right now. Please try again in a few moments."
            }
            Self::RpcError
            | Self::RpcInvalidResponse
            | Self::ExplorerError
            | Self::ConfigInvalidValue => "An internal error occurred while analyzing the token.",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidAddress | Self::ConfigInvalidValue => 400,
            Self::NotAContract => 404,
            Self::UnsupportedChain => 422,
            Self::UpstreamRateLimited => 429,
            Self::ProviderInit | Self::RpcError | Self::ExplorerError => 503,
            Self::Timeout => 504,
            Self::RpcInvalidResponse => 502,
        }
    }

    /// Check if error is worth retrying later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderInit | Self::Timeout | Self::UpstreamRateLimited | Self::RpcError
        )
    }

    /// Terminal, user-facing conditions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedChain | Self::NotAContract | Self::InvalidAddress
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    pub fn unsupported_chain(chain: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::UnsupportedChain,
            format!("Unsupported chain: {}", chain),
        )
    }

    pub fn not_a_contract(address: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::NotAContract,
            format!("Address {} has no contract code", address),
        )
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidAddress, msg)
    }

    pub fn provider_init(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProviderInit, msg)
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Timeout, msg)
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamRateLimited, msg)
    }

    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcError, msg)
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::RpcInvalidResponse, msg)
    }

    pub fn explorer(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExplorerError, msg)
    }

    /// Map internal codes onto the analyzer boundary taxonomy.
    ///
    /// A generic RPC failure on a step that cannot degrade means the chain
    /// client is unusable right now, which callers handle like `ProviderInit`.
    pub fn into_boundary(self) -> Self {
        match self.code {
            ErrorCode::RpcError | ErrorCode::RpcInvalidResponse | ErrorCode::ExplorerError => {
                Self {
                    code: ErrorCode::ProviderInit,
                    ..self
                }
            }
            _ => self,
        }
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<eyre::Report> for AppError {
    fn from(err: eyre::Report) -> Self {
        Self::new(ErrorCode::RpcError, err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::Timeout, "Request timeout")
        } else if err.status().map(|s| s.as_u16()) == Some(429) {
            Self::new(ErrorCode::UpstreamRateLimited, "Rate limited (HTTP 429)")
        } else if err.is_decode() {
            Self::with_source(ErrorCode::RpcInvalidResponse, "Failed to decode response", err)
        } else {
            Self::with_source(ErrorCode::RpcError, "Request failed", err)
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::RpcInvalidResponse, "JSON parse error", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::timeout("deadline exceeded");
        assert_eq!(err.code, ErrorCode::Timeout);
        assert_eq!(err.code_str(), "TIMEOUT");
        assert_eq!(err.to_string(), "[TIMEOUT] deadline exceeded");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(ErrorCode::UpstreamRateLimited.is_retryable());
        assert!(ErrorCode::ProviderInit.is_retryable());
        assert!(!ErrorCode::NotAContract.is_retryable());
        assert!(ErrorCode::UnsupportedChain.is_terminal());
    }

    #[test]
    fn test_user_messages_are_distinct_per_boundary_code() {
        let codes = [
            ErrorCode::UnsupportedChain,
            ErrorCode::NotAContract,
            ErrorCode::InvalidAddress,
            ErrorCode::ProviderInit,
            ErrorCode::Timeout,
            ErrorCode::UpstreamRateLimited,
        ];
        let messages: std::collections::HashSet<_> =
            codes.iter().map(|c| c.user_message()).collect();
        assert_eq!(messages.len(), codes.len());
    }

    #[test]
    fn test_into_boundary_maps_internal_codes() {
        let err = AppError::rpc("connection reset").into_boundary();
        assert_eq!(err.code, ErrorCode::ProviderInit);
        assert_eq!(err.message, "connection reset");

        let err = AppError::rate_limited("429").into_boundary();
        assert_eq!(err.code, ErrorCode::UpstreamRateLimited);
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::InvalidAddress.http_status(), 400);
        assert_eq!(ErrorCode::UpstreamRateLimited.http_status(), 429);
        assert_eq!(ErrorCode::Timeout.http_status(), 504);
    }
}
