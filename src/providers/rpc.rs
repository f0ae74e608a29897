//! RPC Client Module - EVM JSON-RPC over HTTP
//!
//! 1. One `RpcProvider` per configured chain, built from a `ChainEndpoint`
//! 2. Exponential backoff retry with jitter for transient failures
//! 3. User-Agent header, gzip responses and API key masking in logs
//! 4. `ChainClient` trait so the analysis layers never see HTTP details
//!
//! JSON-RPC error objects (for example a reverted `eth_call`) are answers,
//! not outages, and are returned without retrying.

use alloy_primitives::{Address, Bytes};
use futures_util::future::{BoxFuture, FutureExt};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::{ChainEndpoint, ChainId};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    RETRY_JITTER_PERCENT, RPC_BASE_RETRY_MS, RPC_MAX_RETRY_MS, USER_AGENT as USER_AGENT_CONST,
};

/// Read-only view of one EVM chain.
///
/// Implemented by `RpcProvider` in production and by in-memory doubles in
/// tests. Methods return boxed futures so the trait stays object safe.
pub trait ChainClient: Send + Sync {
    /// Chain this client talks to
    fn chain(&self) -> ChainId;

    /// `eth_getCode` at the latest block; empty bytes for an EOA
    fn get_code(&self, address: Address) -> BoxFuture<'_, AppResult<Bytes>>;

    /// `eth_call` at the latest block, returning raw return data
    fn call(&self, to: Address, data: Bytes) -> BoxFuture<'_, AppResult<Bytes>>;
}

/// HTTP JSON-RPC provider with retry logic
#[derive(Clone)]
pub struct RpcProvider {
    chain: ChainId,
    url: String,
    /// HTTP client with custom headers (gzip enabled)
    client: reqwest::Client,
    max_retries: u32,
}

/// Outcome of a single attempt
enum AttemptError {
    /// Worth another try (transport, 5xx, 429, timeout)
    Transient(AppError),
    /// Final answer from the node
    Fatal(AppError),
}

impl RpcProvider {
    /// Create a provider for an endpoint. No network traffic happens here.
    pub fn new(endpoint: &ChainEndpoint, timeout: Duration, max_retries: u32) -> AppResult<Self> {
        if !endpoint.evm_compatible {
            return Err(AppError::unsupported_chain(endpoint.chain));
        }

        let client = Self::build_client(timeout)?;
        Ok(Self {
            chain: endpoint.chain,
            url: endpoint.rpc_url.clone(),
            client,
            max_retries,
        })
    }

    /// Build HTTP client with custom headers and gzip decompression
    fn build_client(timeout: Duration) -> AppResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorCode::ProviderInit, "Failed to build HTTP client", e)
            })
    }

    /// Execute a JSON-RPC call with retries on transient failures
    pub async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> AppResult<T> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let mut attempt = 0;
        loop {
            match self.execute_call::<T>(&payload).await {
                Ok(result) => return Ok(result),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    if attempt >= self.max_retries {
                        warn!(
                            chain = %self.chain,
                            method,
                            attempts = attempt + 1,
                            error = %e,
                            "⚠️ RPC failed after retries"
                        );
                        return Err(e);
                    }
                    if e.code == ErrorCode::UpstreamRateLimited {
                        warn!(chain = %self.chain, "⏳ Rate limited (HTTP 429), backing off");
                    }
                    let delay = backoff_delay(attempt);
                    debug!(
                        "⏳ Retry {}/{} for {} after {}ms",
                        attempt + 1,
                        self.max_retries,
                        method,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Execute a single RPC call
    async fn execute_call<T: for<'de> Deserialize<'de>>(
        &self,
        payload: &serde_json::Value,
    ) -> Result<T, AttemptError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(AppError::from(e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AttemptError::Transient(AppError::rate_limited(
                "Rate limited (HTTP 429)",
            )));
        }
        if status.is_server_error() {
            return Err(AttemptError::Transient(AppError::rpc(format!(
                "HTTP error: {}",
                status
            ))));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(AppError::rpc(format!(
                "HTTP error: {}",
                status
            ))));
        }

        let json: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(AppError::from(e)))?;

        if let Some(error) = json.error {
            if error.is_rate_limit() {
                return Err(AttemptError::Transient(AppError::rate_limited(error.message)));
            }
            return Err(AttemptError::Fatal(AppError::rpc(format!(
                "RPC error: {} (code: {})",
                error.message, error.code
            ))));
        }

        json.result
            .ok_or_else(|| AttemptError::Fatal(AppError::invalid_response("No result in response")))
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> AppResult<u64> {
        let raw: String = self.request("eth_chainId", serde_json::json!([])).await?;
        u64::from_str_radix(raw.trim_start_matches("0x"), 16)
            .map_err(|_| AppError::invalid_response(format!("Bad eth_chainId value: {}", raw)))
    }

    /// `eth_call` against the latest block
    pub async fn eth_call(&self, to: Address, data: &Bytes) -> AppResult<Bytes> {
        let params = serde_json::json!([
            { "to": to.to_string(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let raw: String = self.request("eth_call", params).await?;
        decode_hex(&raw)
    }

    /// `eth_getCode` against the latest block
    pub async fn eth_get_code(&self, address: Address) -> AppResult<Bytes> {
        let params = serde_json::json!([address.to_string(), "latest"]);
        let raw: String = self.request("eth_getCode", params).await?;
        decode_hex(&raw)
    }

    /// RPC URL with the API key hidden
    pub fn masked_url(&self) -> String {
        match self.url.split_once("/v2/") {
            Some((base, _)) => format!("{}/v2/***HIDDEN***", base),
            None => self.url.clone(),
        }
    }
}

impl ChainClient for RpcProvider {
    fn chain(&self) -> ChainId {
        self.chain
    }

    fn get_code(&self, address: Address) -> BoxFuture<'_, AppResult<Bytes>> {
        self.eth_get_code(address).boxed()
    }

    fn call(&self, to: Address, data: Bytes) -> BoxFuture<'_, AppResult<Bytes>> {
        async move { self.eth_call(to, &data).await }.boxed()
    }
}

/// Exponential backoff with ±jitter, capped
fn backoff_delay(attempt: u32) -> Duration {
    let base = RPC_BASE_RETRY_MS.saturating_mul(2_u64.saturating_pow(attempt));
    let capped = base.min(RPC_MAX_RETRY_MS);
    let jitter_range = (capped * RETRY_JITTER_PERCENT) / 100;
    let jitter: i64 = rand::thread_rng().gen_range(-(jitter_range as i64)..=(jitter_range as i64));
    Duration::from_millis((capped as i64 + jitter).max(50) as u64)
}

fn decode_hex(raw: &str) -> AppResult<Bytes> {
    let trimmed = raw.trim().trim_start_matches("0x");
    hex::decode(trimmed)
        .map(Bytes::from)
        .map_err(|e| AppError::with_source(ErrorCode::RpcInvalidResponse, "Invalid hex in RPC result", e))
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Rate limit error (HTTP 429 equivalent, code -32005)
    pub fn is_rate_limit(&self) -> bool {
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        for attempt in 0..10 {
            let delay = backoff_delay(attempt).as_millis() as u64;
            assert!(delay <= RPC_MAX_RETRY_MS + RPC_MAX_RETRY_MS * RETRY_JITTER_PERCENT / 100);
            assert!(delay >= 50);
        }
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0x").unwrap().len(), 0);
        assert_eq!(decode_hex("0x6080").unwrap().as_ref(), &[0x60, 0x80]);
        let err = decode_hex("0xzz").unwrap_err();
        assert_eq!(err.code, ErrorCode::RpcInvalidResponse);
    }

    #[test]
    fn test_rpc_error_classification() {
        let rate_limit = RpcError {
            code: -32005,
            message: "Rate limit exceeded".to_string(),
        };
        assert!(rate_limit.is_rate_limit());

        let reverted = RpcError {
            code: 3,
            message: "execution reverted".to_string(),
        };
        assert!(!reverted.is_rate_limit());
    }

    #[test]
    fn test_non_evm_endpoint_rejected() {
        let mut endpoint = ChainEndpoint::evm(ChainId::Tron, "https://example.invalid");
        endpoint.evm_compatible = false;
        let err = RpcProvider::new(&endpoint, Duration::from_secs(1), 0).err().unwrap();
        assert_eq!(err.code, ErrorCode::UnsupportedChain);
    }

    #[test]
    fn test_masked_url() {
        let endpoint = ChainEndpoint::evm(ChainId::Ethereum, "https://eth-mainnet.g.alchemy.com/v2/secret");
        let provider = RpcProvider::new(&endpoint, Duration::from_secs(1), 0).unwrap();
        assert_eq!(provider.masked_url(), "https://eth-mainnet.g.alchemy.com/v2/***HIDDEN***");
    }
}
