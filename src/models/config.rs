//! Configuration module for Token Guard
//!
//! Chain identifiers, per-chain endpoints and runtime tunables.
//! Endpoint tables and env var names come from `utils::constants`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    build_alchemy_url, explorer_key_env_var, get_explorer_api_url, rpc_env_var,
    DEFAULT_ANALYSIS_TIMEOUT_MS, DEFAULT_CACHE_TTL_SECS, DEFAULT_REPORT_TTL_SECS,
    DEFAULT_RPC_MAX_RETRIES, DEFAULT_RPC_TIMEOUT_MS, CHAIN_ID_ARBITRUM, CHAIN_ID_AVALANCHE,
    CHAIN_ID_BASE, CHAIN_ID_BSC, CHAIN_ID_ETHEREUM, CHAIN_ID_OPTIMISM, CHAIN_ID_POLYGON,
};

/// Blockchain networks known to the analyzer.
///
/// `Tron` and `Sui` are declared so that user input naming them gets a
/// precise "unsupported" answer instead of a parse failure; they are never
/// routed to an EVM client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainId {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
    Base,
    Tron,
    Sui,
}

impl ChainId {
    /// Every declared chain, EVM first
    pub const ALL: [ChainId; 9] = [
        ChainId::Ethereum,
        ChainId::Bsc,
        ChainId::Polygon,
        ChainId::Arbitrum,
        ChainId::Optimism,
        ChainId::Avalanche,
        ChainId::Base,
        ChainId::Tron,
        ChainId::Sui,
    ];

    /// Numeric EVM chain id, `None` for non-EVM chains
    pub fn evm_id(&self) -> Option<u64> {
        match self {
            Self::Ethereum => Some(CHAIN_ID_ETHEREUM),
            Self::Bsc => Some(CHAIN_ID_BSC),
            Self::Polygon => Some(CHAIN_ID_POLYGON),
            Self::Arbitrum => Some(CHAIN_ID_ARBITRUM),
            Self::Optimism => Some(CHAIN_ID_OPTIMISM),
            Self::Avalanche => Some(CHAIN_ID_AVALANCHE),
            Self::Base => Some(CHAIN_ID_BASE),
            Self::Tron | Self::Sui => None,
        }
    }

    /// Get chain from numeric EVM id
    pub fn from_evm_id(id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.evm_id() == Some(id))
    }

    pub fn is_evm(&self) -> bool {
        self.evm_id().is_some()
    }

    /// Short key used in cache keys and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "eth",
            Self::Bsc => "bsc",
            Self::Polygon => "polygon",
            Self::Arbitrum => "arbitrum",
            Self::Optimism => "optimism",
            Self::Avalanche => "avalanche",
            Self::Base => "base",
            Self::Tron => "tron",
            Self::Sui => "sui",
        }
    }

    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ethereum => "Ethereum",
            Self::Bsc => "BNB Smart Chain",
            Self::Polygon => "Polygon",
            Self::Arbitrum => "Arbitrum One",
            Self::Optimism => "Optimism",
            Self::Avalanche => "Avalanche C-Chain",
            Self::Base => "Base",
            Self::Tron => "Tron",
            Self::Sui => "Sui",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let chain = match key.as_str() {
            "eth" | "ethereum" | "mainnet" => Self::Ethereum,
            "bsc" | "bnb" | "binance" => Self::Bsc,
            "polygon" | "matic" => Self::Polygon,
            "arbitrum" | "arb" => Self::Arbitrum,
            "optimism" | "op" => Self::Optimism,
            "avalanche" | "avax" => Self::Avalanche,
            "base" => Self::Base,
            "tron" | "trx" => Self::Tron,
            "sui" => Self::Sui,
            other => {
                return other
                    .parse::<u64>()
                    .ok()
                    .and_then(Self::from_evm_id)
                    .ok_or_else(|| {
                        AppError::new(
                            ErrorCode::UnsupportedChain,
                            format!("Unknown chain: {}", s),
                        )
                    })
            }
        };
        Ok(chain)
    }
}

/// Connection settings for one chain. Immutable once the registry is built.
#[derive(Debug, Clone)]
pub struct ChainEndpoint {
    pub chain: ChainId,
    pub rpc_url: String,
    pub explorer_api_url: Option<String>,
    pub explorer_api_key: Option<String>,
    pub evm_compatible: bool,
}

impl ChainEndpoint {
    /// EVM endpoint with the default explorer URL for the chain
    pub fn evm(chain: ChainId, rpc_url: impl Into<String>) -> Self {
        Self {
            chain,
            rpc_url: rpc_url.into(),
            explorer_api_url: chain
                .evm_id()
                .and_then(get_explorer_api_url)
                .map(String::from),
            explorer_api_key: None,
            evm_compatible: chain.is_evm(),
        }
    }

    pub fn with_explorer_key(mut self, key: impl Into<String>) -> Self {
        self.explorer_api_key = Some(key.into());
        self
    }

    /// RPC URL with any embedded API key hidden (for logging)
    pub fn masked_rpc_url(&self) -> String {
        if let Some((base, _)) = self.rpc_url.split_once("/v2/") {
            return format!("{}/v2/***HIDDEN***", base);
        }
        self.rpc_url.clone()
    }
}

/// Runtime configuration for the analyzer
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Configured chains; chains without an RPC endpoint are absent
    pub endpoints: HashMap<ChainId, ChainEndpoint>,
    /// Timeout for each RPC / explorer request
    pub rpc_timeout: Duration,
    /// Deadline for a whole analysis
    pub analysis_timeout: Duration,
    /// TTL for bytecode / token info / source caches
    pub cache_ttl: Duration,
    /// TTL for composed security reports
    pub report_ttl: Duration,
    /// Retry attempts for transient RPC failures
    pub rpc_max_retries: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            endpoints: HashMap::new(),
            rpc_timeout: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            analysis_timeout: Duration::from_millis(DEFAULT_ANALYSIS_TIMEOUT_MS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            report_ttl: Duration::from_secs(DEFAULT_REPORT_TTL_SECS),
            rpc_max_retries: DEFAULT_RPC_MAX_RETRIES,
        }
    }
}

impl GuardConfig {
    /// Build configuration from environment variables.
    ///
    /// Chains get an RPC URL from their dedicated env var, else from
    /// `ALCHEMY_API_KEY`. A chain with neither is left out entirely.
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();
        let alchemy_key = non_placeholder_env("ALCHEMY_API_KEY");
        if alchemy_key.is_some() {
            info!("🔑 ALCHEMY_API_KEY configured (key hidden for security)");
        }

        for chain in ChainId::ALL {
            let Some(chain_id) = chain.evm_id() else {
                continue;
            };

            let rpc_url = rpc_env_var(chain_id)
                .and_then(non_placeholder_env)
                .or_else(|| {
                    alchemy_key
                        .as_deref()
                        .and_then(|k| build_alchemy_url(chain_id, k))
                });

            let Some(rpc_url) = rpc_url else {
                warn!(chain = %chain, "No RPC endpoint configured, chain disabled");
                continue;
            };

            let mut endpoint = ChainEndpoint::evm(chain, rpc_url);
            if let Some(key) = explorer_key_env_var(chain_id).and_then(non_placeholder_env) {
                endpoint = endpoint.with_explorer_key(key);
            } else {
                info!(chain = %chain, "No explorer API key, source checks degrade to bytecode-only");
            }
            config.endpoints.insert(chain, endpoint);
        }

        config.rpc_timeout = Duration::from_millis(env_u64("GUARD_RPC_TIMEOUT_MS", DEFAULT_RPC_TIMEOUT_MS)?);
        config.analysis_timeout =
            Duration::from_millis(env_u64("GUARD_ANALYSIS_TIMEOUT_MS", DEFAULT_ANALYSIS_TIMEOUT_MS)?);
        config.cache_ttl = Duration::from_secs(env_u64("GUARD_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?);
        config.report_ttl = Duration::from_secs(env_u64("GUARD_REPORT_TTL_SECS", DEFAULT_REPORT_TTL_SECS)?);
        config.rpc_max_retries = env_u64("GUARD_RPC_MAX_RETRIES", DEFAULT_RPC_MAX_RETRIES as u64)? as u32;

        Ok(config)
    }

    /// Add or replace a chain endpoint
    pub fn with_endpoint(mut self, endpoint: ChainEndpoint) -> Self {
        self.endpoints.insert(endpoint.chain, endpoint);
        self
    }
}

fn non_placeholder_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.contains("YOUR_API_KEY"))
}

fn env_u64(name: &str, default: u64) -> AppResult<u64> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
            AppError::new(
                ErrorCode::ConfigInvalidValue,
                format!("{} must be an integer, got {:?}", name, raw),
            )
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_parsing_aliases() {
        assert_eq!("ETH".parse::<ChainId>().unwrap(), ChainId::Ethereum);
        assert_eq!("matic".parse::<ChainId>().unwrap(), ChainId::Polygon);
        assert_eq!("56".parse::<ChainId>().unwrap(), ChainId::Bsc);
        assert_eq!("tron".parse::<ChainId>().unwrap(), ChainId::Tron);
        let err = "dogechain".parse::<ChainId>().unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedChain);
    }

    #[test]
    fn test_declared_unsupported_chains_are_not_evm() {
        assert!(!ChainId::Tron.is_evm());
        assert!(!ChainId::Sui.is_evm());
        assert_eq!(ChainId::from_evm_id(8453), Some(ChainId::Base));
        assert_eq!(ChainId::from_evm_id(999), None);
    }

    #[test]
    fn test_masked_rpc_url() {
        let ep = ChainEndpoint::evm(ChainId::Ethereum, "https://eth-mainnet.g.alchemy.com/v2/secret");
        assert_eq!(ep.masked_rpc_url(), "https://eth-mainnet.g.alchemy.com/v2/***HIDDEN***");
        assert_eq!(ep.with_explorer_key("k").explorer_api_key.as_deref(), Some("k"));
    }
}
