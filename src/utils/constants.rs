//! Constants Module - Single Source of Truth
//!
//! Chain ids, endpoint tables, well-known addresses, selectors and defaults
//! used across the crate. Other modules must not hardcode these values.

use alloy_primitives::Address;

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "TokenGuard";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests
pub const USER_AGENT: &str = "TokenGuard/0.1.0";

// ============================================
// TIMEOUTS, RETRIES & TTLs
// ============================================

/// Default timeout for a single RPC / explorer request (milliseconds)
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 10_000;

/// Default deadline for a whole analysis (milliseconds)
pub const DEFAULT_ANALYSIS_TIMEOUT_MS: u64 = 45_000;

/// Default TTL for field-level caches: bytecode, token info, source (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default TTL for composed security reports (seconds)
pub const DEFAULT_REPORT_TTL_SECS: u64 = 600;

/// Interval of the background sweep over expired cache entries (seconds)
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default retry attempts for transient RPC failures
pub const DEFAULT_RPC_MAX_RETRIES: u32 = 3;

/// Base retry delay (milliseconds), doubled per attempt
pub const RPC_BASE_RETRY_MS: u64 = 250;

/// Retry delay cap (milliseconds)
pub const RPC_MAX_RETRY_MS: u64 = 4_000;

/// Jitter applied to retry delays (percent)
pub const RETRY_JITTER_PERCENT: u64 = 20;

// ============================================
// CHAIN IDS
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;
/// BNB Smart Chain
pub const CHAIN_ID_BSC: u64 = 56;
/// Polygon
pub const CHAIN_ID_POLYGON: u64 = 137;
/// Arbitrum One
pub const CHAIN_ID_ARBITRUM: u64 = 42161;
/// Optimism
pub const CHAIN_ID_OPTIMISM: u64 = 10;
/// Avalanche C-Chain
pub const CHAIN_ID_AVALANCHE: u64 = 43114;
/// Base
pub const CHAIN_ID_BASE: u64 = 8453;

/// All EVM chain ids the analyzer can talk to
pub const SUPPORTED_CHAIN_IDS: [u64; 7] = [
    CHAIN_ID_ETHEREUM,
    CHAIN_ID_BSC,
    CHAIN_ID_POLYGON,
    CHAIN_ID_ARBITRUM,
    CHAIN_ID_OPTIMISM,
    CHAIN_ID_AVALANCHE,
    CHAIN_ID_BASE,
];

// ============================================
// ENDPOINT TABLES
// ============================================

/// Env var holding the explicit RPC URL for a chain
pub fn rpc_env_var(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("ETH_HTTP_URL"),
        CHAIN_ID_BSC => Some("BSC_HTTP_URL"),
        CHAIN_ID_POLYGON => Some("POLYGON_HTTP_URL"),
        CHAIN_ID_ARBITRUM => Some("ARBITRUM_HTTP_URL"),
        CHAIN_ID_OPTIMISM => Some("OPTIMISM_HTTP_URL"),
        CHAIN_ID_AVALANCHE => Some("AVALANCHE_HTTP_URL"),
        CHAIN_ID_BASE => Some("BASE_HTTP_URL"),
        _ => None,
    }
}

/// Env var holding the block-explorer API key for a chain
pub fn explorer_key_env_var(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("ETHERSCAN_API_KEY"),
        CHAIN_ID_BSC => Some("BSCSCAN_API_KEY"),
        CHAIN_ID_POLYGON => Some("POLYGONSCAN_API_KEY"),
        CHAIN_ID_ARBITRUM => Some("ARBISCAN_API_KEY"),
        CHAIN_ID_OPTIMISM => Some("OPTIMISM_ETHERSCAN_API_KEY"),
        CHAIN_ID_AVALANCHE => Some("SNOWTRACE_API_KEY"),
        CHAIN_ID_BASE => Some("BASESCAN_API_KEY"),
        _ => None,
    }
}

/// Etherscan-family API base URL for a chain
pub fn get_explorer_api_url(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("https://api.etherscan.io/api"),
        CHAIN_ID_BSC => Some("https://api.bscscan.com/api"),
        CHAIN_ID_POLYGON => Some("https://api.polygonscan.com/api"),
        CHAIN_ID_ARBITRUM => Some("https://api.arbiscan.io/api"),
        CHAIN_ID_OPTIMISM => Some("https://api-optimistic.etherscan.io/api"),
        CHAIN_ID_AVALANCHE => Some("https://api.snowtrace.io/api"),
        CHAIN_ID_BASE => Some("https://api.basescan.org/api"),
        _ => None,
    }
}

/// Get Alchemy subdomain for a chain
pub fn get_alchemy_subdomain(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        CHAIN_ID_ETHEREUM => Some("eth-mainnet"),
        CHAIN_ID_BSC => Some("bnb-mainnet"),
        CHAIN_ID_POLYGON => Some("polygon-mainnet"),
        CHAIN_ID_ARBITRUM => Some("arb-mainnet"),
        CHAIN_ID_OPTIMISM => Some("opt-mainnet"),
        CHAIN_ID_AVALANCHE => Some("avax-mainnet"),
        CHAIN_ID_BASE => Some("base-mainnet"),
        _ => None,
    }
}

/// Build Alchemy URL for a chain
pub fn build_alchemy_url(chain_id: u64, api_key: &str) -> Option<String> {
    get_alchemy_subdomain(chain_id)
        .map(|subdomain| format!("https://{}.g.alchemy.com/v2/{}", subdomain, api_key))
}

/// Get block explorer web URL (for report links)
pub fn get_explorer_url(chain_id: u64) -> &'static str {
    match chain_id {
        CHAIN_ID_ETHEREUM => "https://etherscan.io",
        CHAIN_ID_BSC => "https://bscscan.com",
        CHAIN_ID_POLYGON => "https://polygonscan.com",
        CHAIN_ID_ARBITRUM => "https://arbiscan.io",
        CHAIN_ID_OPTIMISM => "https://optimistic.etherscan.io",
        CHAIN_ID_AVALANCHE => "https://snowtrace.io",
        CHAIN_ID_BASE => "https://basescan.org",
        _ => "https://etherscan.io",
    }
}

// ============================================
// WELL-KNOWN ADDRESSES
// ============================================

/// Canonical burn address used when renouncing ownership
pub const BURN_ADDRESS: Address = Address::new([
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0xde, 0xad,
]);

/// True when `owner` is the zero address or the canonical burn address.
///
/// `Address` equality is byte-wise, so checksum casing of the input string
/// never matters here.
#[inline]
pub fn is_renounced_owner(owner: &Address) -> bool {
    *owner == Address::ZERO || *owner == BURN_ADDRESS
}

// ============================================
// FUNCTION SELECTORS
// ============================================

/// `mint(address,uint256)`
pub const SELECTOR_MINT: &str = "40c10f19";

/// topic0 of `OwnershipTransferred(address,address)`
pub const TOPIC_OWNERSHIP_TRANSFERRED: &str =
    "0x8be0079c531659141344cd1fd0a4f28419497f9722a3daafe3b4186f6b6457e0";

// ============================================
// TOKEN DESCRIPTOR SENTINELS
// ============================================

pub const UNKNOWN_TOKEN_NAME: &str = "Unknown Token";
pub const UNKNOWN_TOKEN_SYMBOL: &str = "UNKNOWN";
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_every_supported_chain_has_endpoints() {
        for chain_id in SUPPORTED_CHAIN_IDS {
            assert!(rpc_env_var(chain_id).is_some());
            assert!(explorer_key_env_var(chain_id).is_some());
            assert!(get_explorer_api_url(chain_id).is_some());
            assert!(build_alchemy_url(chain_id, "k").is_some());
        }
    }

    #[test]
    fn test_ownership_topic_is_event_hash() {
        let hash = alloy_primitives::keccak256("OwnershipTransferred(address,address)");
        assert_eq!(format!("{:?}", hash), TOPIC_OWNERSHIP_TRANSFERRED);
    }

    #[test]
    fn test_burn_address_matches_any_casing() {
        let lower = Address::from_str("0x000000000000000000000000000000000000dead").unwrap();
        let mixed = Address::from_str("0x000000000000000000000000000000000000dEaD").unwrap();
        assert!(is_renounced_owner(&lower));
        assert!(is_renounced_owner(&mixed));
        assert!(is_renounced_owner(&Address::ZERO));
        assert!(!is_renounced_owner(
            &Address::from_str("0xdAC17F958D2ee523a2206206994597C13D831ec7").unwrap()
        ));
    }
}
