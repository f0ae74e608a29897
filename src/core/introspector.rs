//! Contract Introspector - raw chain reads for one contract
//!
//! Every read goes through the chain registry, is bounded by a timeout and
//! is cached per `(kind, chain, address)`:
//! - `bytecode`   : deployed code (only non-empty code is stored)
//! - `isContract` : positive answers only
//! - `tokenInfo`  : descriptors whose every field was read successfully
//! - `owner`      : resolved owners (`owner()`, then explorer fallbacks)
//!
//! Concurrent reads of the same key share one computation. Field reads
//! degrade to sentinel values instead of failing.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::config::{ChainId, GuardConfig};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{
    scale_supply, ContractProbe, OwnerSource, OwnershipInfo, TokenDescriptor,
};
use crate::providers::explorer::SourceLookup;
use crate::providers::registry::ChainRegistry;
use crate::providers::rpc::ChainClient;
use crate::utils::cache::{CacheKey, ResultCache};
use crate::utils::constants::{DEFAULT_TOKEN_DECIMALS, UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL};
use crate::utils::stats::AnalysisStats;

sol! {
    function name() external view returns (string);
    function symbol() external view returns (string);
    function decimals() external view returns (uint8);
    function totalSupply() external view returns (uint256);
    function owner() external view returns (address);
}

pub const CACHE_KIND_BYTECODE: &str = "bytecode";
pub const CACHE_KIND_IS_CONTRACT: &str = "isContract";
pub const CACHE_KIND_TOKEN_INFO: &str = "tokenInfo";
pub const CACHE_KIND_OWNER: &str = "owner";

/// Descriptor plus whether every field came from the chain
#[derive(Debug, Clone)]
struct TokenProbe {
    descriptor: TokenDescriptor,
    complete: bool,
}

/// Read-side view of contracts on every registered chain
pub struct ContractIntrospector {
    registry: Arc<ChainRegistry>,
    /// Explorer used when `owner()` cannot name an owner
    explorer: Arc<dyn SourceLookup>,
    bytecode_cache: ResultCache<Bytes>,
    is_contract_cache: ResultCache<bool>,
    token_cache: ResultCache<TokenProbe>,
    owner_cache: ResultCache<OwnershipInfo>,
    /// Budget for one logical read, retries included
    call_timeout: Duration,
    stats: Arc<AnalysisStats>,
}

impl ContractIntrospector {
    pub fn new(
        registry: Arc<ChainRegistry>,
        explorer: Arc<dyn SourceLookup>,
        config: &GuardConfig,
        stats: Arc<AnalysisStats>,
    ) -> Self {
        let call_timeout = config.rpc_timeout * (config.rpc_max_retries + 1);
        Self {
            registry,
            explorer,
            bytecode_cache: ResultCache::new(CACHE_KIND_BYTECODE, config.cache_ttl),
            is_contract_cache: ResultCache::new(CACHE_KIND_IS_CONTRACT, config.cache_ttl),
            token_cache: ResultCache::new(CACHE_KIND_TOKEN_INFO, config.cache_ttl),
            owner_cache: ResultCache::new(CACHE_KIND_OWNER, config.cache_ttl),
            call_timeout,
            stats,
        }
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    /// True when the address holds code. Negative answers are not cached.
    pub async fn is_contract(&self, address: Address, chain: ChainId) -> AppResult<bool> {
        let client = self.registry.client_for(chain).await?;
        let key = CacheKey::new(CACHE_KIND_IS_CONTRACT, chain, address.to_string());
        let code_cache = self.bytecode_cache.clone();
        let timeout = self.call_timeout;

        let result = self
            .is_contract_cache
            .get_or_compute(&key, move || async move {
                load_code(code_cache, client, address, timeout).await.map(|_| true)
            })
            .await;

        match result {
            Ok(is_contract) => Ok(is_contract),
            Err(e) if e.code == ErrorCode::NotAContract => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deployed code; empty for an address without code
    pub async fn get_bytecode(&self, address: Address, chain: ChainId) -> AppResult<Bytes> {
        let client = self.registry.client_for(chain).await?;
        match load_code(self.bytecode_cache.clone(), client, address, self.call_timeout).await {
            Ok(code) => Ok(code),
            Err(e) if e.code == ErrorCode::NotAContract => Ok(Bytes::new()),
            Err(e) => Err(e),
        }
    }

    /// Contract classification and code in one value.
    ///
    /// Only a failed contract check is an error. A bytecode read failing
    /// after a positive check leaves `bytecode` empty and is logged.
    pub async fn probe_contract(&self, address: Address, chain: ChainId) -> AppResult<ContractProbe> {
        let is_contract = self.is_contract(address, chain).await?;
        let bytecode = if is_contract {
            self.get_bytecode(address, chain).await.unwrap_or_else(|e| {
                warn!(chain = %chain, address = %address, field = "bytecode", error = %e, "Bytecode unavailable, continuing without it");
                self.stats.record_degraded_read();
                Bytes::new()
            })
        } else {
            Bytes::new()
        };

        Ok(ContractProbe {
            address,
            chain,
            is_contract,
            bytecode,
            fetched_at: Utc::now(),
        })
    }

    /// ERC-20 metadata. Never fails: each unreadable field keeps its
    /// sentinel and the failure is logged. Only complete descriptors are
    /// cached.
    pub async fn probe_token(&self, address: Address, chain: ChainId) -> TokenDescriptor {
        let client = match self.registry.client_for(chain).await {
            Ok(client) => client,
            Err(e) => {
                warn!(chain = %chain, address = %address, field = "all", error = %e, "Token probe degraded");
                self.stats.record_degraded_read();
                return TokenDescriptor::default();
            }
        };

        let key = CacheKey::new(CACHE_KIND_TOKEN_INFO, chain, address.to_string());
        let timeout = self.call_timeout;
        let stats = Arc::clone(&self.stats);
        let probe = self
            .token_cache
            .get_or_compute_if(
                &key,
                move || async move { Ok(read_descriptor(client, address, timeout, stats).await) },
                |probe| probe.complete,
            )
            .await;

        probe.map(|p| p.descriptor).unwrap_or_default()
    }

    /// Current owner. Tries `owner()`, then the latest ownership event and
    /// finally the deployer as reported by the explorer. Soft-fails to the
    /// zero value.
    pub async fn check_ownership(&self, address: Address, chain: ChainId) -> OwnershipInfo {
        let client = match self.registry.client_for(chain).await {
            Ok(client) => client,
            Err(e) => {
                debug!(chain = %chain, address = %address, error = %e, "Ownership check skipped");
                return OwnershipInfo::default();
            }
        };

        let key = CacheKey::new(CACHE_KIND_OWNER, chain, address.to_string());
        let timeout = self.call_timeout;
        let explorer = Arc::clone(&self.explorer);
        let result = self
            .owner_cache
            .get_or_compute(&key, move || async move {
                let data = Bytes::from(ownerCall {}.abi_encode());
                let call_error =
                    match with_timeout(timeout, "owner()", client.call(address, data)).await {
                        Ok(raw) => match decode_owner(&raw) {
                            Ok(owner) => return Ok(OwnershipInfo::from_owner(owner)),
                            Err(e) => e,
                        },
                        Err(e) => e,
                    };
                debug!(chain = %chain, address = %address, error = %call_error, "owner() unavailable, asking the explorer");

                let from_event = with_timeout(
                    timeout,
                    "ownership events",
                    explorer.latest_owner_transfer(chain, address),
                )
                .await;
                match from_event {
                    Ok(Some(owner)) => {
                        return Ok(OwnershipInfo::resolved(owner, OwnerSource::OwnershipEvent))
                    }
                    Ok(None) => {}
                    Err(e) => debug!(chain = %chain, address = %address, error = %e, "Ownership event lookup failed"),
                }

                let creator = with_timeout(
                    timeout,
                    "contract creation",
                    explorer.contract_creator(chain, address),
                )
                .await;
                match creator {
                    Ok(Some(creator)) => {
                        return Ok(OwnershipInfo::resolved(creator, OwnerSource::ContractCreator))
                    }
                    Ok(None) => {}
                    Err(e) => debug!(chain = %chain, address = %address, error = %e, "Creator lookup failed"),
                }

                Err(call_error)
            })
            .await;

        result.unwrap_or_else(|e| {
            debug!(chain = %chain, address = %address, field = "owner", error = %e, "Owner not found, ownership unknown");
            OwnershipInfo::default()
        })
    }

    /// Drop expired entries from every cache
    pub fn cleanup_expired(&self) -> usize {
        self.bytecode_cache.cleanup_expired()
            + self.is_contract_cache.cleanup_expired()
            + self.token_cache.cleanup_expired()
            + self.owner_cache.cleanup_expired()
    }

    pub fn cache_stats(&self) -> Vec<crate::utils::cache::CacheStats> {
        vec![
            self.bytecode_cache.stats(),
            self.is_contract_cache.stats(),
            self.token_cache.stats(),
            self.owner_cache.stats(),
        ]
    }
}

/// The four descriptor fields, read concurrently with one fallback each
async fn read_descriptor(
    client: Arc<dyn ChainClient>,
    address: Address,
    timeout: Duration,
    stats: Arc<AnalysisStats>,
) -> TokenProbe {
    let chain = client.chain();
    let client = client.as_ref();
    let (name, symbol, decimals, supply) = tokio::join!(
        read_field(client, timeout, address, nameCall {}.abi_encode(), decode_name),
        read_field(client, timeout, address, symbolCall {}.abi_encode(), decode_symbol),
        read_field(client, timeout, address, decimalsCall {}.abi_encode(), decode_decimals),
        read_field(client, timeout, address, totalSupplyCall {}.abi_encode(), decode_total_supply),
    );

    let mut complete = true;
    let mut degraded = |field: &str, e: &AppError| {
        complete = false;
        stats.record_degraded_read();
        warn!(chain = %chain, address = %address, field, error = %e, "Token field read failed, using default");
    };

    let name = name.unwrap_or_else(|e| {
        degraded("name", &e);
        UNKNOWN_TOKEN_NAME.to_string()
    });
    let symbol = symbol.unwrap_or_else(|e| {
        degraded("symbol", &e);
        UNKNOWN_TOKEN_SYMBOL.to_string()
    });
    let (decimals, decimals_known) = match decimals {
        Ok(d) => (d, true),
        Err(e) => {
            degraded("decimals", &e);
            (DEFAULT_TOKEN_DECIMALS, false)
        }
    };
    let total_supply_raw = supply.unwrap_or_else(|e| {
        degraded("totalSupply", &e);
        U256::ZERO
    });

    TokenProbe {
        descriptor: TokenDescriptor {
            name,
            symbol,
            decimals,
            total_supply_raw,
            total_supply_scaled: scale_supply(total_supply_raw, decimals),
            decimals_known,
        },
        complete,
    }
}

async fn read_field<T>(
    client: &dyn ChainClient,
    timeout: Duration,
    to: Address,
    calldata: Vec<u8>,
    decode: fn(&[u8]) -> AppResult<T>,
) -> AppResult<T> {
    let raw = with_timeout(timeout, "eth_call", client.call(to, Bytes::from(calldata))).await?;
    decode(&raw)
}

/// Code through the bytecode cache. Empty code is `NotAContract` and is
/// never stored.
async fn load_code(
    cache: ResultCache<Bytes>,
    client: Arc<dyn ChainClient>,
    address: Address,
    timeout: Duration,
) -> AppResult<Bytes> {
    let key = CacheKey::new(CACHE_KIND_BYTECODE, client.chain(), address.to_string());
    cache
        .get_or_compute(&key, move || async move {
            let code = with_timeout(timeout, "eth_getCode", client.get_code(address)).await?;
            if code.is_empty() {
                return Err(AppError::not_a_contract(address));
            }
            Ok(code)
        })
        .await
}

async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| AppError::timeout(format!("{} exceeded {}ms", what, limit.as_millis())))?
}

fn abi_error(field: &str, e: alloy_sol_types::Error) -> AppError {
    AppError::invalid_response(format!("Cannot decode {}: {}", field, e))
}

/// ABI string, or a NUL-padded `bytes32` for legacy tokens
fn text_or_bytes32(abi: Option<String>, data: &[u8], field: &str) -> AppResult<String> {
    let text = match abi {
        Some(s) => s,
        None if data.len() == 32 => {
            let end = data.iter().position(|b| *b == 0).unwrap_or(32);
            String::from_utf8_lossy(&data[..end]).into_owned()
        }
        None => {
            return Err(AppError::invalid_response(format!(
                "Cannot decode {} ({} bytes)",
                field,
                data.len()
            )))
        }
    };

    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string();
    if text.is_empty() {
        return Err(AppError::invalid_response(format!("Empty {}", field)));
    }
    Ok(text)
}

fn decode_name(data: &[u8]) -> AppResult<String> {
    let abi = nameCall::abi_decode_returns(data, true).ok().map(|r| r._0);
    text_or_bytes32(abi, data, "name")
}

fn decode_symbol(data: &[u8]) -> AppResult<String> {
    let abi = symbolCall::abi_decode_returns(data, true).ok().map(|r| r._0);
    text_or_bytes32(abi, data, "symbol")
}

fn decode_decimals(data: &[u8]) -> AppResult<u8> {
    decimalsCall::abi_decode_returns(data, true)
        .map(|r| r._0)
        .map_err(|e| abi_error("decimals", e))
}

fn decode_total_supply(data: &[u8]) -> AppResult<U256> {
    totalSupplyCall::abi_decode_returns(data, true)
        .map(|r| r._0)
        .map_err(|e| abi_error("totalSupply", e))
}

fn decode_owner(data: &[u8]) -> AppResult<Address> {
    ownerCall::abi_decode_returns(data, true)
        .map(|r| r._0)
        .map_err(|e| abi_error("owner", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;

    #[test]
    fn test_decode_abi_string() {
        let encoded = ("Tether USD".to_string(),).abi_encode_params();
        assert_eq!(decode_name(&encoded).unwrap(), "Tether USD");
    }

    #[test]
    fn test_decode_bytes32_fallback() {
        let mut word = [0u8; 32];
        word[..3].copy_from_slice(b"MKR");
        assert_eq!(decode_symbol(&word).unwrap(), "MKR");
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert_eq!(decode_name(&[1, 2, 3]).unwrap_err().code, ErrorCode::RpcInvalidResponse);
        assert!(decode_decimals(&[]).is_err());
    }

    #[test]
    fn test_decode_numbers_and_owner() {
        assert_eq!(decode_decimals(&U256::from(6u64).abi_encode()).unwrap(), 6);
        assert_eq!(
            decode_total_supply(&U256::from(1_000u64).abi_encode()).unwrap(),
            U256::from(1_000u64)
        );
        let owner = Address::repeat_byte(0x11);
        assert_eq!(decode_owner(&owner.abi_encode()).unwrap(), owner);
    }
}
