//! Block Explorer Client - verified source and ownership lookups
//!
//! Etherscan-family API:
//! - `module=contract&action=getsourcecode` for verified source
//! - `module=logs&action=getLogs` for the latest `OwnershipTransferred`
//! - `module=contract&action=getcontractcreation` for the deployer
//!
//! One API per chain (etherscan, bscscan, polygonscan, ...), all sharing the
//! same response shape:
//!
//! ```json
//! { "status": "1", "message": "OK",
//!   "result": [{ "SourceCode": "...", "ContractName": "...",
//!                "Proxy": "0", "Implementation": "" }] }
//! ```
//!
//! Standard-JSON submissions arrive double-braced (`{{ ... }}`) and are
//! flattened into one text, files in path order. A proxy whose
//! implementation is verified gets the implementation source appended.

use alloy_primitives::{Address, B256};
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::config::{ChainId, GuardConfig};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::SourceRecord;
use crate::utils::constants::{TOPIC_OWNERSHIP_TRANSFERRED, USER_AGENT as USER_AGENT_CONST};

/// Explorer-side lookups
pub trait SourceLookup: Send + Sync {
    /// Source record for a contract. Unverified contracts are `Ok` with
    /// `is_verified == false`; `Err` means the lookup itself failed.
    fn fetch_source(&self, chain: ChainId, address: Address) -> BoxFuture<'_, AppResult<SourceRecord>>;

    /// New owner named by the most recent `OwnershipTransferred` event
    fn latest_owner_transfer(
        &self,
        _chain: ChainId,
        _address: Address,
    ) -> BoxFuture<'_, AppResult<Option<Address>>> {
        async { Ok(None) }.boxed()
    }

    /// Account that deployed the contract
    fn contract_creator(
        &self,
        _chain: ChainId,
        _address: Address,
    ) -> BoxFuture<'_, AppResult<Option<Address>>> {
        async { Ok(None) }.boxed()
    }
}

/// Explorer API response
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    /// Array of entries on success, a plain string on error
    result: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceEntry {
    #[serde(default)]
    source_code: String,
    #[serde(default)]
    contract_name: String,
    #[serde(default)]
    proxy: String,
    #[serde(default)]
    implementation: String,
}

#[derive(Debug, Deserialize)]
struct LogEntry {
    #[serde(default)]
    topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreationEntry {
    contract_creator: String,
}

#[derive(Debug, Clone)]
struct ExplorerEndpoint {
    api_url: String,
    api_key: String,
}

/// Etherscan-family API client
pub struct ExplorerClient {
    client: reqwest::Client,
    endpoints: HashMap<ChainId, ExplorerEndpoint>,
}

impl ExplorerClient {
    /// Client for every configured chain that has an explorer URL and key
    pub fn new(config: &GuardConfig) -> AppResult<Self> {
        let mut explorer = Self::empty(config.rpc_timeout)?;
        for endpoint in config.endpoints.values() {
            if let (Some(url), Some(key)) = (&endpoint.explorer_api_url, &endpoint.explorer_api_key) {
                explorer = explorer.with_endpoint(endpoint.chain, url.clone(), key.clone());
            }
        }
        Ok(explorer)
    }

    /// Client with no chains configured
    pub fn empty(timeout: Duration) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_CONST));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| AppError::with_source(ErrorCode::ProviderInit, "Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            endpoints: HashMap::new(),
        })
    }

    pub fn with_endpoint(
        mut self,
        chain: ChainId,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.endpoints.insert(
            chain,
            ExplorerEndpoint {
                api_url: api_url.into(),
                api_key: api_key.into(),
            },
        );
        self
    }

    /// Verified source for `address`, following one proxy hop
    pub async fn get_source(&self, chain: ChainId, address: Address) -> AppResult<SourceRecord> {
        let Some(endpoint) = self.endpoints.get(&chain) else {
            debug!(chain = %chain, "No explorer configured, treating source as unverified");
            return Ok(SourceRecord::default());
        };

        info!("🔍 Explorer: fetching source for {} on {}", address, chain);
        let entry = self.fetch_entry(endpoint, address).await?;
        let mut record = to_record(&entry);

        if let Some(implementation) = record.implementation {
            if implementation != address {
                match self.fetch_entry(endpoint, implementation).await {
                    Ok(impl_entry) if !impl_entry.source_code.trim().is_empty() => {
                        debug!(proxy = %address, implementation = %implementation, "Appending implementation source");
                        let impl_text = flatten_source(&impl_entry.source_code);
                        if record.source_text.is_empty() {
                            record.source_text = impl_text;
                        } else {
                            record.source_text.push('\n');
                            record.source_text.push_str(&impl_text);
                        }
                        record.is_verified = true;
                    }
                    Ok(_) => debug!(implementation = %implementation, "Implementation source not verified"),
                    Err(e) => debug!(implementation = %implementation, error = %e, "Implementation lookup failed"),
                }
            }
        }

        Ok(record)
    }

    /// New owner from the latest `OwnershipTransferred` log, if any
    pub async fn get_latest_owner_transfer(
        &self,
        chain: ChainId,
        address: Address,
    ) -> AppResult<Option<Address>> {
        let Some(endpoint) = self.endpoints.get(&chain) else {
            return Ok(None);
        };

        let address_str = address.to_string();
        let result = self
            .fetch(
                endpoint,
                &[
                    ("module", "logs"),
                    ("action", "getLogs"),
                    ("fromBlock", "0"),
                    ("toBlock", "latest"),
                    ("address", address_str.as_str()),
                    ("topic0", TOPIC_OWNERSHIP_TRANSFERRED),
                ],
            )
            .await?;

        let logs: Vec<LogEntry> = serde_json::from_value(result)?;
        let owner = logs
            .last()
            .and_then(|log| log.topics.get(2))
            .and_then(|topic| B256::from_str(topic).ok())
            .map(Address::from_word);
        debug!(chain = %chain, address = %address, events = logs.len(), owner = ?owner, "Ownership events scanned");
        Ok(owner)
    }

    /// Deployer of `address`, if the explorer knows it
    pub async fn get_contract_creator(
        &self,
        chain: ChainId,
        address: Address,
    ) -> AppResult<Option<Address>> {
        let Some(endpoint) = self.endpoints.get(&chain) else {
            return Ok(None);
        };

        let address_str = address.to_string();
        let result = self
            .fetch(
                endpoint,
                &[
                    ("module", "contract"),
                    ("action", "getcontractcreation"),
                    ("contractaddresses", address_str.as_str()),
                ],
            )
            .await?;

        let entries: Vec<CreationEntry> = serde_json::from_value(result)?;
        Ok(entries
            .first()
            .and_then(|e| Address::from_str(e.contract_creator.trim()).ok()))
    }

    async fn fetch_entry(&self, endpoint: &ExplorerEndpoint, address: Address) -> AppResult<SourceEntry> {
        let address_str = address.to_string();
        let result = self
            .fetch(
                endpoint,
                &[
                    ("module", "contract"),
                    ("action", "getsourcecode"),
                    ("address", address_str.as_str()),
                ],
            )
            .await?;

        let mut entries: Vec<SourceEntry> = serde_json::from_value(result)?;
        Ok(if entries.is_empty() {
            SourceEntry::default()
        } else {
            entries.swap_remove(0)
        })
    }

    /// One API call; returns the `result` payload. "No records found" is an
    /// empty list, not an error.
    async fn fetch(
        &self,
        endpoint: &ExplorerEndpoint,
        params: &[(&str, &str)],
    ) -> AppResult<serde_json::Value> {
        let response = self
            .client
            .get(&endpoint.api_url)
            .query(params)
            .query(&[("apikey", endpoint.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AppError::rate_limited("Explorer rate limited (HTTP 429)"));
        }
        if !status.is_success() {
            return Err(AppError::explorer(format!("Explorer API error: {}", status)));
        }

        let data: ExplorerResponse = response.json().await?;
        if data.status != "1" {
            if data.message.to_lowercase().starts_with("no records found") {
                return Ok(serde_json::Value::Array(Vec::new()));
            }
            let detail = data.result.as_str().unwrap_or_default().to_string();
            if detail.to_lowercase().contains("rate limit") {
                return Err(AppError::rate_limited(detail));
            }
            return Err(AppError::explorer(format!("{}: {}", data.message, detail)));
        }
        Ok(data.result)
    }
}

impl SourceLookup for ExplorerClient {
    fn fetch_source(&self, chain: ChainId, address: Address) -> BoxFuture<'_, AppResult<SourceRecord>> {
        self.get_source(chain, address).boxed()
    }

    fn latest_owner_transfer(
        &self,
        chain: ChainId,
        address: Address,
    ) -> BoxFuture<'_, AppResult<Option<Address>>> {
        self.get_latest_owner_transfer(chain, address).boxed()
    }

    fn contract_creator(
        &self,
        chain: ChainId,
        address: Address,
    ) -> BoxFuture<'_, AppResult<Option<Address>>> {
        self.get_contract_creator(chain, address).boxed()
    }
}

fn to_record(entry: &SourceEntry) -> SourceRecord {
    let verified = !entry.source_code.trim().is_empty();
    SourceRecord {
        source_text: if verified {
            flatten_source(&entry.source_code)
        } else {
            String::new()
        },
        is_verified: verified,
        contract_name: Some(entry.contract_name.trim())
            .filter(|n| !n.is_empty())
            .map(String::from),
        is_proxy: entry.proxy == "1",
        implementation: if entry.proxy == "1" {
            Address::from_str(entry.implementation.trim()).ok()
        } else {
            None
        },
    }
}

/// Flatten a Standard-JSON source submission into one text.
///
/// Plain single-file sources are returned unchanged.
pub fn flatten_source(raw: &str) -> String {
    let trimmed = raw.trim();
    let json_text = if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
        &trimmed[1..trimmed.len() - 1]
    } else if trimmed.starts_with('{') {
        trimmed
    } else {
        return raw.to_string();
    };

    let Ok(value) = serde_json::from_str::<serde_json::Value>(json_text) else {
        return raw.to_string();
    };
    let sources = value.get("sources").unwrap_or(&value);
    let Some(files) = sources.as_object() else {
        return raw.to_string();
    };

    let ordered: BTreeMap<&str, &str> = files
        .iter()
        .filter_map(|(path, file)| {
            file.get("content")
                .and_then(|c| c.as_str())
                .map(|content| (path.as_str(), content))
        })
        .collect();

    if ordered.is_empty() {
        return raw.to_string();
    }
    ordered.into_values().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_standard_json_in_path_order() {
        let raw = r#"{{"language":"Solidity","sources":{"contracts/b.sol":{"content":"contract B {}"},"contracts/a.sol":{"content":"contract A {}"}}}}"#;
        assert_eq!(flatten_source(raw), "contract A {}\ncontract B {}");
    }

    #[test]
    fn test_flatten_plain_source_unchanged() {
        let raw = "pragma solidity ^0.8.0;\ncontract T {}";
        assert_eq!(flatten_source(raw), raw);
    }

    #[test]
    fn test_flatten_single_brace_sources_map() {
        let raw = r#"{"Token.sol":{"content":"contract Token {}"}}"#;
        assert_eq!(flatten_source(raw), "contract Token {}");
    }

    #[test]
    fn test_unverified_entry() {
        let record = to_record(&SourceEntry::default());
        assert!(!record.is_verified);
        assert!(record.source_text.is_empty());
        assert_eq!(record.contract_name, None);
    }

    #[test]
    fn test_proxy_entry() {
        let entry = SourceEntry {
            source_code: "contract Proxy {}".to_string(),
            contract_name: "Proxy".to_string(),
            proxy: "1".to_string(),
            implementation: "0x1111111111111111111111111111111111111111".to_string(),
        };
        let record = to_record(&entry);
        assert!(record.is_proxy);
        assert!(record.implementation.is_some());
        assert_eq!(record.contract_name.as_deref(), Some("Proxy"));
    }

    #[tokio::test]
    async fn test_chain_without_explorer_is_unverified() {
        let client = ExplorerClient::empty(Duration::from_secs(1)).unwrap();
        let record = client
            .get_source(ChainId::Polygon, Address::ZERO)
            .await
            .unwrap();
        assert!(!record.is_verified);
    }
}
