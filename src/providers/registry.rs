//! Chain Registry - one lazily built client per configured chain
//!
//! Clients are built on first use, at most once per chain even under
//! concurrent callers. A failed build is not remembered: the next caller
//! tries again.

use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::models::config::{ChainEndpoint, ChainId, GuardConfig};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::providers::rpc::{ChainClient, RpcProvider};

/// Builds a client for an endpoint
pub trait ClientConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        endpoint: &'a ChainEndpoint,
    ) -> BoxFuture<'a, AppResult<Arc<dyn ChainClient>>>;
}

/// Production connector: HTTP JSON-RPC with an `eth_chainId` handshake
pub struct RpcConnector {
    timeout: Duration,
    max_retries: u32,
}

impl RpcConnector {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self {
            timeout,
            max_retries,
        }
    }
}

impl ClientConnector for RpcConnector {
    fn connect<'a>(
        &'a self,
        endpoint: &'a ChainEndpoint,
    ) -> BoxFuture<'a, AppResult<Arc<dyn ChainClient>>> {
        async move {
            reqwest::Url::parse(&endpoint.rpc_url).map_err(|e| {
                AppError::provider_init(format!("Invalid RPC URL for {}: {}", endpoint.chain, e))
            })?;

            let provider = RpcProvider::new(endpoint, self.timeout, self.max_retries)?;
            let remote_id = provider.chain_id().await.map_err(|e| {
                AppError::provider_init(format!(
                    "eth_chainId handshake failed for {}: {}",
                    endpoint.chain, e.message
                ))
            })?;

            if endpoint.chain.evm_id() != Some(remote_id) {
                return Err(AppError::provider_init(format!(
                    "{} endpoint reports chain id {}",
                    endpoint.chain, remote_id
                )));
            }

            info!(
                chain = %endpoint.chain,
                url = %provider.masked_url(),
                "✅ Initialized RPC client"
            );
            Ok(Arc::new(provider) as Arc<dyn ChainClient>)
        }
        .boxed()
    }
}

/// Connector for registries whose clients are all supplied up front
pub struct DetachedConnector;

impl ClientConnector for DetachedConnector {
    fn connect<'a>(
        &'a self,
        endpoint: &'a ChainEndpoint,
    ) -> BoxFuture<'a, AppResult<Arc<dyn ChainClient>>> {
        async move {
            Err(AppError::provider_init(format!(
                "No connector for {}: clients are supplied in-process",
                endpoint.chain
            )))
        }
        .boxed()
    }
}

/// Per-chain client registry
pub struct ChainRegistry {
    endpoints: HashMap<ChainId, ChainEndpoint>,
    clients: DashMap<ChainId, Arc<OnceCell<Arc<dyn ChainClient>>>>,
    connector: Arc<dyn ClientConnector>,
}

impl ChainRegistry {
    /// Registry over the configured endpoints, using HTTP JSON-RPC clients
    pub fn new(config: &GuardConfig) -> Self {
        let connector = RpcConnector::new(config.rpc_timeout, config.rpc_max_retries);
        Self::with_connector(config.endpoints.clone(), Arc::new(connector))
    }

    pub fn with_connector(
        endpoints: HashMap<ChainId, ChainEndpoint>,
        connector: Arc<dyn ClientConnector>,
    ) -> Self {
        for (chain, endpoint) in &endpoints {
            info!(chain = %chain, url = %endpoint.masked_rpc_url(), "Chain registered");
        }
        Self {
            endpoints,
            clients: DashMap::new(),
            connector,
        }
    }

    /// Registry over already-built clients (embedding, tests)
    pub fn with_clients(clients: Vec<Arc<dyn ChainClient>>) -> Self {
        let registry = Self::with_connector(
            clients
                .iter()
                .map(|c| (c.chain(), ChainEndpoint::evm(c.chain(), "in-process")))
                .collect(),
            Arc::new(DetachedConnector),
        );
        for client in clients {
            registry
                .clients
                .insert(client.chain(), Arc::new(OnceCell::new_with(Some(client))));
        }
        registry
    }

    /// True when the chain has an endpoint and speaks EVM JSON-RPC
    pub fn supports(&self, chain: ChainId) -> bool {
        self.usable_endpoint(chain).is_some()
    }

    pub fn supported_chains(&self) -> Vec<ChainId> {
        let mut chains: Vec<ChainId> = self
            .endpoints
            .keys()
            .copied()
            .filter(|c| self.supports(*c))
            .collect();
        chains.sort();
        chains
    }

    fn usable_endpoint(&self, chain: ChainId) -> Option<&ChainEndpoint> {
        self.endpoints
            .get(&chain)
            .filter(|e| e.evm_compatible && chain.is_evm())
    }

    /// Client for a chain, built on first use
    pub async fn client_for(&self, chain: ChainId) -> AppResult<Arc<dyn ChainClient>> {
        let endpoint = self
            .usable_endpoint(chain)
            .ok_or_else(|| AppError::unsupported_chain(chain))?;

        let cell = self
            .clients
            .entry(chain)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let client = cell
            .get_or_try_init(|| async {
                self.connector.connect(endpoint).await.map_err(|e| {
                    warn!(chain = %chain, error = %e, "⚠️ Chain client construction failed");
                    match e.code {
                        ErrorCode::ProviderInit | ErrorCode::UnsupportedChain => e,
                        _ => AppError::provider_init(e.message),
                    }
                })
            })
            .await?;

        Ok(Arc::clone(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullClient(ChainId);

    impl ChainClient for NullClient {
        fn chain(&self) -> ChainId {
            self.0
        }
        fn get_code(&self, _address: Address) -> BoxFuture<'_, AppResult<Bytes>> {
            async { Ok(Bytes::new()) }.boxed()
        }
        fn call(&self, _to: Address, _data: Bytes) -> BoxFuture<'_, AppResult<Bytes>> {
            async { Ok(Bytes::new()) }.boxed()
        }
    }

    /// Fails the first `failures` attempts, then succeeds
    struct FlakyConnector {
        attempts: AtomicUsize,
        failures: usize,
    }

    impl ClientConnector for FlakyConnector {
        fn connect<'a>(
            &'a self,
            endpoint: &'a ChainEndpoint,
        ) -> BoxFuture<'a, AppResult<Arc<dyn ChainClient>>> {
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let n = self.attempts.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    Err(AppError::rpc("connection refused"))
                } else {
                    Ok(Arc::new(NullClient(endpoint.chain)) as Arc<dyn ChainClient>)
                }
            }
            .boxed()
        }
    }

    fn registry(failures: usize) -> (ChainRegistry, Arc<FlakyConnector>) {
        let connector = Arc::new(FlakyConnector {
            attempts: AtomicUsize::new(0),
            failures,
        });
        let mut endpoints = HashMap::new();
        endpoints.insert(
            ChainId::Ethereum,
            ChainEndpoint::evm(ChainId::Ethereum, "http://localhost:8545"),
        );
        let mut tron = ChainEndpoint::evm(ChainId::Tron, "http://localhost:9090");
        tron.evm_compatible = false;
        endpoints.insert(ChainId::Tron, tron);
        (
            ChainRegistry::with_connector(endpoints, connector.clone()),
            connector,
        )
    }

    #[tokio::test]
    async fn test_unsupported_chains_fail_without_connecting() {
        let (registry, connector) = registry(0);
        for chain in [ChainId::Tron, ChainId::Sui, ChainId::Bsc] {
            let err = registry.client_for(chain).await.err().unwrap();
            assert_eq!(err.code, ErrorCode::UnsupportedChain);
            assert!(!registry.supports(chain));
        }
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(registry.supported_chains(), vec![ChainId::Ethereum]);
    }

    #[tokio::test]
    async fn test_construction_is_single_flight() {
        let (registry, connector) = registry(0);
        let (a, b, c) = tokio::join!(
            registry.client_for(ChainId::Ethereum),
            registry.client_for(ChainId::Ethereum),
            registry.client_for(ChainId::Ethereum),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_construction_is_retried() {
        let (registry, connector) = registry(1);
        let err = registry.client_for(ChainId::Ethereum).await.err().unwrap();
        assert_eq!(err.code, ErrorCode::ProviderInit);

        let client = registry.client_for(ChainId::Ethereum).await.unwrap();
        assert_eq!(client.chain(), ChainId::Ethereum);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_prebuilt_clients() {
        let registry = ChainRegistry::with_clients(vec![Arc::new(NullClient(ChainId::Base))]);
        assert!(registry.supports(ChainId::Base));
        assert_eq!(registry.client_for(ChainId::Base).await.unwrap().chain(), ChainId::Base);
    }

    #[tokio::test]
    async fn test_detached_connector_refuses_to_connect() {
        let endpoint = ChainEndpoint::evm(ChainId::Base, "in-process");
        let err = DetachedConnector.connect(&endpoint).await.err().unwrap();
        assert_eq!(err.code, ErrorCode::ProviderInit);
    }
}
