//! Security Analyzer
//! Orchestrates one token analysis: introspection, evidence, scoring, report.
//!
//! Pipeline per `(address, chain)`:
//! 1. parse address, check the chain is registered and EVM
//! 2. contract probe (an address without code stops here, nothing cached)
//! 3. concurrently: token probe, verified source, ownership
//! 4. evidence = bytecode evidence merged with source evidence, in that order
//! 5. score, compose, cache under `securityReport`
//!
//! Concurrent requests for the same key share one pipeline run.

use alloy_primitives::Address;
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::evidence::EvidenceExtractor;
use crate::core::introspector::ContractIntrospector;
use crate::core::risk_score::RiskScorer;
use crate::models::config::{ChainId, GuardConfig};
use crate::models::errors::{AppError, AppResult};
use crate::models::types::{CapabilityKind, SecurityReport, SourceRecord};
use crate::providers::explorer::{ExplorerClient, SourceLookup};
use crate::providers::registry::ChainRegistry;
use crate::utils::cache::{CacheKey, CacheStats, ResultCache};
use crate::utils::stats::{AnalysisStats, StatsSnapshot};

pub const CACHE_KIND_REPORT: &str = "securityReport";
pub const CACHE_KIND_SOURCE: &str = "sourceCode";

/// Main analyzer. Cheap to clone; clones share caches and statistics.
#[derive(Clone)]
pub struct SecurityAnalyzer {
    inner: Arc<AnalyzerInner>,
}

struct AnalyzerInner {
    introspector: ContractIntrospector,
    sources: Arc<dyn SourceLookup>,
    source_cache: ResultCache<SourceRecord>,
    report_cache: ResultCache<SecurityReport>,
    extractor: EvidenceExtractor,
    scorer: RiskScorer,
    analysis_timeout: Duration,
    source_timeout: Duration,
    stats: Arc<AnalysisStats>,
}

impl SecurityAnalyzer {
    /// Analyzer over HTTP JSON-RPC clients and the Etherscan-family explorers
    pub fn new(config: &GuardConfig) -> AppResult<Self> {
        let registry = Arc::new(ChainRegistry::new(config));
        let explorer = Arc::new(ExplorerClient::new(config)?);
        Ok(Self::with_parts(config, registry, explorer, EvidenceExtractor::default()))
    }

    /// Analyzer over caller-supplied chain access and source lookup
    pub fn with_parts(
        config: &GuardConfig,
        registry: Arc<ChainRegistry>,
        sources: Arc<dyn SourceLookup>,
        extractor: EvidenceExtractor,
    ) -> Self {
        let stats = Arc::new(AnalysisStats::new());
        let introspector =
            ContractIntrospector::new(registry, Arc::clone(&sources), config, Arc::clone(&stats));
        Self {
            inner: Arc::new(AnalyzerInner {
                introspector,
                sources,
                source_cache: ResultCache::new(CACHE_KIND_SOURCE, config.cache_ttl),
                report_cache: ResultCache::new(CACHE_KIND_REPORT, config.report_ttl),
                extractor,
                scorer: RiskScorer::default(),
                analysis_timeout: config.analysis_timeout,
                source_timeout: config.rpc_timeout * (config.rpc_max_retries + 1),
                stats,
            }),
        }
    }

    /// Analyze a token, bounded by the configured analysis deadline
    pub async fn analyze_token(&self, address: &str, chain: ChainId) -> AppResult<SecurityReport> {
        self.analyze_token_with_cancel(address, chain, CancellationToken::new())
            .await
    }

    /// Analyze a token; cancelling `cancel` aborts with `Timeout`
    pub async fn analyze_token_with_cancel(
        &self,
        address: &str,
        chain: ChainId,
        cancel: CancellationToken,
    ) -> AppResult<SecurityReport> {
        let inner = &self.inner;
        inner.stats.record_request();

        let result = self.run(address, chain, cancel).await;
        if let Err(e) = &result {
            inner.stats.record_failure(e.code);
            if e.code.is_terminal() {
                info!(chain = %chain, address, code = e.code_str(), "Analysis rejected: {}", e.message);
            } else {
                warn!(chain = %chain, address, code = e.code_str(), "❌ Analysis failed: {}", e.message);
            }
        }
        result
    }

    async fn run(
        &self,
        address: &str,
        chain: ChainId,
        cancel: CancellationToken,
    ) -> AppResult<SecurityReport> {
        let address = parse_address(address)?;
        if !self.inner.introspector.registry().supports(chain) {
            return Err(AppError::unsupported_chain(chain));
        }

        let key = CacheKey::new(CACHE_KIND_REPORT, chain, address.to_string());
        let inner = Arc::clone(&self.inner);
        let pipeline = self
            .inner
            .report_cache
            .get_or_compute(&key, move || async move { inner.compose(address, chain).await });

        let deadline = self.inner.analysis_timeout;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::timeout("Analysis cancelled")),
            outcome = tokio::time::timeout(deadline, pipeline) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AppError::timeout(format!(
                    "Analysis exceeded {}ms",
                    deadline.as_millis()
                ))),
            },
        };
        result.map_err(AppError::into_boundary)
    }

    /// Drop expired entries from every cache
    pub fn cleanup_expired(&self) -> usize {
        let inner = &self.inner;
        inner.report_cache.cleanup_expired()
            + inner.source_cache.cleanup_expired()
            + inner.introspector.cleanup_expired()
    }

    /// Periodic cache sweep. Abort the handle on shutdown.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let analyzer = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let removed = analyzer.cleanup_expired();
                if removed > 0 {
                    debug!(removed, "Cache sweep finished");
                }
            }
        })
    }

    pub fn supported_chains(&self) -> Vec<ChainId> {
        self.inner.introspector.registry().supported_chains()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        let mut all = vec![self.inner.report_cache.stats(), self.inner.source_cache.stats()];
        all.extend(self.inner.introspector.cache_stats());
        all
    }
}

impl AnalyzerInner {
    async fn compose(&self, address: Address, chain: ChainId) -> AppResult<SecurityReport> {
        let started = Instant::now();
        info!("🔍 Analyzing {} on {}", address, chain.name());

        let probe = self.introspector.probe_contract(address, chain).await?;
        if !probe.is_contract {
            return Err(AppError::not_a_contract(address));
        }

        let (token, source, ownership) = tokio::join!(
            self.introspector.probe_token(address, chain),
            self.lookup_source(address, chain),
            self.introspector.check_ownership(address, chain),
        );

        let mut evidence = self.extractor.extract(&probe.bytecode, source.as_ref());
        evidence.ownership = ownership;

        let risk = self.scorer.score(&evidence);
        let (contract_name, is_proxy) = source
            .map(|s| (s.contract_name, s.is_proxy))
            .unwrap_or((None, false));

        let report = SecurityReport {
            address,
            chain,
            token,
            is_honeypot: evidence.has(CapabilityKind::HoneypotSignal),
            evidence,
            risk_score: risk.total,
            risk_level: risk.level,
            score_breakdown: risk.breakdown,
            contract_name,
            is_proxy,
            analyzed_at: Utc::now(),
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        self.stats.record_report(&report, latency_ms);
        info!(
            chain = %chain,
            address = %address,
            score = report.risk_score,
            level = report.risk_level.as_str(),
            latency_ms,
            "{} Analysis complete",
            report.risk_level.emoji()
        );
        Ok(report)
    }

    /// Verified source, or `None` when the lookup fails
    async fn lookup_source(&self, address: Address, chain: ChainId) -> Option<SourceRecord> {
        let key = CacheKey::new(CACHE_KIND_SOURCE, chain, address.to_string());
        let sources = Arc::clone(&self.sources);
        let limit = self.source_timeout;

        let result = self
            .source_cache
            .get_or_compute(&key, move || async move {
                tokio::time::timeout(limit, sources.fetch_source(chain, address))
                    .await
                    .map_err(|_| AppError::timeout("Source lookup timed out"))?
            })
            .await;

        match result {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(chain = %chain, address = %address, field = "source", error = %e, "Source lookup failed, bytecode-only analysis");
                self.stats.record_degraded_read();
                None
            }
        }
    }
}

/// Parse a hex address; checksum casing is not enforced
pub fn parse_address(raw: &str) -> AppResult<Address> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_address("Address is empty"));
    }
    Address::from_str(trimmed)
        .map_err(|e| AppError::invalid_address(format!("Invalid address {:?}: {}", trimmed, e)))
}
