//! Token Guard Library
//!
//! Multi-chain EVM token security analyzer. For a token address on a
//! configured chain it reads on-chain state and verified source, detects
//! owner capabilities (mint, blacklist, freeze, pause, fees) and honeypot
//! signals, and composes a scored `SecurityReport`.
//!
//! Results are cached per `(kind, chain, address)` and concurrent requests
//! for the same token share one in-flight computation.

pub mod api;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{EvidenceExtractor, RiskScore, RiskScorer, SecurityAnalyzer};
pub use models::{
    AppError, AppResult, CapabilityKind, ChainEndpoint, ChainId, ContractProbe, ErrorCode,
    Evidence, GuardConfig, OwnerSource, OwnershipInfo, RiskLevel, SecurityReport, SourceRecord,
    TokenDescriptor,
};
pub use providers::{ChainClient, ChainRegistry, ExplorerClient, SourceLookup};
pub use utils::{AnalysisStats, CacheStats, ResultCache, StatsSnapshot};
