//! Core Module - Analysis Pipeline
//!
//! Introspection, evidence extraction, risk scoring and the analyzer that
//! composes them into a `SecurityReport`.

pub mod analyzer;
pub mod evidence;
pub mod introspector;
pub mod risk_score;

pub use analyzer::{parse_address, SecurityAnalyzer};
pub use evidence::{EvidenceExtractor, Rule, RuleSet, Trigger};
pub use introspector::ContractIntrospector;
pub use risk_score::{RiskScore, RiskScorer, ScoreWeights};
