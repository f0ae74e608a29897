//! Type definitions for Token Guard
//! Core data structures produced by introspection, extraction and scoring

use alloy_primitives::{Address, Bytes, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::config::ChainId;
use crate::utils::constants::{
    is_renounced_owner, DEFAULT_TOKEN_DECIMALS, UNKNOWN_TOKEN_NAME, UNKNOWN_TOKEN_SYMBOL,
};

/// Risk level classification, totally ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// No risky capability detected
    Safe,
    /// Low risk - minor concerns
    Low,
    /// Medium risk - proceed with caution
    Medium,
    /// High risk - owner holds powerful levers
    High,
    /// Critical - honeypot signal or stacked admin powers
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "✅",
            RiskLevel::Low => "🟡",
            RiskLevel::Medium => "🟠",
            RiskLevel::High => "🔴",
            RiskLevel::Critical => "💀",
        }
    }
}

/// Administrative capability detected in a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Mint,
    Blacklist,
    Pause,
    Freeze,
    TaxFee,
    HoneypotSignal,
    /// Contract can destroy itself (source rules only)
    SelfDestruct,
    /// Owner can move or seize holder balances (source rules only)
    BalanceControl,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mint => "mint",
            Self::Blacklist => "blacklist",
            Self::Pause => "pause",
            Self::Freeze => "freeze",
            Self::TaxFee => "tax_fee",
            Self::HoneypotSignal => "honeypot_signal",
            Self::SelfDestruct => "self_destruct",
            Self::BalanceControl => "balance_control",
        }
    }
}

/// How the owner address was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerSource {
    /// `owner()` on the contract
    OwnerCall,
    /// New owner of the latest `OwnershipTransferred` event
    OwnershipEvent,
    /// Deployer address; says nothing about renouncement
    ContractCreator,
}

/// Who controls the contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipInfo {
    pub owner_address: Option<Address>,
    pub renounced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<OwnerSource>,
}

impl OwnershipInfo {
    /// Ownership derived from a successful `owner()` read
    pub fn from_owner(owner: Address) -> Self {
        Self::resolved(owner, OwnerSource::OwnerCall)
    }

    /// Ownership found by `source`. A deployer is never treated as renounced.
    pub fn resolved(owner: Address, source: OwnerSource) -> Self {
        Self {
            owner_address: Some(owner),
            renounced: source != OwnerSource::ContractCreator && is_renounced_owner(&owner),
            resolved_by: Some(source),
        }
    }
}

/// Capabilities and findings gathered for one contract.
///
/// Capabilities only ever grow; `add_capability` appends the finding exactly
/// once per capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub capabilities: BTreeSet<CapabilityKind>,
    pub ownership: OwnershipInfo,
    pub findings: Vec<String>,
    pub source_verified: bool,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a capability; returns false if it was already present
    pub fn add_capability(&mut self, kind: CapabilityKind, finding: impl Into<String>) -> bool {
        if self.capabilities.insert(kind) {
            self.findings.push(finding.into());
            true
        } else {
            false
        }
    }

    /// Informational finding with no capability attached
    pub fn note(&mut self, finding: impl Into<String>) {
        let finding = finding.into();
        if !self.findings.contains(&finding) {
            self.findings.push(finding);
        }
    }

    pub fn has(&self, kind: CapabilityKind) -> bool {
        self.capabilities.contains(&kind)
    }

    /// Union of two evidence sets: findings of `self` first, then the new
    /// findings of `other`.
    ///
    /// Ownership is taken from `self` unless it is still the zero value.
    pub fn merge(mut self, other: Evidence) -> Evidence {
        self.capabilities.extend(other.capabilities.iter().copied());
        for finding in other.findings {
            if !self.findings.contains(&finding) {
                self.findings.push(finding);
            }
        }
        self.source_verified |= other.source_verified;
        if self.ownership == OwnershipInfo::default() {
            self.ownership = other.ownership;
        }
        self
    }
}

/// Code-level view of one address, fetched once per cache lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractProbe {
    pub address: Address,
    pub chain: ChainId,
    pub is_contract: bool,
    /// Deployed code; empty for an EOA or when the read failed
    pub bytecode: Bytes,
    pub fetched_at: DateTime<Utc>,
}

/// Basic ERC-20 style metadata, with documented sentinel defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub total_supply_raw: U256,
    /// `total_supply_raw / 10^decimals`. When decimals could not be read the
    /// default of 18 is used, which can misstate the supply.
    pub total_supply_scaled: f64,
    /// False when `decimals` is the sentinel rather than an on-chain value
    pub decimals_known: bool,
}

impl Default for TokenDescriptor {
    fn default() -> Self {
        Self {
            name: UNKNOWN_TOKEN_NAME.to_string(),
            symbol: UNKNOWN_TOKEN_SYMBOL.to_string(),
            decimals: DEFAULT_TOKEN_DECIMALS,
            total_supply_raw: U256::ZERO,
            total_supply_scaled: 0.0,
            decimals_known: false,
        }
    }
}

/// Scale a raw supply by `10^decimals`
pub fn scale_supply(raw: U256, decimals: u8) -> f64 {
    let raw_f = raw.to_string().parse::<f64>().unwrap_or(0.0);
    raw_f / 10f64.powi(decimals as i32)
}

/// Verified-source record from a block explorer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub source_text: String,
    pub is_verified: bool,
    pub contract_name: Option<String>,
    pub is_proxy: bool,
    /// Implementation behind a proxy, when the explorer reports one
    pub implementation: Option<Address>,
}

/// One line of the score breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub name: String,
    pub points: u32,
}

/// Externally visible analysis result.
///
/// Consumers render or serialize this value; they never build or edit it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub address: Address,
    pub chain: ChainId,
    pub token: TokenDescriptor,
    pub evidence: Evidence,
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub is_honeypot: bool,
    pub score_breakdown: Vec<ScoreFactor>,
    pub contract_name: Option<String>,
    pub is_proxy: bool,
    pub analyzed_at: DateTime<Utc>,
}

impl SecurityReport {
    /// Plain-text rendering for logs and the CLI
    pub fn summary(&self) -> String {
        let mut output = format!(
            "\n{} Risk: {} ({}/100) | {} ({}) on {}\n",
            self.risk_level.emoji(),
            self.risk_level.as_str(),
            self.risk_score,
            self.token.name,
            self.token.symbol,
            self.chain.name(),
        );
        output.push_str(&format!("   Address: {}\n", self.address));
        output.push_str(&format!(
            "   Supply: {:.4} (decimals {})\n",
            self.token.total_supply_scaled, self.token.decimals
        ));
        match self.evidence.ownership.owner_address {
            Some(owner) if self.evidence.ownership.renounced => {
                output.push_str(&format!("   Owner: {} (renounced)\n", owner))
            }
            Some(owner) => output.push_str(&format!("   Owner: {}\n", owner)),
            None => output.push_str("   Owner: N/A\n"),
        }
        output.push_str(&format!(
            "   Source verified: {}\n",
            if self.evidence.source_verified { "yes" } else { "no" }
        ));
        if self.is_honeypot {
            output.push_str("   🚨 Honeypot signal detected (heuristic)\n");
        }
        if !self.evidence.findings.is_empty() {
            output.push_str("   Findings:\n");
            for finding in &self.evidence.findings {
                output.push_str(&format!("     - {}\n", finding));
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::Safe < RiskLevel::Low);
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_add_capability_appends_one_finding() {
        let mut ev = Evidence::new();
        assert!(ev.add_capability(CapabilityKind::Mint, "mint"));
        assert!(!ev.add_capability(CapabilityKind::Mint, "mint again"));
        assert_eq!(ev.findings, vec!["mint".to_string()]);
    }

    #[test]
    fn test_merge_is_union_with_ordered_findings() {
        let mut a = Evidence::new();
        a.add_capability(CapabilityKind::Pause, "pause");
        let mut b = Evidence::new();
        b.add_capability(CapabilityKind::Mint, "mint");
        b.add_capability(CapabilityKind::Pause, "pause");
        b.source_verified = true;

        let merged = a.merge(b);
        assert!(merged.has(CapabilityKind::Pause));
        assert!(merged.has(CapabilityKind::Mint));
        assert_eq!(merged.findings, vec!["pause".to_string(), "mint".to_string()]);
        assert!(merged.source_verified);
    }

    #[test]
    fn test_ownership_from_owner() {
        let dead = Address::from_str("0x000000000000000000000000000000000000dEaD").unwrap();
        assert!(OwnershipInfo::from_owner(dead).renounced);
        let owner = Address::from_str("0x1111111111111111111111111111111111111111").unwrap();
        let info = OwnershipInfo::from_owner(owner);
        assert!(!info.renounced);
        assert_eq!(info.owner_address, Some(owner));
        assert_eq!(info.resolved_by, Some(OwnerSource::OwnerCall));
    }

    #[test]
    fn test_ownership_from_other_sources() {
        let event = OwnershipInfo::resolved(Address::ZERO, OwnerSource::OwnershipEvent);
        assert!(event.renounced);
        // A zero deployer cannot exist, but a creator never counts as renounced
        let creator = OwnershipInfo::resolved(Address::ZERO, OwnerSource::ContractCreator);
        assert!(!creator.renounced);
        assert_eq!(creator.resolved_by, Some(OwnerSource::ContractCreator));
    }

    #[test]
    fn test_scale_supply() {
        let raw = U256::from(1_500_000_000_000_000_000u128);
        assert!((scale_supply(raw, 18) - 1.5).abs() < 1e-9);
        assert!((scale_supply(U256::from(1234u64), 2) - 12.34).abs() < 1e-9);
        assert_eq!(scale_supply(U256::ZERO, 18), 0.0);
    }

    #[test]
    fn test_default_descriptor_sentinels() {
        let d = TokenDescriptor::default();
        assert_eq!(d.name, "Unknown Token");
        assert_eq!(d.symbol, "UNKNOWN");
        assert_eq!(d.decimals, 18);
        assert_eq!(d.total_supply_scaled, 0.0);
    }
}
