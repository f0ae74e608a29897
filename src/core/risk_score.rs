//! Risk Scoring Module
//! Maps evidence to a 0-100 score and a risk tier.
//!
//! - HoneypotSignal: CRITICAL, score 100, nothing else counted
//! - otherwise additive points per capability, capped at 100
//!
//! Tiers: 0 SAFE, 1-19 LOW, 20-39 MEDIUM, 40-69 HIGH, 70+ CRITICAL

use serde::{Deserialize, Serialize};

use crate::models::types::{CapabilityKind, Evidence, RiskLevel, ScoreFactor};

pub const MAX_SCORE: u32 = 100;

/// Points per factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub mint: u32,
    pub blacklist: u32,
    pub freeze: u32,
    pub pause: u32,
    pub tax_fee: u32,
    pub self_destruct: u32,
    pub balance_control: u32,
    pub owner_not_renounced: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            mint: 30,
            blacklist: 25,
            freeze: 25,
            pause: 20,
            tax_fee: 15,
            self_destruct: 30,
            balance_control: 25,
            owner_not_renounced: 10,
        }
    }
}

/// Score with a per-factor breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub total: u32,
    pub level: RiskLevel,
    pub breakdown: Vec<ScoreFactor>,
}

impl RiskScore {
    pub fn recommendation(&self) -> &'static str {
        recommendation(self.level)
    }
}

/// Human-readable recommendation for a tier
pub fn recommendation(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Safe => "✅ No risky capability detected",
        RiskLevel::Low => "🟡 Minor concerns, proceed with normal caution",
        RiskLevel::Medium => "🟠 Owner holds some control, review before buying",
        RiskLevel::High => "🔴 Owner can materially affect holders, avoid unless trusted",
        RiskLevel::Critical => "💀 Very likely unsafe, do not buy",
    }
}

/// Tier for a numeric score
pub fn level_for(score: u32) -> RiskLevel {
    match score {
        0 => RiskLevel::Safe,
        1..=19 => RiskLevel::Low,
        20..=39 => RiskLevel::Medium,
        40..=69 => RiskLevel::High,
        _ => RiskLevel::Critical,
    }
}

/// Pure scorer over `Evidence`
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskScorer {
    weights: ScoreWeights,
}

impl RiskScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, evidence: &Evidence) -> RiskScore {
        if evidence.has(CapabilityKind::HoneypotSignal) {
            return RiskScore {
                total: MAX_SCORE,
                level: RiskLevel::Critical,
                breakdown: vec![ScoreFactor {
                    name: "honeypot_signal".to_string(),
                    points: MAX_SCORE,
                }],
            };
        }

        let renounced = evidence.ownership.renounced;
        let w = &self.weights;
        let table = [
            (CapabilityKind::Mint, w.mint),
            (CapabilityKind::Blacklist, w.blacklist),
            (CapabilityKind::Freeze, w.freeze),
            (CapabilityKind::Pause, w.pause),
            (CapabilityKind::TaxFee, w.tax_fee),
            (CapabilityKind::SelfDestruct, w.self_destruct),
            (CapabilityKind::BalanceControl, w.balance_control),
        ];

        let mut breakdown = Vec::new();
        for (kind, points) in table {
            // A mint function behind a renounced owner cannot be called.
            if kind == CapabilityKind::Mint && renounced {
                continue;
            }
            if evidence.has(kind) {
                breakdown.push(ScoreFactor {
                    name: kind.as_str().to_string(),
                    points,
                });
            }
        }
        if !renounced {
            breakdown.push(ScoreFactor {
                name: "owner_not_renounced".to_string(),
                points: w.owner_not_renounced,
            });
        }

        let total = breakdown
            .iter()
            .map(|f| f.points)
            .sum::<u32>()
            .min(MAX_SCORE);

        RiskScore {
            total,
            level: level_for(total),
            breakdown,
        }
    }
}

/// Score with the default weights
pub fn score(evidence: &Evidence) -> RiskScore {
    RiskScorer::default().score(evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::OwnershipInfo;
    use alloy_primitives::Address;

    fn evidence(kinds: &[CapabilityKind], renounced: bool) -> Evidence {
        let mut ev = Evidence::new();
        for kind in kinds {
            ev.add_capability(*kind, kind.as_str());
        }
        ev.ownership = OwnershipInfo {
            owner_address: Some(Address::ZERO),
            renounced,
            ..OwnershipInfo::default()
        };
        ev
    }

    #[test]
    fn test_tiers() {
        assert_eq!(level_for(0), RiskLevel::Safe);
        assert_eq!(level_for(10), RiskLevel::Low);
        assert_eq!(level_for(19), RiskLevel::Low);
        assert_eq!(level_for(20), RiskLevel::Medium);
        assert_eq!(level_for(39), RiskLevel::Medium);
        assert_eq!(level_for(40), RiskLevel::High);
        assert_eq!(level_for(69), RiskLevel::High);
        assert_eq!(level_for(70), RiskLevel::Critical);
        assert_eq!(level_for(100), RiskLevel::Critical);
    }

    #[test]
    fn test_mint_only_not_renounced_is_high() {
        let s = score(&evidence(&[CapabilityKind::Mint], false));
        assert_eq!(s.total, 40);
        assert_eq!(s.level, RiskLevel::High);
        assert_eq!(s.breakdown.len(), 2);
    }

    #[test]
    fn test_pause_and_fee_renounced_is_medium() {
        let s = score(&evidence(&[CapabilityKind::Pause, CapabilityKind::TaxFee], true));
        assert_eq!(s.total, 35);
        assert_eq!(s.level, RiskLevel::Medium);
    }

    #[test]
    fn test_renounced_mint_not_counted() {
        let s = score(&evidence(&[CapabilityKind::Mint], true));
        assert_eq!(s.total, 0);
        assert_eq!(s.level, RiskLevel::Safe);
    }

    #[test]
    fn test_unknown_owner_counts_as_not_renounced() {
        let s = score(&Evidence::new());
        assert_eq!(s.total, 10);
        assert_eq!(s.level, RiskLevel::Low);
    }

    #[test]
    fn test_honeypot_short_circuits() {
        let s = score(&evidence(&[CapabilityKind::HoneypotSignal], true));
        assert_eq!(s.total, 100);
        assert_eq!(s.level, RiskLevel::Critical);

        let s = score(&evidence(
            &[CapabilityKind::HoneypotSignal, CapabilityKind::Mint, CapabilityKind::Pause],
            false,
        ));
        assert_eq!(s.total, 100);
        assert_eq!(s.breakdown.len(), 1);
    }

    #[test]
    fn test_total_is_capped() {
        let s = score(&evidence(
            &[
                CapabilityKind::Mint,
                CapabilityKind::Blacklist,
                CapabilityKind::Freeze,
                CapabilityKind::Pause,
                CapabilityKind::TaxFee,
                CapabilityKind::SelfDestruct,
            ],
            false,
        ));
        assert_eq!(s.total, 100);
        assert_eq!(s.level, RiskLevel::Critical);
    }

    #[test]
    fn test_deterministic() {
        let ev = evidence(&[CapabilityKind::Blacklist, CapabilityKind::Freeze], false);
        assert_eq!(score(&ev), score(&ev));
    }
}
