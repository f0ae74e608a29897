//! Analysis statistics
//!
//! Process-wide counters for completed and failed analyses. Lock-free on the
//! hot path; only the per-code failure table uses a DashMap.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::errors::ErrorCode;
use crate::models::types::{RiskLevel, SecurityReport};

/// Collector shared by the analyzer and the API
pub struct AnalysisStats {
    total_requests: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    degraded_reads: AtomicU64,
    honeypots_detected: AtomicU64,
    critical: AtomicU64,
    high: AtomicU64,
    medium: AtomicU64,
    low: AtomicU64,
    safe: AtomicU64,
    total_latency_ms: AtomicU64,
    failures_by_code: DashMap<&'static str, u64>,
    started_at: DateTime<Utc>,
}

impl Default for AnalysisStats {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            degraded_reads: AtomicU64::new(0),
            honeypots_detected: AtomicU64::new(0),
            critical: AtomicU64::new(0),
            high: AtomicU64::new(0),
            medium: AtomicU64::new(0),
            low: AtomicU64::new(0),
            safe: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            failures_by_code: DashMap::new(),
            started_at: Utc::now(),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a freshly computed report (cache hits are not counted)
    pub fn record_report(&self, report: &SecurityReport, latency_ms: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        if report.is_honeypot {
            self.honeypots_detected.fetch_add(1, Ordering::Relaxed);
        }
        let bucket = match report.risk_level {
            RiskLevel::Critical => &self.critical,
            RiskLevel::High => &self.high,
            RiskLevel::Medium => &self.medium,
            RiskLevel::Low => &self.low,
            RiskLevel::Safe => &self.safe,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, code: ErrorCode) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        *self.failures_by_code.entry(code.as_str()).or_insert(0) += 1;
    }

    /// A field read that fell back to its default
    pub fn record_degraded_read(&self) {
        self.degraded_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let mut by_level = BTreeMap::new();
        by_level.insert("CRITICAL".to_string(), self.critical.load(Ordering::Relaxed));
        by_level.insert("HIGH".to_string(), self.high.load(Ordering::Relaxed));
        by_level.insert("MEDIUM".to_string(), self.medium.load(Ordering::Relaxed));
        by_level.insert("LOW".to_string(), self.low.load(Ordering::Relaxed));
        by_level.insert("SAFE".to_string(), self.safe.load(Ordering::Relaxed));

        StatsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            completed,
            failed: self.failed.load(Ordering::Relaxed),
            degraded_reads: self.degraded_reads.load(Ordering::Relaxed),
            honeypots_detected: self.honeypots_detected.load(Ordering::Relaxed),
            reports_by_level: by_level,
            failures_by_code: self
                .failures_by_code
                .iter()
                .map(|e| (e.key().to_string(), *e.value()))
                .collect(),
            avg_latency_ms: if completed > 0 {
                total_latency as f64 / completed as f64
            } else {
                0.0
            },
            started_at: self.started_at,
        }
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub completed: u64,
    pub failed: u64,
    pub degraded_reads: u64,
    pub honeypots_detected: u64,
    pub reports_by_level: BTreeMap<String, u64>,
    pub failures_by_code: BTreeMap<String, u64>,
    pub avg_latency_ms: f64,
    pub started_at: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Text block for the CLI / logs
    pub fn summary(&self) -> String {
        format!(
            r#"
╔══════════════════════════════════════════════╗
║           🛡️ TOKEN GUARD - SESSION STATS      ║
╠══════════════════════════════════════════════╣
║   🔍 Requests:           {:>10}            ║
║   ✅ Completed:          {:>10}            ║
║   ❌ Failed:             {:>10}            ║
║   ⚠️ Degraded reads:     {:>10}            ║
║   🍯 Honeypot signals:   {:>10}            ║
║   ⚡ Avg latency:        {:>10.2}ms          ║
╚══════════════════════════════════════════════╝
"#,
            self.total_requests,
            self.completed,
            self.failed,
            self.degraded_reads,
            self.honeypots_detected,
            self.avg_latency_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failures_grouped_by_code() {
        let stats = AnalysisStats::new();
        stats.record_request();
        stats.record_request();
        stats.record_failure(ErrorCode::Timeout);
        stats.record_failure(ErrorCode::Timeout);
        stats.record_failure(ErrorCode::NotAContract);
        stats.record_degraded_read();

        let snap = stats.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.failed, 3);
        assert_eq!(snap.degraded_reads, 1);
        assert_eq!(snap.failures_by_code.get("TIMEOUT"), Some(&2));
        assert_eq!(snap.failures_by_code.get("NOT_A_CONTRACT"), Some(&1));
        assert_eq!(snap.avg_latency_ms, 0.0);
    }
}
