//! Scoring statistics: counts per level and path, score distribution, timings.

use crate::types::assessment::{RiskAssessment, RiskLevel};
use crate::types::transaction::Transaction;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Which scoring path produced an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringPath {
    Local,
    Precomputed,
}

impl ScoringPath {
    /// Path the scorer takes for `tx`
    pub fn of(tx: &Transaction) -> Self {
        if tx.external.is_some() {
            ScoringPath::Precomputed
        } else {
            ScoringPath::Local
        }
    }
}

/// Metrics collector for scoring runs
pub struct ScoringMetrics {
    /// Total transactions scored
    pub transactions_scored: AtomicU64,
    /// Scored by local rules
    pub local_scored: AtomicU64,
    /// Scored from an upstream score
    pub precomputed_scored: AtomicU64,
    /// Assessments by risk level
    by_level: RwLock<HashMap<RiskLevel, u64>>,
    /// Factor occurrences by name
    factor_counts: RwLock<HashMap<String, u64>>,
    /// Scoring times (in microseconds)
    scoring_times: RwLock<Vec<u64>>,
    /// Score distribution buckets of width 10
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            local_scored: AtomicU64::new(0),
            precomputed_scored: AtomicU64::new(0),
            by_level: RwLock::new(HashMap::new()),
            factor_counts: RwLock::new(HashMap::new()),
            scoring_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one scored transaction
    pub fn record(&self, assessment: &RiskAssessment, path: ScoringPath, elapsed: Duration) {
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);
        match path {
            ScoringPath::Local => self.local_scored.fetch_add(1, Ordering::Relaxed),
            ScoringPath::Precomputed => self.precomputed_scored.fetch_add(1, Ordering::Relaxed),
        };

        if let Ok(mut times) = self.scoring_times.write() {
            times.push(elapsed.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        // 100 shares the top bucket with 90-99
        let bucket = (assessment.score as usize / 10).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_level) = self.by_level.write() {
            *by_level.entry(assessment.level).or_insert(0) += 1;
        }

        if let Ok(mut counts) = self.factor_counts.write() {
            for factor in &assessment.factors {
                *counts.entry(factor.name.clone()).or_insert(0) += 1;
            }
        }
    }

    /// Get scoring time statistics
    pub fn get_timing_stats(&self) -> TimingStats {
        let Ok(times) = self.scoring_times.read() else {
            return TimingStats::default();
        };
        if times.is_empty() {
            return TimingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let pick = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        TimingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: pick(0.5),
            p95_us: pick(0.95),
            p99_us: pick(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get assessments per level
    pub fn get_level_counts(&self) -> HashMap<RiskLevel, u64> {
        self.by_level
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Most frequent factors, most common first
    pub fn get_top_factors(&self, limit: usize) -> Vec<(String, u64)> {
        let mut factors: Vec<(String, u64)> = self
            .factor_counts
            .read()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default();
        factors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        factors.truncate(limit);
        factors
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Transactions scored per second since creation
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let total = self.transactions_scored.load(Ordering::Relaxed);
        let local = self.local_scored.load(Ordering::Relaxed);
        let precomputed = self.precomputed_scored.load(Ordering::Relaxed);
        let timing = self.get_timing_stats();
        let levels = self.get_level_counts();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║               RISK SCORING - METRICS SUMMARY                 ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored: {:>8}  │  Throughput: {:>9.1} tx/s ║",
            total,
            self.get_throughput()
        );
        info!(
            "║ Local Rules:         {:>8}  │  Precomputed: {:>8}      ║",
            local, precomputed
        );
        info!(
            "║ Scoring Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}  ║",
            timing.mean_us, timing.p50_us, timing.p95_us, timing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Assessments by Risk Level:                                   ║");
        for level in [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
            let count = levels.get(&level).copied().unwrap_or(0);
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)", level, count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let bucket_total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if bucket_total > 0 {
                (count as f64 / bucket_total as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                if i == 9 { 100 } else { i * 10 + 9 },
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        let top = self.get_top_factors(5);
        if !top.is_empty() {
            info!("Most frequent risk factors:");
            for (name, count) in &top {
                info!("  {}: {}", name, count);
            }
        }
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring time statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TimingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::assessment::{FactorValue, Impact, RiskFactor};
    use crate::types::transaction::ExternalScore;

    fn assessment(score: u8, level: RiskLevel, factors: &[&str]) -> RiskAssessment {
        RiskAssessment {
            score,
            level,
            confidence: 0.5,
            factors: factors
                .iter()
                .map(|name| RiskFactor::new(*name, *name, Impact::High, FactorValue::Flag(true)))
                .collect(),
        }
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ScoringMetrics::new();

        metrics.record(
            &assessment(100, RiskLevel::High, &["Suspicious IP", "3DS not passed"]),
            ScoringPath::Local,
            Duration::from_micros(10),
        );
        metrics.record(
            &assessment(42, RiskLevel::Low, &["Suspicious IP"]),
            ScoringPath::Precomputed,
            Duration::from_micros(30),
        );
        metrics.record(
            &assessment(0, RiskLevel::Low, &[]),
            ScoringPath::Local,
            Duration::from_micros(20),
        );

        assert_eq!(metrics.transactions_scored.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.local_scored.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.precomputed_scored.load(Ordering::Relaxed), 1);

        let levels = metrics.get_level_counts();
        assert_eq!(levels.get(&RiskLevel::Low), Some(&2));
        assert_eq!(levels.get(&RiskLevel::High), Some(&1));

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[0], 1);
        assert_eq!(dist[4], 1);
        assert_eq!(dist[9], 1);

        assert_eq!(
            metrics.get_top_factors(1),
            vec![("Suspicious IP".to_string(), 2)]
        );
    }

    #[test]
    fn test_timing_stats() {
        let metrics = ScoringMetrics::new();
        assert_eq!(metrics.get_timing_stats(), TimingStats::default());

        for us in [10, 20, 30, 40] {
            metrics.record(
                &assessment(0, RiskLevel::Low, &[]),
                ScoringPath::Local,
                Duration::from_micros(us),
            );
        }

        let stats = metrics.get_timing_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 25);
        assert_eq!(stats.p50_us, 30);
        assert_eq!(stats.max_us, 40);
    }

    #[test]
    fn test_scoring_path_of() {
        let local = Transaction::new("tx_local", 10.0);
        assert_eq!(ScoringPath::of(&local), ScoringPath::Local);

        let upstream = local.with_external_score(ExternalScore {
            risk_score: 12.0,
            risk_factors: Vec::new(),
            fraud_probability: None,
        });
        assert_eq!(ScoringPath::of(&upstream), ScoringPath::Precomputed);
    }
}
