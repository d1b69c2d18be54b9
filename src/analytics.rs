//! Dashboard aggregates over scored transactions.
//!
//! [`score_all`] pairs each transaction with its assessment once; everything
//! else consumes the resulting [`ScoredTransaction`]s.

use crate::scorer::RiskScorer;
use crate::types::assessment::{RiskAssessment, RiskFactor, RiskLevel};
use crate::types::transaction::Transaction;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};

/// A transaction together with its assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTransaction {
    pub transaction: Transaction,
    pub assessment: RiskAssessment,
}

impl ScoredTransaction {
    pub fn score(&self) -> u8 {
        self.assessment.score
    }

    pub fn level(&self) -> RiskLevel {
        self.assessment.level
    }

    pub fn decision(&self) -> Decision {
        Decision::for_item(self)
    }
}

/// Score every transaction as of `now`
pub fn score_all(
    scorer: &RiskScorer,
    transactions: Vec<Transaction>,
    now: DateTime<Utc>,
) -> Vec<ScoredTransaction> {
    score_all_observed(scorer, transactions, now, |_, _| {})
}

/// Like [`score_all`], calling `on_scored` with each result and the time
/// spent scoring it
pub fn score_all_observed<F>(
    scorer: &RiskScorer,
    transactions: Vec<Transaction>,
    now: DateTime<Utc>,
    mut on_scored: F,
) -> Vec<ScoredTransaction>
where
    F: FnMut(&ScoredTransaction, StdDuration),
{
    transactions
        .into_iter()
        .map(|transaction| {
            let start = Instant::now();
            let assessment = scorer.assess(&transaction, now);
            let elapsed = start.elapsed();

            let item = ScoredTransaction {
                transaction,
                assessment,
            };
            on_scored(&item, elapsed);
            item
        })
        .collect()
}

/// Outcome shown on the transaction detail view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Review,
    Blocked,
}

impl Decision {
    /// Labeled fraud is blocked whatever its score
    pub fn for_item(item: &ScoredTransaction) -> Self {
        if item.transaction.is_fraud || item.assessment.is_high_risk() {
            Decision::Blocked
        } else if item.level() == RiskLevel::Medium {
            Decision::Review
        } else {
            Decision::Approved
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Review => "review",
            Decision::Blocked => "blocked",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Look up one transaction by exact id
pub fn find_by_id<'a>(
    scored: &'a [ScoredTransaction],
    id: &str,
) -> Option<&'a ScoredTransaction> {
    scored.iter().find(|item| item.transaction.transaction_id == id)
}

/// Headline numbers for the overview page
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub high_risk: usize,
    pub medium_risk: usize,
    pub low_risk: usize,
    /// High-risk transactions are blocked
    pub blocked: usize,
    pub avg_risk_score: f64,
    pub total_amount: f64,
    /// Amount of blocked transactions
    pub blocked_amount: f64,
    /// Share of high-risk transactions, in percent
    pub fraud_rate: f64,
    pub without_3ds: usize,
    /// Ground-truth fraud label count
    pub labeled_fraud: usize,
}

impl DashboardStats {
    pub fn compute(scored: &[ScoredTransaction]) -> Self {
        let mut stats = Self {
            total: scored.len(),
            ..Self::default()
        };
        if scored.is_empty() {
            return stats;
        }

        let mut score_sum = 0u64;
        for item in scored {
            let tx = &item.transaction;
            score_sum += u64::from(item.score());
            stats.total_amount += tx.amount;

            match item.level() {
                RiskLevel::High => {
                    stats.high_risk += 1;
                    stats.blocked_amount += tx.amount;
                }
                RiskLevel::Medium => stats.medium_risk += 1,
                RiskLevel::Low => stats.low_risk += 1,
            }
            if !tx.is_3ds_passed {
                stats.without_3ds += 1;
            }
            if tx.is_fraud {
                stats.labeled_fraud += 1;
            }
        }

        stats.blocked = stats.high_risk;
        stats.avg_risk_score = score_sum as f64 / scored.len() as f64;
        stats.fraud_rate = stats.high_risk as f64 / scored.len() as f64 * 100.0;
        stats
    }
}

/// Per-day counts by risk level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    /// High risk
    pub fraud: usize,
    /// Medium risk
    pub suspicious: usize,
    /// Low risk
    pub safe: usize,
    pub total: usize,
}

/// One point per day for the `days` days ending on `today`, oldest first
pub fn daily_trend(scored: &[ScoredTransaction], today: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let mut by_day: HashMap<NaiveDate, TrendPoint> = HashMap::new();
    for item in scored {
        let Some(date) = item.transaction.date() else {
            continue;
        };
        let point = by_day.entry(date).or_insert_with(|| TrendPoint::empty(date));
        point.total += 1;
        match item.level() {
            RiskLevel::High => point.fraud += 1,
            RiskLevel::Medium => point.suspicious += 1,
            RiskLevel::Low => point.safe += 1,
        }
    }

    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(i64::from(offset));
            by_day.remove(&date).unwrap_or_else(|| TrendPoint::empty(date))
        })
        .collect()
}

impl TrendPoint {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            fraud: 0,
            suspicious: 0,
            safe: 0,
            total: 0,
        }
    }
}

/// Risky share of transactions in one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRisk {
    pub name: String,
    pub total: usize,
    pub risky: usize,
    /// `risky / total`, in percent
    pub rate: f64,
}

/// Grouping key for [`segment_risk`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    IpRegion,
    DeviceOs,
    PaymentGateway,
    Category,
}

impl Segment {
    fn key<'a>(&self, tx: &'a Transaction) -> &'a str {
        match self {
            Segment::IpRegion => tx.ip_region.as_str(),
            Segment::DeviceOs => tx.device_os.as_str(),
            Segment::PaymentGateway => tx.payment_gateway.as_str(),
            Segment::Category => tx.category.as_str(),
        }
    }
}

/// Group by `segment`, counting transactions scoring at least `risky_score`.
///
/// Sorted by risky count descending, then name.
pub fn segment_risk(
    scored: &[ScoredTransaction],
    segment: Segment,
    risky_score: u8,
) -> Vec<SegmentRisk> {
    let mut groups: HashMap<&str, (usize, usize)> = HashMap::new();
    for item in scored {
        let entry = groups.entry(segment.key(&item.transaction)).or_default();
        entry.0 += 1;
        if item.score() >= risky_score {
            entry.1 += 1;
        }
    }

    let mut segments: Vec<SegmentRisk> = groups
        .into_iter()
        .map(|(name, (total, risky))| SegmentRisk {
            name: name.to_string(),
            total,
            risky,
            rate: risky as f64 / total as f64 * 100.0,
        })
        .collect();

    segments.sort_by(|a, b| b.risky.cmp(&a.risky).then_with(|| a.name.cmp(&b.name)));
    segments
}

/// Regions ranked by risky rate, highest first, at most `top` entries
pub fn region_risk(scored: &[ScoredTransaction], risky_score: u8, top: usize) -> Vec<SegmentRisk> {
    let mut regions = segment_risk(scored, Segment::IpRegion, risky_score);
    regions.sort_by(|a, b| {
        b.rate
            .partial_cmp(&a.rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    regions.truncate(top);
    regions
}

/// Most recent transactions first; undated ones last
pub fn recent(scored: &[ScoredTransaction], count: usize) -> Vec<&ScoredTransaction> {
    let mut items: Vec<&ScoredTransaction> = scored.iter().collect();
    items.sort_by(|a, b| newest_first(&a.transaction, &b.transaction));
    items.truncate(count);
    items
}

fn newest_first(a: &Transaction, b: &Transaction) -> Ordering {
    // None < Some, so reversing puts undated records last
    b.timestamp.cmp(&a.timestamp)
}

/// Transaction list filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFilter {
    #[default]
    All,
    HighRisk,
    MediumRisk,
    LowRisk,
    No3ds,
}

impl RiskFilter {
    pub fn matches(&self, item: &ScoredTransaction) -> bool {
        match self {
            RiskFilter::All => true,
            RiskFilter::HighRisk => item.level() == RiskLevel::High,
            RiskFilter::MediumRisk => item.level() == RiskLevel::Medium,
            RiskFilter::LowRisk => item.level() == RiskLevel::Low,
            RiskFilter::No3ds => !item.transaction.is_3ds_passed,
        }
    }
}

/// Transaction list ordering, always descending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Amount,
    Risk,
}

/// Search, filter and sort settings for the transaction list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    pub search: Option<String>,
    pub filter: RiskFilter,
    pub sort: SortBy,
}

impl TransactionQuery {
    /// Case-insensitive match on email and transaction id, substring match on IP
    fn matches_search(&self, tx: &Transaction) -> bool {
        let Some(query) = self.search.as_deref().filter(|q| !q.is_empty()) else {
            return true;
        };
        let needle = query.to_lowercase();
        tx.email.to_lowercase().contains(&needle)
            || tx.ip.contains(query)
            || tx.transaction_id.to_lowercase().contains(&needle)
    }

    /// Apply to a scored set; sorting is stable
    pub fn apply<'a>(&self, scored: &'a [ScoredTransaction]) -> Vec<&'a ScoredTransaction> {
        let mut items: Vec<&ScoredTransaction> = scored
            .iter()
            .filter(|item| self.matches_search(&item.transaction))
            .filter(|item| self.filter.matches(item))
            .collect();

        match self.sort {
            SortBy::Date => items.sort_by(|a, b| newest_first(&a.transaction, &b.transaction)),
            SortBy::Amount => items.sort_by(|a, b| {
                b.transaction
                    .amount
                    .partial_cmp(&a.transaction.amount)
                    .unwrap_or(Ordering::Equal)
            }),
            SortBy::Risk => items.sort_by(|a, b| b.score().cmp(&a.score())),
        }
        items
    }
}

/// Filter tab counts for the transaction list
pub fn filter_counts(scored: &[ScoredTransaction]) -> Vec<(RiskFilter, usize)> {
    [
        RiskFilter::All,
        RiskFilter::HighRisk,
        RiskFilter::MediumRisk,
        RiskFilter::LowRisk,
        RiskFilter::No3ds,
    ]
    .into_iter()
    .map(|filter| (filter, scored.iter().filter(|item| filter.matches(item)).count()))
    .collect()
}

/// Relative change in percent; 0 when there is no previous value
pub fn percentage_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

/// Flat per-transaction record written by `--export`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord<'a> {
    pub transaction_id: &'a str,
    pub score: u8,
    pub level: RiskLevel,
    pub confidence: f64,
    pub factors: &'a [RiskFactor],
}

impl<'a> From<&'a ScoredTransaction> for ExportRecord<'a> {
    fn from(item: &'a ScoredTransaction) -> Self {
        Self {
            transaction_id: &item.transaction.transaction_id,
            score: item.assessment.score,
            level: item.assessment.level,
            confidence: item.assessment.confidence,
            factors: &item.assessment.factors,
        }
    }
}
