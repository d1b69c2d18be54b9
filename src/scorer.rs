//! Rule-based risk scoring for e-commerce transactions.
//!
//! Two paths produce a [`RiskAssessment`]:
//! - precomputed: the transaction carries an upstream score, which is taken
//!   as-is and its free-text factors are classified by keyword;
//! - local: a fixed battery of independent rules adds points and factors.

use crate::types::assessment::{
    FactorValue, Impact, RiskAssessment, RiskFactor, RiskLevel, RiskLevelThresholds,
};
use crate::types::transaction::{ExternalScore, Transaction};
use chrono::{DateTime, Utc};
use tracing::trace;

/// Upper bound of the score scale
pub const MAX_SCORE: u32 = 100;

/// Confidence with no corroborating factors
pub const BASE_CONFIDENCE: f64 = 0.5;

/// Confidence added per factor
pub const CONFIDENCE_PER_FACTOR: f64 = 0.05;

/// Confidence never reaches certainty
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Markers that make an upstream factor string high impact
pub const HIGH_IMPACT_MARKERS: &[&str] = &[
    "VPN",
    "Proxy",
    "Tor",
    "эмулятор",
    "чарджбек",
    "3D Secure",
    "3DS",
    "Suspicious IP",
    "emulator",
    "chargeback",
    "Chargeback",
];

/// Markers that make an upstream factor string low impact
pub const LOW_IMPACT_MARKERS: &[&str] = &[
    "Телефон",
    "Адрес доставки не подтвержден",
    "Phone",
    "Address not verified",
    "address not verified",
];

/// Deterministic, rule-based transaction scorer.
///
/// Holds no mutable state; one instance can score any number of
/// transactions from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct RiskScorer {
    thresholds: RiskLevelThresholds,
}

impl RiskScorer {
    /// Create a scorer with the default 50/80 level thresholds
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scorer with custom level thresholds
    pub fn with_thresholds(thresholds: RiskLevelThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskLevelThresholds {
        &self.thresholds
    }

    /// Score a transaction against the current time
    pub fn score(&self, tx: &Transaction) -> RiskAssessment {
        self.assess(tx, Utc::now())
    }

    /// Score a transaction as of `now`.
    ///
    /// Same inputs always give the same output.
    pub fn assess(&self, tx: &Transaction, now: DateTime<Utc>) -> RiskAssessment {
        match &tx.external {
            Some(external) => self.assess_precomputed(external),
            None => self.assess_local(tx, now),
        }
    }

    fn assess_precomputed(&self, external: &ExternalScore) -> RiskAssessment {
        let score = if external.risk_score.is_finite() {
            external.risk_score.round().clamp(0.0, MAX_SCORE as f64) as u8
        } else {
            0
        };

        let confidence = match external.fraud_probability {
            Some(p) if p.is_finite() && p != 0.0 => p.clamp(0.0, 1.0),
            _ => BASE_CONFIDENCE,
        };

        let factors = external
            .risk_factors
            .iter()
            .map(|text| RiskFactor {
                name: text.clone(),
                description: text.clone(),
                impact: classify_factor_text(text),
                value: FactorValue::Flag(true),
            })
            .collect();

        RiskAssessment {
            score,
            level: RiskLevel::from_score(score, &self.thresholds),
            confidence,
            factors,
        }
    }

    fn assess_local(&self, tx: &Transaction, now: DateTime<Utc>) -> RiskAssessment {
        let mut score: u32 = 0;
        let mut factors = Vec::new();
        let mut add = |points: u32, factor: RiskFactor| {
            score = score.saturating_add(points);
            factors.push(factor);
        };

        if tx.is_high_risk_item {
            add(
                20,
                RiskFactor::new(
                    "High-risk item",
                    "Product belongs to a high-risk category (game console, VR)",
                    Impact::High,
                    FactorValue::Flag(true),
                ),
            );
        }

        if !tx.is_3ds_passed {
            add(
                25,
                RiskFactor::new(
                    "3DS not passed",
                    "3D Secure authentication was not completed",
                    Impact::High,
                    FactorValue::Flag(false),
                ),
            );
        }

        if tx.attempt_count > 1 {
            add(
                tx.attempt_count.saturating_mul(10),
                RiskFactor::new(
                    "Multiple payment attempts",
                    format!("{} payment attempts", tx.attempt_count),
                    Impact::Medium,
                    FactorValue::Count(tx.attempt_count.into()),
                ),
            );
        }

        if tx.vpn || tx.proxy || tx.tor {
            add(
                30,
                RiskFactor::new(
                    "Suspicious IP",
                    "VPN, proxy or Tor in use",
                    Impact::High,
                    FactorValue::Flag(true),
                ),
            );
        }

        if tx.is_emulator {
            add(
                35,
                RiskFactor::new(
                    "Device emulator",
                    "Purchase made from an emulated device",
                    Impact::High,
                    FactorValue::Flag(true),
                ),
            );
        }

        if !tx.addresses_match {
            add(
                15,
                RiskFactor::new(
                    "Address mismatch",
                    "Delivery address differs from billing address",
                    Impact::Medium,
                    FactorValue::Flag(false),
                ),
            );
        }

        if tx.velocity_same_card_1h > 2 {
            add(
                20,
                RiskFactor::new(
                    "High card velocity",
                    format!(
                        "{} transactions with the same card within an hour",
                        tx.velocity_same_card_1h
                    ),
                    Impact::High,
                    FactorValue::Count(tx.velocity_same_card_1h.into()),
                ),
            );
        }

        if tx.velocity_same_ip_24h > 5 {
            add(
                15,
                RiskFactor::new(
                    "High IP velocity",
                    format!(
                        "{} transactions from the same IP within 24 hours",
                        tx.velocity_same_ip_24h
                    ),
                    Impact::Medium,
                    FactorValue::Count(tx.velocity_same_ip_24h.into()),
                ),
            );
        }

        if tx.previous_chargebacks > 0 {
            add(
                tx.previous_chargebacks.saturating_mul(30),
                RiskFactor::new(
                    "Chargeback history",
                    format!("{} previous chargebacks", tx.previous_chargebacks),
                    Impact::High,
                    FactorValue::Count(tx.previous_chargebacks.into()),
                ),
            );
        }

        if !tx.phone_verified {
            add(
                10,
                RiskFactor::new(
                    "Phone not verified",
                    "Phone number failed verification",
                    Impact::Low,
                    FactorValue::Flag(false),
                ),
            );
        }

        if !tx.address_verified {
            add(
                10,
                RiskFactor::new(
                    "Address not verified",
                    "Delivery address not verified",
                    Impact::Low,
                    FactorValue::Flag(false),
                ),
            );
        }

        if tx.cart_abandon_rate > 0.3 {
            let percent = format!("{:.0}%", (tx.cart_abandon_rate * 100.0).round());
            add(
                10,
                RiskFactor::new(
                    "High cart abandonment",
                    format!("{} of carts abandoned", percent),
                    Impact::Low,
                    FactorValue::Text(percent),
                ),
            );
        }

        // Unknown first-seen date: rule silently skipped
        if let Some(days) = tx.email_age_days(now).filter(|&days| days < 30) {
            add(
                15,
                RiskFactor::new(
                    "New email",
                    format!("Email first seen {} days ago", days),
                    Impact::Medium,
                    FactorValue::Text(format!("{} days", days)),
                ),
            );
        }

        let score = score.min(MAX_SCORE) as u8;
        let confidence = confidence_for(factors.len());

        // Stable: equal impacts keep rule order
        factors.sort_by_key(|f| f.impact);

        trace!(
            transaction_id = %tx.transaction_id,
            score = score,
            factors = factors.len(),
            "Local rule evaluation complete"
        );

        RiskAssessment {
            score,
            level: RiskLevel::from_score(score, &self.thresholds),
            confidence,
            factors,
        }
    }
}

/// Score a transaction with the default thresholds against the current time
pub fn calculate_risk_score(tx: &Transaction) -> RiskAssessment {
    RiskScorer::new().score(tx)
}

/// `min(0.95, 0.5 + 0.05 * factor_count)`
pub fn confidence_for(factor_count: usize) -> f64 {
    (BASE_CONFIDENCE + CONFIDENCE_PER_FACTOR * factor_count as f64).min(MAX_CONFIDENCE)
}

/// Impact of an upstream free-text factor, by case-sensitive keyword match
pub fn classify_factor_text(text: &str) -> Impact {
    if HIGH_IMPACT_MARKERS.iter().any(|m| text.contains(m)) {
        Impact::High
    } else if LOW_IMPACT_MARKERS.iter().any(|m| text.contains(m)) {
        Impact::Low
    } else {
        Impact::Medium
    }
}
