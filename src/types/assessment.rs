//! Risk assessment data structures

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Determine risk level from a 0-100 score and thresholds.
    ///
    /// Both boundaries are inclusive.
    pub fn from_score(score: u8, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Configurable risk level thresholds on the 0-100 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: u8,
    pub high: u8,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 50,
            high: 80,
        }
    }
}

/// Impact severity of a single factor.
///
/// Variant order is the display order: `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    High,
    Medium,
    Low,
}

/// Raw value that triggered a factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorValue {
    Flag(bool),
    Count(i64),
    Text(String),
}

impl fmt::Display for FactorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactorValue::Flag(v) => write!(f, "{}", v),
            FactorValue::Count(v) => write!(f, "{}", v),
            FactorValue::Text(v) => f.write_str(v),
        }
    }
}

/// One human-readable reason contributing to a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    pub description: String,
    pub impact: Impact,
    pub value: FactorValue,
}

impl RiskFactor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        impact: Impact,
        value: FactorValue,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            impact,
            value,
        }
    }
}

/// Result of scoring one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Risk score (0 - 100)
    pub score: u8,
    /// Level derived from the score
    pub level: RiskLevel,
    /// Heuristic certainty, not a probability
    pub confidence: f64,
    /// Contributing factors, most severe first for locally computed scores
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    pub fn is_high_risk(&self) -> bool {
        self.level == RiskLevel::High
    }

    /// Number of factors at the given impact
    pub fn count_impact(&self, impact: Impact) -> usize {
        self.factors.iter().filter(|f| f.impact == impact).count()
    }
}
