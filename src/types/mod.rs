//! Type definitions for risk scoring

pub mod assessment;
pub mod transaction;

pub use assessment::{
    FactorValue, Impact, RiskAssessment, RiskFactor, RiskLevel, RiskLevelThresholds,
};
pub use transaction::{ExternalScore, Transaction};
