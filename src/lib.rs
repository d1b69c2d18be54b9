//! Fraud Risk Scoring Library
//!
//! Rule-based risk scoring for e-commerce transactions, with dataset
//! loading and dashboard analytics over the scored results.

pub mod analytics;
pub mod config;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod mock;
pub mod scorer;
pub mod types;

pub use config::AppConfig;
pub use error::DataError;
pub use loader::{CsvFileSource, JsonFileSource, TransactionSource};
pub use mock::MockSource;
pub use scorer::{calculate_risk_score, RiskScorer};
pub use types::{
    assessment::{RiskAssessment, RiskFactor, RiskLevel},
    transaction::Transaction,
};
