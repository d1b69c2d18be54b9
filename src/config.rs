//! Configuration management for the risk scoring toolkit

use crate::types::assessment::RiskLevelThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Log targets of this crate and its binaries
pub const LOG_TARGETS: &[&str] = &["fraud_risk", "fraud_risk_scoring", "mock_dataset"];

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub scoring: ScoringConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

/// Dataset locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV export of historical transactions
    pub csv_path: Option<String>,
    /// JSON array of upstream-scored transactions, listed before CSV rows
    pub json_path: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: Some("data/ecommerce_fraud_dataset.csv".to_string()),
            json_path: Some("data/api_transactions.json".to_string()),
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Risk level thresholds shared by local and precomputed scores
    pub thresholds: RiskLevelThresholds,
}

/// Dashboard aggregation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Days covered by the fraud trend
    pub trend_days: u32,
    /// Score at which a transaction counts as risky for region ranking
    pub region_risky_score: u8,
    /// Regions shown in the ranking
    pub top_regions: usize,
    /// Entries in the recent transactions feed
    pub recent_count: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            trend_days: 7,
            region_risky_score: 70,
            top_regions: 5,
            recent_count: 8,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG` filter plus `level` for every target in [`LOG_TARGETS`]
    pub fn env_filter(&self) -> Result<EnvFilter> {
        LOG_TARGETS
            .iter()
            .try_fold(EnvFilter::from_default_env(), |filter, target| {
                let directive = format!("{}={}", target, self.level)
                    .parse()
                    .with_context(|| format!("Invalid logging.level {:?}", self.level))?;
                Ok(filter.add_directive(directive))
            })
    }
}

impl AppConfig {
    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when it exists, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the scorer cannot honor
    pub fn validate(&self) -> Result<()> {
        let t = &self.scoring.thresholds;
        ensure!(
            t.medium <= t.high,
            "scoring.thresholds.medium ({}) must not exceed scoring.thresholds.high ({})",
            t.medium,
            t.high
        );
        ensure!(
            t.high <= 100,
            "scoring.thresholds.high ({}) must be within 0-100",
            t.high
        );
        ensure!(
            matches!(self.logging.format.as_str(), "json" | "pretty"),
            "logging.format must be \"json\" or \"pretty\", got {:?}",
            self.logging.format
        );
        Ok(())
    }
}
