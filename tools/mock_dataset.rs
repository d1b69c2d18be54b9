//! Mock Dataset Generator
//!
//! Writes seeded synthetic transactions as a JSON array that the
//! `fraud-risk` binary can load with `--json`.

use anyhow::{Context, Result};
use clap::Parser;
use fraud_risk_scoring::{
    config::LoggingConfig, mock::MockSource, scorer::RiskScorer, types::RiskLevel,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mock-dataset", about = "Generate a synthetic transaction dataset")]
struct Args {
    /// Output file
    #[arg(short, long, default_value = "data/mock_transactions.json")]
    output: PathBuf,

    /// Number of transactions
    #[arg(short, long, default_value_t = 500)]
    count: usize,

    /// Share of suspicious transactions (0.0 - 1.0)
    #[arg(long, default_value_t = 0.15)]
    fraud_rate: f64,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Print a few samples instead of writing the file
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(LoggingConfig::default().env_filter()?)
        .init();

    let args = Args::parse();
    info!(
        count = args.count,
        fraud_rate = args.fraud_rate,
        seed = args.seed,
        "Generating mock transactions"
    );

    let transactions = MockSource::new(args.count, args.fraud_rate, args.seed).generate();

    let scorer = RiskScorer::new();
    let high = transactions
        .iter()
        .filter(|tx| scorer.score(tx).level == RiskLevel::High)
        .count();
    let labeled = transactions.iter().filter(|tx| tx.is_fraud).count();
    info!(
        generated = transactions.len(),
        labeled_fraud = labeled,
        high_risk = high,
        "Generation complete"
    );

    if args.dry_run {
        info!("Running in dry-run mode (nothing written)");
        for (i, tx) in transactions.iter().take(3).enumerate() {
            let json = serde_json::to_string_pretty(tx)?;
            info!("Sample transaction {}:\n{}", i + 1, json);
        }
        return Ok(());
    }

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_vec_pretty(&transactions)?;
    tokio::fs::write(&args.output, json)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    info!(path = %args.output.display(), "Dataset written");
    Ok(())
}
