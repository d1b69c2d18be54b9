//! Fraud Risk Scoring - Main Entry Point
//!
//! Loads transactions from CSV/JSON files (or generates mock data), scores
//! each one and logs the dashboard aggregates.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use fraud_risk_scoring::{
    analytics::{
        daily_trend, filter_counts, find_by_id, percentage_change, recent, region_risk,
        score_all_observed, segment_risk, DashboardStats, ExportRecord, RiskFilter,
        ScoredTransaction, Segment, SortBy, TransactionQuery,
    },
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    loader::{load_all, CsvFileSource, JsonFileSource, TransactionSource},
    metrics::{ScoringMetrics, ScoringPath},
    mock::MockSource,
    scorer::RiskScorer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "fraud-risk", about = "Score e-commerce transactions for fraud risk")]
struct Args {
    /// Configuration file; defaults apply when it does not exist
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// CSV dataset (overrides data.csv_path)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// JSON dataset of upstream-scored transactions (overrides data.json_path)
    #[arg(long)]
    json: Option<PathBuf>,

    /// Generate N mock transactions instead of reading files
    #[arg(long, conflicts_with_all = ["csv", "json"])]
    mock: Option<usize>,

    /// Seed for mock data
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Share of suspicious mock transactions
    #[arg(long, default_value_t = 0.15)]
    fraud_rate: f64,

    /// Transaction list filter
    #[arg(long, value_enum, default_value_t = RiskFilter::All)]
    filter: RiskFilter,

    /// Transaction list ordering
    #[arg(long, value_enum, default_value_t = SortBy::Date)]
    sort: SortBy,

    /// Search by email, IP or transaction id
    #[arg(long)]
    search: Option<String>,

    /// Rows of the transaction list to log
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Write every assessment to this JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Show the risk detail of one transaction instead of the dashboard
    #[arg(long)]
    id: Option<String>,
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = config.logging.env_filter()?;

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn build_sources(args: &Args, config: &AppConfig) -> Vec<Arc<dyn TransactionSource>> {
    if let Some(count) = args.mock {
        return vec![Arc::new(MockSource::new(count, args.fraud_rate, args.seed))];
    }

    let json_path = args
        .json
        .clone()
        .or_else(|| config.data.json_path.as_ref().map(PathBuf::from));
    let csv_path = args
        .csv
        .clone()
        .or_else(|| config.data.csv_path.as_ref().map(PathBuf::from));

    // API records come first, as in the dashboard's merged feed
    let mut sources: Vec<Arc<dyn TransactionSource>> = Vec::new();
    if let Some(path) = json_path {
        sources.push(Arc::new(JsonFileSource::new(path)));
    }
    if let Some(path) = csv_path {
        sources.push(Arc::new(CsvFileSource::new(path)));
    }
    sources
}

fn log_dashboard(scored: &[ScoredTransaction], config: &AppConfig) {
    let stats = DashboardStats::compute(scored);
    info!(
        total = stats.total,
        high = stats.high_risk,
        medium = stats.medium_risk,
        low = stats.low_risk,
        avg_score = format!("{:.1}", stats.avg_risk_score),
        fraud_rate = format!("{:.1}%", stats.fraud_rate),
        "Risk overview"
    );
    info!(
        blocked = stats.blocked,
        blocked_amount = format!("{:.2}", stats.blocked_amount),
        total_amount = format!("{:.2}", stats.total_amount),
        without_3ds = stats.without_3ds,
        labeled_fraud = stats.labeled_fraud,
        "Amounts"
    );

    let today = Utc::now().date_naive();
    let trend = daily_trend(scored, today, config.dashboard.trend_days);
    for point in &trend {
        info!(
            date = %point.date,
            fraud = point.fraud,
            suspicious = point.suspicious,
            safe = point.safe,
            "Daily trend"
        );
    }
    if let [.., previous, latest] = trend.as_slice() {
        let change = percentage_change(latest.fraud as f64, previous.fraud as f64);
        info!(
            today = latest.fraud,
            yesterday = previous.fraud,
            change = format!("{:+.1}%", change),
            "High-risk day over day"
        );
    }

    let risky = config.dashboard.region_risky_score;
    for region in region_risk(scored, risky, config.dashboard.top_regions) {
        info!(
            region = %region.name,
            risky = region.risky,
            total = region.total,
            rate = format!("{:.1}%", region.rate),
            "Region risk"
        );
    }
    for (label, segment) in [
        ("device_os", Segment::DeviceOs),
        ("payment_gateway", Segment::PaymentGateway),
        ("category", Segment::Category),
    ] {
        for group in segment_risk(scored, segment, config.scoring.thresholds.high) {
            debug!(
                segment = label,
                name = %group.name,
                risky = group.risky,
                total = group.total,
                "Segment risk"
            );
        }
    }

    for item in recent(scored, config.dashboard.recent_count) {
        info!(
            transaction_id = %item.transaction.transaction_id,
            amount = item.transaction.amount,
            score = item.score(),
            level = %item.level(),
            "Recent"
        );
    }
}

fn log_detail(item: &ScoredTransaction) {
    let tx = &item.transaction;
    let assessment = &item.assessment;
    info!(
        transaction_id = %tx.transaction_id,
        decision = %item.decision(),
        score = assessment.score,
        level = %assessment.level,
        confidence = format!("{:.2}", assessment.confidence),
        upstream = tx.external.is_some(),
        "Transaction risk detail"
    );
    info!(
        amount = tx.amount,
        currency = %tx.currency,
        product = %tx.product_name,
        email = %tx.email,
        ip = %tx.ip,
        region = %tx.ip_region,
        device = %tx.device_os,
        labeled_fraud = tx.is_fraud,
        "Transaction"
    );
    for factor in &assessment.factors {
        info!(
            impact = ?factor.impact,
            value = %factor.value,
            "{}: {}",
            factor.name,
            factor.description
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load_or_default(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    init_logging(&config)?;

    let scorer = RiskScorer::with_thresholds(config.scoring.thresholds);
    info!("Starting fraud risk scoring");
    info!(
        "Risk level thresholds: medium>={}, high>={}",
        scorer.thresholds().medium,
        scorer.thresholds().high
    );

    let sources = build_sources(&args, &config);
    if sources.is_empty() {
        warn!("No data sources configured");
    }
    let transactions = load_all(sources).await;
    info!(count = transactions.len(), "Transactions loaded");

    let metrics = ScoringMetrics::new();
    let scored = score_all_observed(&scorer, transactions, Utc::now(), |item, elapsed| {
        metrics.record(&item.assessment, ScoringPath::of(&item.transaction), elapsed);
        debug!(
            transaction_id = %item.transaction.transaction_id,
            score = item.score(),
            level = %item.level(),
            factors = item.assessment.factors.len(),
            "Transaction scored"
        );
    });

    if let Some(id) = &args.id {
        let Some(item) = find_by_id(&scored, id) else {
            bail!("Transaction {} not found", id);
        };
        log_detail(item);
        return Ok(());
    }

    log_dashboard(&scored, &config);

    let counts = filter_counts(&scored);
    info!(?counts, "Filter counts");

    let query = TransactionQuery {
        search: args.search.clone(),
        filter: args.filter,
        sort: args.sort,
    };
    let listed = query.apply(&scored);
    info!(matched = listed.len(), filter = ?args.filter, sort = ?args.sort, "Transaction list");
    for item in listed.iter().take(args.limit) {
        let top_factor = item
            .assessment
            .factors
            .first()
            .map(|f| f.name.as_str())
            .unwrap_or("-");
        info!(
            transaction_id = %item.transaction.transaction_id,
            email = %item.transaction.email,
            amount = item.transaction.amount,
            score = item.score(),
            level = %item.level(),
            confidence = format!("{:.2}", item.assessment.confidence),
            top_factor,
            "Transaction"
        );
    }

    if let Some(path) = &args.export {
        let records: Vec<ExportRecord> = scored.iter().map(ExportRecord::from).collect();
        let json = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write export to {}", path.display()))?;
        info!(path = %path.display(), count = records.len(), "Assessments exported");
    }

    metrics.print_summary();
    Ok(())
}
