//! End-to-end scoring over file-backed and mock datasets.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use fraud_risk_scoring::analytics::{
    daily_trend, score_all, DashboardStats, ExportRecord, RiskFilter, ScoredTransaction, SortBy,
    TransactionQuery,
};
use fraud_risk_scoring::loader::{load_all, CsvFileSource, JsonFileSource, TransactionSource};
use fraud_risk_scoring::mock::MockSource;
use fraud_risk_scoring::scorer::{confidence_for, RiskScorer};
use fraud_risk_scoring::types::{Impact, RiskLevel, RiskLevelThresholds, Transaction};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const CSV_DATA: &str = "\
transaction_id,timestamp,amount,is_high_risk_item,is_3ds_passed,attempt_count,vpn,proxy,tor,is_emulator,addresses_match,velocity_same_card_1h,velocity_same_ip_24h,previous_chargebacks,phone_verified,address_verified,cart_abandon_rate,email_first_seen,email,ip,ip_region
tx_a,2024-06-01 10:00:00,1500,False,True,1,False,False,False,False,True,0,0,0,True,True,0,2019-06-01,a@example.com,10.0.0.1,Moscow
tx_b,2024-06-01 11:00:00,2500,False,False,1,True,False,False,False,True,0,0,0,True,True,0,2019-06-01,b@example.com,10.0.0.2,Moscow
tx_c,2024-05-31 09:30:00,800,False,True,1,False,False,False,False,True,0,0,2,True,True,0,2019-06-01,c@example.com,10.0.0.3,Kazan
tx_d,2024-05-30 18:45:00,64000,True,False,1,True,False,False,True,True,0,0,2,True,True,0,2019-06-01,d@example.com,10.0.0.4,Kazan
,2024-05-30 18:45:00,10,False,True,1,False,False,False,False,True,0,0,0,True,True,0,2019-06-01,,,
";

const JSON_DATA: &str = r#"[
  {
    "transaction_id": "api_1",
    "timestamp": "2024-06-01T12:00:00Z",
    "amount": 900,
    "email": "api@example.com",
    "ip_region": "Moscow",
    "is_3ds_passed": true,
    "risk_score": 42,
    "risk_factors": ["VPN detected"]
  }
]"#;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap()
}

fn write_fixtures(dir: &TempDir) -> Vec<Arc<dyn TransactionSource>> {
    let csv_path = dir.path().join("transactions.csv");
    let json_path = dir.path().join("api.json");
    fs::write(&csv_path, CSV_DATA).unwrap();
    fs::write(&json_path, JSON_DATA).unwrap();

    vec![
        Arc::new(JsonFileSource::new(json_path)),
        Arc::new(CsvFileSource::new(csv_path)),
    ]
}

async fn scored_fixtures() -> Vec<ScoredTransaction> {
    let dir = TempDir::new().unwrap();
    let transactions = load_all(write_fixtures(&dir)).await;
    score_all(&RiskScorer::new(), transactions, now())
}

fn find<'a>(scored: &'a [ScoredTransaction], id: &str) -> &'a ScoredTransaction {
    scored
        .iter()
        .find(|s| s.transaction.transaction_id == id)
        .unwrap()
}

#[tokio::test]
async fn test_sources_load_in_order() {
    let scored = scored_fixtures().await;
    let ids: Vec<&str> = scored
        .iter()
        .map(|s| s.transaction.transaction_id.as_str())
        .collect();
    assert_eq!(ids, vec!["api_1", "tx_a", "tx_b", "tx_c", "tx_d"]);
}

#[tokio::test]
async fn test_file_backed_scenarios() {
    let scored = scored_fixtures().await;

    let clean = &find(&scored, "tx_a").assessment;
    assert_eq!(clean.score, 0);
    assert_eq!(clean.level, RiskLevel::Low);
    assert!(clean.factors.is_empty());
    assert_eq!(clean.confidence, 0.5);

    let no_3ds_vpn = &find(&scored, "tx_b").assessment;
    assert_eq!(no_3ds_vpn.score, 55);
    assert_eq!(no_3ds_vpn.level, RiskLevel::Medium);
    assert_eq!(no_3ds_vpn.count_impact(Impact::High), 2);

    let chargebacks = &find(&scored, "tx_c").assessment;
    assert_eq!(chargebacks.score, 60);
    assert_eq!(chargebacks.level, RiskLevel::Medium);
    assert_eq!(chargebacks.factors.len(), 1);

    let saturated = &find(&scored, "tx_d").assessment;
    assert_eq!(saturated.score, 100);
    assert_eq!(saturated.level, RiskLevel::High);

    let upstream = &find(&scored, "api_1").assessment;
    assert_eq!(upstream.score, 42);
    assert_eq!(upstream.level, RiskLevel::Low);
    assert_eq!(upstream.factors.len(), 1);
    assert_eq!(upstream.factors[0].impact, Impact::High);
    assert_eq!(upstream.confidence, 0.5);
}

#[tokio::test]
async fn test_missing_source_degrades_to_empty() {
    let dir = TempDir::new().unwrap();
    let mut sources = write_fixtures(&dir);
    sources.push(Arc::new(CsvFileSource::new(dir.path().join("absent.csv"))));

    let transactions = load_all(sources).await;
    assert_eq!(transactions.len(), 5);
}

#[tokio::test]
async fn test_dashboard_over_fixtures() {
    let scored = scored_fixtures().await;

    let stats = DashboardStats::compute(&scored);
    assert_eq!(stats.total, 5);
    assert_eq!(stats.high_risk, 1);
    assert_eq!(stats.medium_risk, 2);
    assert_eq!(stats.low_risk, 2);
    assert_eq!(stats.without_3ds, 2);

    let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let trend = daily_trend(&scored, today, 3);
    let totals: Vec<usize> = trend.iter().map(|p| p.total).collect();
    assert_eq!(totals, vec![1, 1, 3]);
    assert_eq!(trend[0].fraud, 1);

    let query = TransactionQuery {
        search: None,
        filter: RiskFilter::MediumRisk,
        sort: SortBy::Risk,
    };
    let ids: Vec<&str> = query
        .apply(&scored)
        .iter()
        .map(|s| s.transaction.transaction_id.as_str())
        .collect();
    assert_eq!(ids, vec!["tx_c", "tx_b"]);
}

#[tokio::test]
async fn test_export_round_trip_through_file() {
    let scored = scored_fixtures().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("export.json");

    let records: Vec<ExportRecord> = scored.iter().map(ExportRecord::from).collect();
    fs::write(&path, serde_json::to_vec_pretty(&records).unwrap()).unwrap();

    let back: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    let rows = back.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["transaction_id"], "api_1");
    assert_eq!(rows[4]["score"], 100);
    assert_eq!(rows[4]["level"], "high");
}

#[test]
fn test_mock_dataset_invariants() {
    let anchor = now();
    let transactions = MockSource::new(400, 0.3, 2024).with_anchor(anchor).generate();
    let scorer = RiskScorer::new();
    let thresholds = RiskLevelThresholds::default();

    for tx in &transactions {
        let assessment = scorer.assess(tx, anchor);

        assert!(assessment.score <= 100);
        assert_eq!(
            assessment.level,
            RiskLevel::from_score(assessment.score, &thresholds)
        );
        assert!(assessment
            .factors
            .windows(2)
            .all(|pair| pair[0].impact <= pair[1].impact));
        assert_eq!(assessment.confidence, confidence_for(assessment.factors.len()));
        assert!((0.5..=0.95).contains(&assessment.confidence));
        assert_eq!(scorer.assess(tx, anchor), assessment);
    }
}

#[test]
fn test_suspicious_profiles_score_higher() {
    let anchor = now();
    let scorer = RiskScorer::new();
    let mean = |rate: f64| {
        let txs = MockSource::new(200, rate, 9).with_anchor(anchor).generate();
        let total: u64 = txs
            .iter()
            .map(|tx| u64::from(scorer.assess(tx, anchor).score))
            .sum();
        total as f64 / txs.len() as f64
    };

    assert!(mean(1.0) > mean(0.0) + 20.0);
}

#[test]
fn test_email_age_boundary() {
    let anchor = now();
    let scorer = RiskScorer::new();
    let mut tx = Transaction::new("tx_email", 1200.0);

    tx.email_first_seen = Some(anchor - Duration::days(29));
    assert_eq!(scorer.assess(&tx, anchor).score, 15);

    tx.email_first_seen = Some(anchor - Duration::days(30));
    assert_eq!(scorer.assess(&tx, anchor).score, 0);
}
