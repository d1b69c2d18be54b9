//! Transaction data sources.
//!
//! Every source produces normalized [`Transaction`]s; the scorer never
//! depends on which source a record came from.

use crate::error::DataError;
use crate::types::transaction::Transaction;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Provider of transaction records
pub trait TransactionSource: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &str;

    /// Load and normalize every record
    fn load(&self) -> Result<Vec<Transaction>, DataError>;
}

/// CSV export with a header row
pub struct CsvFileSource {
    path: PathBuf,
    name: String,
}

impl CsvFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("csv:{}", path.display()),
            path,
        }
    }
}

impl TransactionSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<Transaction>, DataError> {
        let file = File::open(&self.path).map_err(|source| DataError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_csv(file, &self.path)
    }
}

/// JSON array of transaction objects, optionally carrying upstream scores
pub struct JsonFileSource {
    path: PathBuf,
    name: String,
}

impl JsonFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("json:{}", path.display()),
            path,
        }
    }
}

impl TransactionSource for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<Vec<Transaction>, DataError> {
        let bytes = std::fs::read(&self.path).map_err(|source| DataError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_json(&bytes, &self.path)
    }
}

/// Parse CSV rows into transactions, dropping rows without an id
pub fn parse_csv<R: Read>(reader: R, path: &Path) -> Result<Vec<Transaction>, DataError> {
    let csv_error = |source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = rdr.headers().map_err(csv_error)?.clone();

    let mut transactions = Vec::new();
    let mut skipped = 0usize;

    for (row, record) in rdr.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            // The reader cannot make progress past an I/O failure
            Err(e) if e.is_io_error() => return Err(csv_error(e)),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    row = row + 1,
                    error = %e,
                    "Skipping malformed CSV row"
                );
                skipped += 1;
                continue;
            }
        };
        let fields: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();

        let tx = Transaction::from_fields(&fields);
        if tx.transaction_id.is_empty() {
            skipped += 1;
            continue;
        }
        transactions.push(tx);
    }

    debug!(
        path = %path.display(),
        loaded = transactions.len(),
        skipped = skipped,
        "Parsed CSV transactions"
    );

    Ok(transactions)
}

/// Parse a JSON array into transactions, dropping entries without an id
pub fn parse_json(bytes: &[u8], path: &Path) -> Result<Vec<Transaction>, DataError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|source| DataError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(DataError::Shape {
                path: path.to_path_buf(),
                reason: format!("expected an array of transactions, found {}", json_kind(&other)),
            })
        }
    };

    let transactions: Vec<Transaction> = items
        .iter()
        .filter_map(Value::as_object)
        .map(Transaction::from_fields)
        .filter(|tx| !tx.transaction_id.is_empty())
        .collect();

    debug!(
        path = %path.display(),
        loaded = transactions.len(),
        entries = items.len(),
        "Parsed JSON transactions"
    );

    Ok(transactions)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Load every source concurrently and concatenate in the given order.
///
/// A failing source is logged and contributes nothing.
pub async fn load_all(sources: Vec<Arc<dyn TransactionSource>>) -> Vec<Transaction> {
    let tasks = sources.into_iter().map(|source| {
        tokio::task::spawn_blocking(move || {
            let result = source.load();
            (source.name().to_string(), result)
        })
    });

    let mut transactions = Vec::new();

    for joined in join_all(tasks).await {
        match joined {
            Ok((name, Ok(loaded))) => {
                info!(source = %name, count = loaded.len(), "Loaded transactions");
                transactions.extend(loaded);
            }
            Ok((name, Err(e))) => {
                warn!(source = %name, error = %e, "Failed to load source, skipping");
            }
            Err(e) => {
                error!(error = %e, "Source task failed");
            }
        }
    }

    transactions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CSV: &str = "\
transaction_id,timestamp,amount,is_3ds_passed,vpn,attempt_count,email_first_seen,ip_region
tx_001,2024-05-01 10:00:00,1500.50,True,False,1,2019-01-01,Moscow
,2024-05-01 11:00:00,20,True,False,1,2019-01-01,Moscow
tx_002,2024-05-02 09:30:00,oops,0,1,,garbage,Kazan
";

    #[test]
    fn test_parse_csv() {
        let txs = parse_csv(CSV.as_bytes(), Path::new("inline.csv")).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].transaction_id, "tx_001");
        assert_eq!(txs[0].amount, 1500.5);
        assert!(txs[0].is_3ds_passed);
        assert!(!txs[0].vpn);
        assert!(txs[0].email_first_seen.is_some());

        assert_eq!(txs[1].amount, 0.0);
        assert!(!txs[1].is_3ds_passed);
        assert!(txs[1].vpn);
        assert_eq!(txs[1].attempt_count, 1);
        assert!(txs[1].email_first_seen.is_none());
        assert_eq!(txs[1].ip_region, "Kazan");
    }

    #[test]
    fn test_parse_csv_skips_corrupt_row() {
        let mut bytes = b"transaction_id,amount\ntx_1,10\ntx_2,".to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(b"\ntx_3,30\n");

        let txs = parse_csv(bytes.as_slice(), Path::new("corrupt.csv")).unwrap();
        let ids: Vec<&str> = txs.iter().map(|t| t.transaction_id.as_str()).collect();

        assert_eq!(ids, vec!["tx_1", "tx_3"]);
        assert_eq!(txs[1].amount, 30.0);
    }

    #[test]
    fn test_parse_json() {
        let json = br#"[
            {"transaction_id": "api_1", "amount": 99.0, "risk_score": 87, "risk_factors": ["Tor exit node"], "fraud_probability": 0.91},
            {"transaction_id": "api_2", "vpn": true},
            {"amount": 5},
            "junk"
        ]"#;

        let txs = parse_json(json, Path::new("inline.json")).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].external.as_ref().map(|e| e.risk_score), Some(87.0));
        assert!(txs[1].external.is_none());
        assert!(txs[1].vpn);
    }

    #[test]
    fn test_parse_json_rejects_non_array() {
        let err = parse_json(br#"{"transaction_id": "x"}"#, Path::new("obj.json")).unwrap_err();
        assert!(matches!(err, DataError::Shape { .. }));

        let err = parse_json(b"[1, 2", Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, DataError::Json { .. }));
    }

    #[test]
    fn test_csv_source_missing_file() {
        let source = CsvFileSource::new("/definitely/not/here.csv");
        assert!(matches!(source.load(), Err(DataError::Io { .. })));
    }

    #[tokio::test]
    async fn test_load_all_degrades_on_failure() {
        let mut csv_file = NamedTempFile::new().unwrap();
        csv_file.write_all(CSV.as_bytes()).unwrap();

        let mut json_file = NamedTempFile::new().unwrap();
        json_file
            .write_all(br#"[{"transaction_id": "api_1", "risk_score": 12}]"#)
            .unwrap();

        let sources: Vec<Arc<dyn TransactionSource>> = vec![
            Arc::new(JsonFileSource::new(json_file.path())),
            Arc::new(JsonFileSource::new("/missing/api_transactions.json")),
            Arc::new(CsvFileSource::new(csv_file.path())),
        ];

        let txs = load_all(sources).await;
        let ids: Vec<&str> = txs.iter().map(|t| t.transaction_id.as_str()).collect();

        assert_eq!(ids, vec!["api_1", "tx_001", "tx_002"]);
    }

    #[tokio::test]
    async fn test_load_all_empty_when_everything_fails() {
        let sources: Vec<Arc<dyn TransactionSource>> =
            vec![Arc::new(CsvFileSource::new("/missing/data.csv"))];
        assert!(load_all(sources).await.is_empty());
    }
}
