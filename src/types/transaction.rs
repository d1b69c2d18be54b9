//! Transaction data structures for e-commerce risk scoring

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Score supplied by an upstream source, replacing local rule evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalScore {
    /// Score on the 0-100 scale as supplied
    pub risk_score: f64,
    /// Free-text factor descriptions, in supplied order
    pub risk_factors: Vec<String>,
    /// Model probability, used as confidence
    pub fraud_probability: Option<f64>,
}

/// One purchase attempt, normalized for scoring.
///
/// Build from raw CSV/JSON fields with [`Transaction::from_fields`]; every
/// boolean-like field is a real `bool` and every numeric field has a safe
/// default by the time a scorer sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub timestamp: Option<DateTime<Utc>>,

    // Product
    pub product_id: String,
    pub product_name: String,
    pub category: String,
    pub sku: String,

    // Payment
    pub amount: f64,
    pub currency: String,
    pub payment_method: String,
    /// High-value electronics and similar categories
    pub is_high_risk_item: bool,
    pub card_bin: String,
    pub card_last4: String,
    pub issuer_country: String,
    pub is_3ds_passed: bool,
    pub attempt_count: u32,
    pub payment_gateway: String,

    // Identity
    pub customer_id: String,
    pub email: String,
    pub email_domain: String,
    /// `None` when missing or unparseable
    pub email_first_seen: Option<DateTime<Utc>>,
    pub phone: String,
    pub phone_verified: bool,
    pub previous_orders: u32,
    pub previous_chargebacks: u32,

    // Network
    pub ip: String,
    pub ip_country: String,
    pub ip_region: String,
    pub proxy: bool,
    pub vpn: bool,
    pub tor: bool,
    pub device_id: String,
    pub device_os: String,
    pub browser: String,
    pub is_emulator: bool,

    // Fulfillment
    pub delivery_type: String,
    pub delivery_address: String,
    pub address_verified: bool,
    pub billing_address: String,
    pub addresses_match: bool,
    pub shipping_region: String,
    pub delivery_person: String,
    pub delivery_signature_required: bool,
    pub last_mile_provider: String,

    // Behavior
    pub session_length_sec: u32,
    pub pages_viewed: u32,
    pub time_on_checkout_sec: u32,
    pub added_card_count: u32,
    /// Fraction of carts abandoned (0.0 - 1.0)
    pub cart_abandon_rate: f64,
    pub velocity_same_card_1h: u32,
    pub velocity_same_ip_24h: u32,

    // Ground truth, display only
    pub is_fraud: bool,
    pub fraud_type: String,
    pub chargeback_code: String,
    pub chargeback_date: String,

    #[serde(flatten)]
    pub external: Option<ExternalScore>,
}

impl Transaction {
    /// Create a transaction that triggers no local rule: 3DS passed,
    /// phone and address verified, no velocity, unknown email history.
    pub fn new(transaction_id: impl Into<String>, amount: f64) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            timestamp: None,
            product_id: String::new(),
            product_name: String::new(),
            category: String::new(),
            sku: String::new(),
            amount,
            currency: "RUB".to_string(),
            payment_method: String::new(),
            is_high_risk_item: false,
            card_bin: String::new(),
            card_last4: String::new(),
            issuer_country: String::new(),
            is_3ds_passed: true,
            attempt_count: 1,
            payment_gateway: String::new(),
            customer_id: String::new(),
            email: String::new(),
            email_domain: String::new(),
            email_first_seen: None,
            phone: String::new(),
            phone_verified: true,
            previous_orders: 0,
            previous_chargebacks: 0,
            ip: String::new(),
            ip_country: String::new(),
            ip_region: String::new(),
            proxy: false,
            vpn: false,
            tor: false,
            device_id: String::new(),
            device_os: String::new(),
            browser: String::new(),
            is_emulator: false,
            delivery_type: String::new(),
            delivery_address: String::new(),
            address_verified: true,
            billing_address: String::new(),
            addresses_match: true,
            shipping_region: String::new(),
            delivery_person: String::new(),
            delivery_signature_required: false,
            last_mile_provider: String::new(),
            session_length_sec: 0,
            pages_viewed: 0,
            time_on_checkout_sec: 0,
            added_card_count: 1,
            cart_abandon_rate: 0.0,
            velocity_same_card_1h: 0,
            velocity_same_ip_24h: 0,
            is_fraud: false,
            fraud_type: String::new(),
            chargeback_code: String::new(),
            chargeback_date: String::new(),
            external: None,
        }
    }

    /// Attach an upstream score, switching scoring to the precomputed path
    pub fn with_external_score(mut self, external: ExternalScore) -> Self {
        self.external = Some(external);
        self
    }

    /// Normalize a raw record (a CSV row or a JSON object) into a transaction.
    ///
    /// Never fails: unknown or malformed values fall back to defaults.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let f = Fields(fields);

        Self {
            transaction_id: f.text("transaction_id"),
            timestamp: f.datetime("timestamp"),
            product_id: f.text("product_id"),
            product_name: f.text("product_name"),
            category: f.text("category"),
            sku: f.text("sku"),
            amount: f.float("amount"),
            currency: f.text("currency"),
            payment_method: f.text("payment_method"),
            is_high_risk_item: f.flag("is_high_risk_item"),
            card_bin: f.text("card_bin"),
            card_last4: f.text("card_last4"),
            issuer_country: f.text("issuer_country"),
            is_3ds_passed: f.flag("is_3ds_passed"),
            attempt_count: f.count_or_one("attempt_count"),
            payment_gateway: f.text("payment_gateway"),
            customer_id: f.text("customer_id"),
            email: f.text("email"),
            email_domain: f.text("email_domain"),
            email_first_seen: f.datetime("email_first_seen"),
            phone: f.text("phone"),
            phone_verified: f.flag("phone_verified"),
            previous_orders: f.count("previous_orders"),
            previous_chargebacks: f.count("previous_chargebacks"),
            ip: f.text("ip"),
            ip_country: f.text("ip_country"),
            ip_region: f.text("ip_region"),
            proxy: f.flag("proxy"),
            vpn: f.flag("vpn"),
            tor: f.flag("tor"),
            device_id: f.text("device_id"),
            device_os: f.text("device_os"),
            browser: f.text("browser"),
            is_emulator: f.flag("is_emulator"),
            delivery_type: f.text("delivery_type"),
            delivery_address: f.text("delivery_address"),
            address_verified: f.flag("address_verified"),
            billing_address: f.text("billing_address"),
            addresses_match: f.flag("addresses_match"),
            shipping_region: f.text("shipping_region"),
            delivery_person: f.text("delivery_person"),
            delivery_signature_required: f.flag("delivery_signature_required"),
            last_mile_provider: f.text("last_mile_provider"),
            session_length_sec: f.count("session_length_sec"),
            pages_viewed: f.count("pages_viewed"),
            time_on_checkout_sec: f.count("time_on_checkout_sec"),
            added_card_count: f.count_or_one("added_card_count"),
            cart_abandon_rate: f.float("cart_abandon_rate"),
            velocity_same_card_1h: f.count("velocity_same_card_1h"),
            velocity_same_ip_24h: f.count("velocity_same_ip_24h"),
            is_fraud: f.flag("is_fraud"),
            fraud_type: f.text("fraud_type"),
            chargeback_code: f.text("chargeback_code"),
            chargeback_date: f.text("chargeback_date"),
            external: f.external_score(),
        }
    }

    /// Days between `email_first_seen` and `now`, floored.
    ///
    /// Negative for first-seen dates in the future; `None` when unknown.
    pub fn email_age_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.email_first_seen
            .map(|seen| (now - seen).num_seconds().div_euclid(86_400))
    }

    /// UTC calendar date of the transaction
    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date_naive())
    }
}

/// Parse the date formats seen in exported datasets
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Lenient accessors over a raw record
struct Fields<'a>(&'a Map<String, Value>);

impl Fields<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn text(&self, key: &str) -> String {
        match self.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    fn flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64() == Some(1.0),
            Some(Value::String(s)) => {
                let s = s.trim();
                s == "1" || s.eq_ignore_ascii_case("true")
            }
            _ => false,
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        let value = match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    fn float(&self, key: &str) -> f64 {
        self.number(key).unwrap_or(0.0)
    }

    /// Non-negative integer, truncating fractions; 0 when unusable
    fn count(&self, key: &str) -> u32 {
        self.number(key)
            .map(|n| n.trunc().clamp(0.0, u32::MAX as f64) as u32)
            .unwrap_or(0)
    }

    /// Like `count`, but a missing, unparseable or zero value becomes 1
    fn count_or_one(&self, key: &str) -> u32 {
        match self.count(key) {
            0 => 1,
            n => n,
        }
    }

    fn datetime(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get(key)? {
            Value::String(s) => parse_datetime(s),
            _ => None,
        }
    }

    fn external_score(&self) -> Option<ExternalScore> {
        let risk_score = self.number("risk_score")?;

        let risk_factors = match self.get("risk_factors") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => s
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Some(ExternalScore {
            risk_score,
            risk_factors,
            fraud_probability: self.number("fraud_probability"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_flag_normalization() {
        let tx = Transaction::from_fields(&record(json!({
            "transaction_id": "tx_1",
            "vpn": "True",
            "proxy": "1",
            "tor": true,
            "is_emulator": "no",
            "phone_verified": "",
            "address_verified": "TRUE",
            "addresses_match": 1,
        })));

        assert!(tx.vpn);
        assert!(tx.proxy);
        assert!(tx.tor);
        assert!(!tx.is_emulator);
        assert!(!tx.phone_verified);
        assert!(tx.address_verified);
        assert!(tx.addresses_match);
        assert!(!tx.is_3ds_passed);
    }

    #[test]
    fn test_numeric_defaults() {
        let tx = Transaction::from_fields(&record(json!({
            "transaction_id": "tx_2",
            "amount": "not a number",
            "previous_chargebacks": "2",
            "velocity_same_card_1h": "3.9",
            "velocity_same_ip_24h": -4,
            "cart_abandon_rate": "0.45",
        })));

        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.attempt_count, 1);
        assert_eq!(tx.added_card_count, 1);
        assert_eq!(tx.previous_chargebacks, 2);
        assert_eq!(tx.velocity_same_card_1h, 3);
        assert_eq!(tx.velocity_same_ip_24h, 0);
        assert!((tx.cart_abandon_rate - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_external_score_detection() {
        let tx = Transaction::from_fields(&record(json!({
            "transaction_id": "tx_3",
            "risk_score": 42,
            "risk_factors": ["VPN detected", 7, "Phone not verified"],
        })));

        let external = tx.external.expect("external score");
        assert_eq!(external.risk_score, 42.0);
        assert_eq!(external.risk_factors, vec!["VPN detected", "Phone not verified"]);
        assert_eq!(external.fraud_probability, None);

        let tx = Transaction::from_fields(&record(json!({
            "transaction_id": "tx_4",
            "risk_score": null,
            "fraud_probability": 0.9,
        })));
        assert!(tx.external.is_none());
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();

        assert_eq!(parse_datetime("2024-03-05T14:30:00Z"), Some(expected));
        assert_eq!(parse_datetime("2024-03-05T17:30:00+03:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-05 14:30:00"), Some(expected));
        assert_eq!(parse_datetime("2024-03-05T14:30:00.000"), Some(expected));
        assert_eq!(
            parse_datetime("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_datetime("yesterday"), None);
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn test_email_age_days() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let mut tx = Transaction::new("tx_5", 100.0);

        assert_eq!(tx.email_age_days(now), None);

        tx.email_first_seen = Some(now - Duration::hours(29 * 24 + 23));
        assert_eq!(tx.email_age_days(now), Some(29));

        tx.email_first_seen = Some(now + Duration::hours(12));
        assert_eq!(tx.email_age_days(now), Some(-1));
    }

    #[test]
    fn test_transaction_serialization() {
        let tx = Transaction::new("tx_6", 2500.0).with_external_score(ExternalScore {
            risk_score: 42.0,
            risk_factors: vec!["VPN detected".to_string()],
            fraud_probability: Some(0.7),
        });

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["transaction_id"], "tx_6");
        assert_eq!(json["risk_score"], 42.0);

        // Serialized output normalizes back to the same record
        let back = Transaction::from_fields(json.as_object().unwrap());
        assert_eq!(back, tx);
    }
}
