//! Mock transaction generator for demos and tests.
//!
//! Output is deterministic for a given seed and anchor time.

use crate::error::DataError;
use crate::loader::TransactionSource;
use crate::types::transaction::Transaction;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

const CATEGORIES: &[(&str, &str, bool)] = &[
    ("Electronics", "PlayStation 5", true),
    ("Electronics", "VR Headset", true),
    ("Electronics", "Smartphone", true),
    ("Home", "Coffee Machine", false),
    ("Clothing", "Winter Jacket", false),
    ("Books", "Cookbook", false),
    ("Beauty", "Perfume Set", false),
];
const GATEWAYS: &[&str] = &["Stripe", "PayPal", "CloudPayments", "YooKassa"];
const DEVICE_OS: &[&str] = &["Android", "iOS", "Windows", "macOS", "Linux"];
const BROWSERS: &[&str] = &["Chrome", "Safari", "Firefox", "Edge"];
const REGIONS: &[&str] = &[
    "Moscow",
    "Saint Petersburg",
    "Novosibirsk",
    "Kazan",
    "Yekaterinburg",
];
const EMAIL_DOMAINS: &[&str] = &["gmail.com", "yandex.ru", "mail.ru", "outlook.com"];
const SUSPICIOUS_EMAIL_DOMAINS: &[&str] = &["tempmail.com", "guerrillamail.com", "gmail.com"];
const FRAUD_TYPES: &[&str] = &[
    "stolen_card",
    "friendly_fraud",
    "velocity_attack",
    "account_takeover",
];

/// Seeded source of synthetic transactions
pub struct MockSource {
    count: usize,
    fraud_rate: f64,
    seed: u64,
    anchor: DateTime<Utc>,
}

impl MockSource {
    /// Generate `count` transactions, a `fraud_rate` share of them suspicious,
    /// spread over the 30 days before now
    pub fn new(count: usize, fraud_rate: f64, seed: u64) -> Self {
        Self {
            count,
            fraud_rate: if fraud_rate.is_nan() { 0.0 } else { fraud_rate.clamp(0.0, 1.0) },
            seed,
            anchor: Utc::now(),
        }
    }

    /// Fix the time the generated history ends at
    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = anchor;
        self
    }

    /// Generate the full set
    pub fn generate(&self) -> Vec<Transaction> {
        let mut generator = TransactionGenerator::new(self.seed, self.anchor);
        (0..self.count)
            .map(|_| {
                if generator.rng.gen_bool(self.fraud_rate) {
                    generator.generate_suspicious()
                } else {
                    generator.generate_legitimate()
                }
            })
            .collect()
    }
}

impl TransactionSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn load(&self) -> Result<Vec<Transaction>, DataError> {
        Ok(self.generate())
    }
}

struct TransactionGenerator {
    rng: StdRng,
    anchor: DateTime<Utc>,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new(seed: u64, anchor: DateTime<Utc>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            anchor,
            transaction_counter: 0,
        }
    }

    /// Fields shared by both profiles
    fn base(&mut self) -> Transaction {
        self.transaction_counter += 1;

        let (category, product, high_risk) = *self.random_choice(CATEGORIES);
        let mut tx = Transaction::new(
            format!("TXN-{:08}", self.transaction_counter),
            self.rng.gen_range(500.0..20_000.0_f64).round(),
        );

        tx.timestamp = Some(self.anchor - Duration::minutes(self.rng.gen_range(0..30 * 24 * 60)));
        tx.product_id = format!("P{:05}", self.rng.gen_range(1..100_000));
        tx.product_name = product.to_string();
        tx.category = category.to_string();
        tx.sku = format!("SKU-{:06}", self.rng.gen_range(1..1_000_000));
        tx.is_high_risk_item = high_risk;
        tx.payment_method = "card".to_string();
        tx.card_bin = format!("{}", self.rng.gen_range(400_000..560_000));
        tx.card_last4 = format!("{:04}", self.rng.gen_range(0..10_000));
        tx.issuer_country = "RU".to_string();
        tx.payment_gateway = self.random_choice(GATEWAYS).to_string();

        let customer = self.rng.gen_range(1..50_000);
        let domain = self.random_choice(EMAIL_DOMAINS);
        tx.customer_id = format!("CUST-{:06}", customer);
        tx.email = format!("user{}@{}", customer, domain);
        tx.email_domain = domain.to_string();
        tx.email_first_seen = Some(self.anchor - Duration::days(self.rng.gen_range(90..2000)));
        tx.phone = format!("+7{:010}", self.rng.gen_range(9_000_000_000_u64..9_999_999_999));
        tx.previous_orders = self.rng.gen_range(0..40);

        tx.ip = format!(
            "{}.{}.{}.{}",
            self.rng.gen_range(1..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(1..255)
        );
        tx.ip_country = "RU".to_string();
        tx.ip_region = self.random_choice(REGIONS).to_string();
        tx.device_id = Uuid::from_u128(self.rng.gen()).to_string();
        tx.device_os = self.random_choice(DEVICE_OS).to_string();
        tx.browser = self.random_choice(BROWSERS).to_string();

        tx.delivery_type = "courier".to_string();
        tx.shipping_region = tx.ip_region.clone();
        tx.delivery_address = format!("{}, street {}", tx.ip_region, self.rng.gen_range(1..200));
        tx.billing_address = tx.delivery_address.clone();
        tx.last_mile_provider = "CDEK".to_string();

        tx.session_length_sec = self.rng.gen_range(60..1800);
        tx.pages_viewed = self.rng.gen_range(2..30);
        tx.time_on_checkout_sec = self.rng.gen_range(20..600);
        tx
    }

    /// Generate a transaction with a mostly clean profile
    fn generate_legitimate(&mut self) -> Transaction {
        let mut tx = self.base();

        tx.is_3ds_passed = self.rng.gen_bool(0.95);
        tx.attempt_count = if self.rng.gen_bool(0.9) { 1 } else { 2 };
        tx.phone_verified = self.rng.gen_bool(0.9);
        tx.address_verified = self.rng.gen_bool(0.9);
        tx.vpn = self.rng.gen_bool(0.03);
        tx.cart_abandon_rate = self.rng.gen_range(0.0..0.35);
        tx.velocity_same_card_1h = self.rng.gen_range(0..2);
        tx.velocity_same_ip_24h = self.rng.gen_range(0..4);
        tx
    }

    /// Generate a suspicious/fraudulent transaction
    fn generate_suspicious(&mut self) -> Transaction {
        let mut tx = self.base();
        let domain = self.random_choice(SUSPICIOUS_EMAIL_DOMAINS);

        tx.amount = self.rng.gen_range(20_000.0..150_000.0_f64).round();
        tx.is_3ds_passed = self.rng.gen_bool(0.3);
        tx.attempt_count = self.rng.gen_range(1..6);
        tx.email = format!("{}@{}", Uuid::from_u128(self.rng.gen()).simple(), domain);
        tx.email_domain = domain.to_string();
        tx.email_first_seen = Some(self.anchor - Duration::days(self.rng.gen_range(0..45)));
        tx.phone_verified = self.rng.gen_bool(0.3);
        tx.previous_orders = self.rng.gen_range(0..3);
        tx.previous_chargebacks = self.rng.gen_range(0..3);
        tx.vpn = self.rng.gen_bool(0.5);
        tx.proxy = self.rng.gen_bool(0.3);
        tx.tor = self.rng.gen_bool(0.1);
        tx.is_emulator = self.rng.gen_bool(0.25);
        tx.addresses_match = self.rng.gen_bool(0.3);
        if !tx.addresses_match {
            tx.billing_address = format!(
                "{}, avenue {}",
                self.random_choice(REGIONS),
                self.rng.gen_range(1..200)
            );
        }
        tx.address_verified = self.rng.gen_bool(0.4);
        tx.added_card_count = self.rng.gen_range(1..6);
        tx.cart_abandon_rate = self.rng.gen_range(0.2..0.95);
        tx.velocity_same_card_1h = self.rng.gen_range(0..8);
        tx.velocity_same_ip_24h = self.rng.gen_range(2..20);
        tx.is_fraud = true;
        tx.fraud_type = self.random_choice(FRAUD_TYPES).to_string();
        tx
    }

    fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.rng.gen_range(0..choices.len())]
    }
}
