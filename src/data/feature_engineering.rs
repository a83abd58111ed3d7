//! Per-customer aggregates derived from the raw transaction table.
//!
//! Recency, Frequency and Monetary (RFM) plus the six model features.

use crate::error::{AppError, Result};
use crate::models::{CustomerFeatures, FEATURE_NAMES};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

const FINANCIAL_SERVICES: &str = "financial_services";
const AIRTIME: &str = "airtime";

/// Transactions starting before this hour count as night activity
const NIGHT_END_HOUR: u32 = 6;

/// One row of the raw transaction table
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    #[serde(rename = "TransactionId")]
    pub transaction_id: String,

    #[serde(rename = "CustomerId")]
    pub customer_id: String,

    #[serde(rename = "Amount")]
    pub amount: f64,

    #[serde(rename = "TransactionStartTime")]
    pub transaction_start_time: String,

    #[serde(rename = "ProductCategory")]
    pub product_category: String,
}

/// Engineered features for one customer
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerFeatureRow {
    pub customer_id: String,

    /// Days between the latest transaction overall and the customer's latest
    pub recency: i64,

    /// Sum of transaction amounts
    pub monetary: f64,

    pub features: CustomerFeatures,
}

/// Parse RFC 3339 or `YYYY-MM-DD HH:MM:SS` (taken as UTC)
fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc).naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

/// Read the raw transaction table
pub fn read_transactions(path: &Path) -> Result<Vec<Transaction>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Dataset(format!("Failed to open {}: {}", path.display(), e)))?;

    let transactions = reader
        .deserialize()
        .collect::<std::result::Result<Vec<Transaction>, csv::Error>>()?;

    info!(path = %path.display(), rows = transactions.len(), "Loaded transactions");
    Ok(transactions)
}

#[derive(Default)]
struct CustomerAccumulator {
    count: usize,
    total: f64,
    latest: Option<NaiveDateTime>,
    night: usize,
    financial_services: usize,
    airtime: usize,
}

/// Aggregate transactions per customer, sorted by customer id
pub fn engineer_features(transactions: &[Transaction]) -> Result<Vec<CustomerFeatureRow>> {
    let mut customers: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
    let mut dataset_latest: Option<NaiveDateTime> = None;

    for tx in transactions {
        let started = parse_timestamp(&tx.transaction_start_time).ok_or_else(|| {
            AppError::Dataset(format!(
                "Transaction {}: unrecognized TransactionStartTime '{}'",
                tx.transaction_id, tx.transaction_start_time
            ))
        })?;

        dataset_latest = dataset_latest.max(Some(started));

        let acc = customers.entry(tx.customer_id.as_str()).or_default();
        acc.count += 1;
        acc.total += tx.amount;
        acc.latest = acc.latest.max(Some(started));
        if started.hour() < NIGHT_END_HOUR {
            acc.night += 1;
        }
        match tx.product_category.trim() {
            FINANCIAL_SERVICES => acc.financial_services += 1,
            AIRTIME => acc.airtime += 1,
            _ => {}
        }
    }

    let rows: Vec<CustomerFeatureRow> = customers
        .into_iter()
        .map(|(customer_id, acc)| {
            let frequency = acc.count as f64;
            let recency = match (dataset_latest, acc.latest) {
                (Some(end), Some(latest)) => (end - latest).num_days(),
                _ => 0,
            };

            CustomerFeatureRow {
                customer_id: customer_id.to_string(),
                recency,
                monetary: acc.total,
                features: CustomerFeatures {
                    log_monetary: acc.total.abs().ln_1p(),
                    frequency,
                    log_avg_transaction_amount: (acc.total / frequency).abs().ln_1p(),
                    night_ratio: acc.night as f64 / frequency,
                    freq_financial_services: acc.financial_services as f64,
                    freq_airtime: acc.airtime as f64,
                },
            }
        })
        .collect();

    info!(
        transactions = transactions.len(),
        customers = rows.len(),
        "Engineered customer features"
    );

    Ok(rows)
}

/// Write the feature table as CSV: id, Recency, Monetary, then the model features
pub fn write_feature_table(path: &Path, rows: &[CustomerFeatureRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["CustomerId", "Recency", "Monetary"];
    header.extend(FEATURE_NAMES);
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.customer_id.clone(),
            row.recency.to_string(),
            row.monetary.to_string(),
        ];
        record.extend(row.features.to_row().iter().map(|v| v.to_string()));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "Wrote feature table");
    Ok(())
}
