use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Number of model input features
pub const N_FEATURES: usize = 6;

/// Feature columns in the order the scaler and classifier were fit on.
///
/// Every path that turns records into a matrix goes through this list.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "LogMonetary",
    "Frequency",
    "LogAvgTransactionAmount",
    "NightRatio",
    "Freq_FinancialServices",
    "Freq_Airtime",
];

/// Transaction-derived features for one customer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    #[serde(rename = "LogMonetary")]
    pub log_monetary: f64,

    #[serde(rename = "Frequency")]
    pub frequency: f64,

    #[serde(rename = "LogAvgTransactionAmount")]
    pub log_avg_transaction_amount: f64,

    #[serde(rename = "NightRatio")]
    pub night_ratio: f64,

    #[serde(rename = "Freq_FinancialServices")]
    pub freq_financial_services: f64,

    #[serde(rename = "Freq_Airtime")]
    pub freq_airtime: f64,
}

impl CustomerFeatures {
    /// Values in `FEATURE_NAMES` order
    pub fn to_row(&self) -> [f64; N_FEATURES] {
        [
            self.log_monetary,
            self.frequency,
            self.log_avg_transaction_amount,
            self.night_ratio,
            self.freq_financial_services,
            self.freq_airtime,
        ]
    }

    /// Inverse of [`to_row`](Self::to_row)
    pub fn from_row(row: [f64; N_FEATURES]) -> Self {
        Self {
            log_monetary: row[0],
            frequency: row[1],
            log_avg_transaction_amount: row[2],
            night_ratio: row[3],
            freq_financial_services: row[4],
            freq_airtime: row[5],
        }
    }

    /// Stack records into an (n × 6) matrix, preserving input order
    pub fn to_matrix(records: &[CustomerFeatures]) -> Array2<f64> {
        let mut matrix = Array2::zeros((records.len(), N_FEATURES));
        for (mut row, record) in matrix.rows_mut().into_iter().zip(records) {
            for (cell, value) in row.iter_mut().zip(record.to_row()) {
                *cell = value;
            }
        }
        matrix
    }
}

/// Check that `names` matches `FEATURE_NAMES` exactly, in order
pub fn matches_feature_order<S: AsRef<str>>(names: &[S]) -> bool {
    names.len() == N_FEATURES
        && names
            .iter()
            .zip(FEATURE_NAMES.iter())
            .all(|(a, b)| a.as_ref() == *b)
}

/// Owned copy of `FEATURE_NAMES`
pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}
