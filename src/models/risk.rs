use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Predicted credit risk category
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// All levels in output order
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    /// Map a training label (RiskCluster value) to its level
    pub fn from_label(label: usize) -> Option<Self> {
        match label {
            0 => Some(RiskLevel::Low),
            1 => Some(RiskLevel::Medium),
            2 => Some(RiskLevel::High),
            _ => None,
        }
    }

    /// Training label for this level
    pub fn label(&self) -> usize {
        match self {
            RiskLevel::Low => 0,
            RiskLevel::Medium => 1,
            RiskLevel::High => 2,
        }
    }

    /// Column of this level in a Low/Medium/High probability row
    pub fn index(&self) -> usize {
        self.label()
    }
}

/// Class probabilities for one customer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    #[serde(rename = "Low")]
    pub low: f64,

    #[serde(rename = "Medium")]
    pub medium: f64,

    #[serde(rename = "High")]
    pub high: f64,
}

impl RiskPrediction {
    /// Build from a Low/Medium/High probability row
    pub fn from_probabilities(probabilities: [f64; 3]) -> Self {
        Self {
            low: probabilities[0],
            medium: probabilities[1],
            high: probabilities[2],
        }
    }

    pub fn probability(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Low => self.low,
            RiskLevel::Medium => self.medium,
            RiskLevel::High => self.high,
        }
    }

    /// Sum of the three probabilities
    pub fn total(&self) -> f64 {
        self.low + self.medium + self.high
    }

    /// Level with the highest probability (ties go to the lower level)
    pub fn most_likely(&self) -> RiskLevel {
        RiskLevel::ALL
            .into_iter()
            .fold(RiskLevel::Low, |best, level| {
                if self.probability(level) > self.probability(best) {
                    level
                } else {
                    best
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_label_mapping_round_trips() {
        for level in RiskLevel::iter() {
            assert_eq!(RiskLevel::from_label(level.label()), Some(level));
        }
        assert_eq!(RiskLevel::from_label(3), None);
    }

    #[test]
    fn test_display_and_parse() {
        assert_eq!(RiskLevel::Medium.to_string(), "Medium");
        assert_eq!(RiskLevel::from_str("High").unwrap(), RiskLevel::High);
        assert!(RiskLevel::from_str("Severe").is_err());
    }

    #[test]
    fn test_prediction_wire_format() {
        let prediction = RiskPrediction::from_probabilities([0.2, 0.5, 0.3]);
        let json = serde_json::to_value(prediction).unwrap();

        assert_eq!(json["Low"], 0.2);
        assert_eq!(json["Medium"], 0.5);
        assert_eq!(json["High"], 0.3);
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_most_likely() {
        let prediction = RiskPrediction::from_probabilities([0.2, 0.5, 0.3]);
        assert_eq!(prediction.most_likely(), RiskLevel::Medium);
        assert!((prediction.total() - 1.0).abs() < 1e-12);

        let tie = RiskPrediction::from_probabilities([0.4, 0.4, 0.2]);
        assert_eq!(tie.most_likely(), RiskLevel::Low);
    }
}
