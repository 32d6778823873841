use serde::Serialize;
use shared::{SUSPICIOUS_LABEL, UltrasoundClass};
use std::fmt;

use super::Prediction;

pub const DEFAULT_THRESHOLD: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FinalLabel {
    Raw(UltrasoundClass),
    Suspicious,
}

impl fmt::Display for FinalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalLabel::Raw(class) => write!(f, "{class}"),
            FinalLabel::Suspicious => f.write_str(SUSPICIOUS_LABEL),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub label: FinalLabel,
    pub referral: bool,
}

/// Overrides the raw label with "Suspicious" when the malignant probability
/// strictly exceeds the threshold, whatever class was predicted.
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    threshold: f64,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl DecisionPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, prediction: &Prediction) -> Decision {
        if prediction.malignant_probability() > self.threshold {
            Decision {
                label: FinalLabel::Suspicious,
                referral: true,
            }
        } else {
            Decision {
                label: FinalLabel::Raw(prediction.class),
                referral: false,
            }
        }
    }
}
