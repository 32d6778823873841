use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// Label shown instead of the raw class when the malignant score crosses the threshold.
pub const SUSPICIOUS_LABEL: &str = "Suspicious";

/// Session-storage key the frontend uses for the biopsy referral flag.
pub const REFERRAL_STORAGE_KEY: &str = "biopsy";

/// Ultrasound tissue classes, in the order the classifier emits them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UltrasoundClass {
    Benign,
    Malignant,
    Normal,
}

impl UltrasoundClass {
    pub const COUNT: usize = 3;

    pub fn from_index(index: usize) -> Option<Self> {
        Self::iter().nth(index)
    }

    pub fn index(self) -> usize {
        match self {
            UltrasoundClass::Benign => 0,
            UltrasoundClass::Malignant => 1,
            UltrasoundClass::Normal => 2,
        }
    }

    pub fn labels() -> Vec<String> {
        Self::iter().map(|class| class.to_string()).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InferenceResponse {
    pub id: Uuid,
    pub image_hash: String,
    pub predicted_class: UltrasoundClass,
    pub class_labels: Vec<String>,
    pub predictions: Vec<f64>,
    pub confidence: f64,
    pub malignant_probability: f64,
    pub final_label: String,
    pub referral: bool,
    pub threshold: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}
