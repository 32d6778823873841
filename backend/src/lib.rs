//! Breast ultrasound checkup service: classifies uploaded ultrasound images as
//! benign, malignant or normal and flags suspicious results for biopsy referral.

pub mod config;
pub mod error;
pub mod inference;
pub mod routes;

pub use config::AppConfig;
pub use error::{ConfigError, PipelineError};
pub use inference::{Assessment, Pipeline};
