use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::inference::features::{ARCHITECTURE, INPUT_NORMALIZATION};
use crate::inference::preprocess::{Normalization, resize_filter};

const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: f32,
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub image: ImageConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_dir: PathBuf,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub architecture: String,
    pub weights_dir: PathBuf,
    pub weights_path: Option<PathBuf>,
    pub weights_url: Option<String>,
    pub classifier_path: PathBuf,
    pub embedding_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub size: [u32; 2],
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub resize_method: String,
    pub normalization: Normalization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub threshold: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1.0,
            server: ServerConfig::default(),
            models: ModelConfig::default(),
            image: ImageConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            frontend_dir: PathBuf::from("frontend/dist"),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architecture: ARCHITECTURE.to_string(),
            weights_dir: PathBuf::from("models"),
            weights_path: None,
            weights_url: None,
            classifier_path: PathBuf::from("models/ultrasound_mlp.json"),
            embedding_size: 2048,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: [224, 224],
            preprocessing: PreprocessingConfig::default(),
        }
    }
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            resize_method: "nearest".to_string(),
            normalization: INPUT_NORMALIZATION,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self { threshold: 0.2 }
    }
}

impl AppConfig {
    /// Loads the config from `APP_CONFIG` (or `config/app.yaml`), applies
    /// environment overrides and validates the result. A missing file yields
    /// the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file_or_default(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(dir) = lookup("FRONTEND_DIR") {
            self.server.frontend_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("CLASSIFIER_PATH") {
            self.models.classifier_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("WEIGHTS_PATH") {
            self.models.weights_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("WEIGHTS_URL") {
            self.models.weights_url = Some(url);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.policy.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                field: "policy.threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        if self.image.size.contains(&0) {
            return Err(ConfigError::Invalid {
                field: "image.size",
                reason: format!("{:?} has a zero dimension", self.image.size),
            });
        }
        if resize_filter(&self.image.preprocessing.resize_method).is_none() {
            return Err(ConfigError::Invalid {
                field: "image.preprocessing.resize_method",
                reason: format!("unknown method '{}'", self.image.preprocessing.resize_method),
            });
        }
        if self.models.architecture != ARCHITECTURE {
            return Err(ConfigError::Invalid {
                field: "models.architecture",
                reason: format!(
                    "'{}' is not supported, the feature extractor is {ARCHITECTURE}",
                    self.models.architecture
                ),
            });
        }
        if self.image.preprocessing.normalization != INPUT_NORMALIZATION {
            return Err(ConfigError::Invalid {
                field: "image.preprocessing.normalization",
                reason: format!(
                    "{ARCHITECTURE} weights expect {INPUT_NORMALIZATION:?} normalization, got {:?}",
                    self.image.preprocessing.normalization
                ),
            });
        }
        if self.models.embedding_size == 0 {
            return Err(ConfigError::Invalid {
                field: "models.embedding_size",
                reason: "must be positive".to_string(),
            });
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "server.max_upload_bytes",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
