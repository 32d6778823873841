//! Locates the feature extractor weights, downloading them into the local
//! cache on first use when a repository URL is configured.

use std::path::{Path, PathBuf};
use url::Url;

use crate::config::ModelConfig;
use crate::error::PipelineError;

pub fn cache_path(config: &ModelConfig) -> PathBuf {
    config.weights_dir.join(format!("{}.ot", config.architecture))
}

pub async fn resolve_weights(config: &ModelConfig) -> Result<PathBuf, PipelineError> {
    if let Some(path) = &config.weights_path {
        if path.is_file() {
            return Ok(path.clone());
        }
        return Err(PipelineError::ModelLoad(format!(
            "weights file {} does not exist",
            path.display()
        )));
    }

    let cached = cache_path(config);
    if cached.is_file() {
        log::info!("Using cached {} weights at {}", config.architecture, cached.display());
        return Ok(cached);
    }

    let Some(raw_url) = &config.weights_url else {
        return Err(PipelineError::ModelLoad(format!(
            "no cached weights at {} and no weights_url configured",
            cached.display()
        )));
    };
    let url = Url::parse(raw_url)
        .map_err(|e| PipelineError::ModelLoad(format!("invalid weights_url '{raw_url}': {e}")))?;

    download(&url, &cached).await?;
    Ok(cached)
}

async fn download(url: &Url, destination: &Path) -> Result<(), PipelineError> {
    log::info!("Downloading weights from {url} to {}", destination.display());
    let load_err = |e: reqwest::Error| PipelineError::ModelLoad(format!("weights download failed: {e}"));

    let bytes = reqwest::get(url.clone())
        .await
        .map_err(load_err)?
        .error_for_status()
        .map_err(load_err)?
        .bytes()
        .await
        .map_err(load_err)?;

    let io_err = |e: std::io::Error| {
        PipelineError::ModelLoad(format!("failed to write {}: {e}", destination.display()))
    };
    if let Some(dir) = destination.parent() {
        tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
    }
    let partial = destination.with_extension("ot.part");
    tokio::fs::write(&partial, &bytes).await.map_err(io_err)?;
    tokio::fs::rename(&partial, destination).await.map_err(io_err)?;

    log::info!("Stored {} bytes of weights", bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> ModelConfig {
        ModelConfig {
            weights_dir: dir.path().to_path_buf(),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn cache_path_is_keyed_by_architecture() {
        let config = ModelConfig {
            weights_dir: PathBuf::from("/var/cache/weights"),
            architecture: "resnet50".to_string(),
            ..ModelConfig::default()
        };
        assert_eq!(cache_path(&config), PathBuf::from("/var/cache/weights/resnet50.ot"));
    }

    #[actix_web::test]
    async fn prefers_cached_file() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::write(cache_path(&config), b"weights").unwrap();

        let resolved = resolve_weights(&config).await.unwrap();
        assert_eq!(resolved, cache_path(&config));
    }

    #[actix_web::test]
    async fn explicit_path_overrides_cache() {
        let dir = TempDir::new().unwrap();
        let explicit = dir.path().join("custom.safetensors");
        std::fs::write(&explicit, b"weights").unwrap();
        let config = ModelConfig {
            weights_path: Some(explicit.clone()),
            ..config_in(&dir)
        };

        assert_eq!(resolve_weights(&config).await.unwrap(), explicit);
    }

    #[actix_web::test]
    async fn missing_explicit_path_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let config = ModelConfig {
            weights_path: Some(dir.path().join("absent.ot")),
            ..config_in(&dir)
        };

        let err = resolve_weights(&config).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad(_)));
    }

    #[actix_web::test]
    async fn no_cache_and_no_url_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let err = resolve_weights(&config_in(&dir)).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad(msg) if msg.contains("no weights_url")));
    }

    #[actix_web::test]
    async fn malformed_url_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let config = ModelConfig {
            weights_url: Some("not a url".to_string()),
            ..config_in(&dir)
        };

        let err = resolve_weights(&config).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad(msg) if msg.contains("invalid weights_url")));
    }
}
