use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use log::{error, info};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::inference::Pipeline;

#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: i64,
    embedding_size: usize,
    threshold: f64,
}

pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/inference").route(web::post().to(handle_inference)))
        .service(web::resource("/api/health").route(web::get().to(health)));
}

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: PathBuf) {
    configure_api(cfg);
    cfg.service(Files::new("/", frontend_dir).index_file("index.html"));
}

async fn handle_inference(
    pipeline: web::Data<Pipeline>,
    payload: Multipart,
) -> Result<HttpResponse, PipelineError> {
    let image = read_image(payload, pipeline.preprocessor().max_bytes())
        .await
        .inspect_err(|e| error!("Rejected upload: {e}"))?;

    let request_id = Uuid::new_v4();
    info!("Request {request_id}: classifying {} bytes", image.len());

    let worker = pipeline.clone();
    let assessment = web::block(move || worker.classify(&image))
        .await
        .map_err(|e| PipelineError::Inference(format!("inference worker failed: {e}")))?
        .inspect_err(|e| error!("Request {request_id}: {e}"))?;

    Ok(HttpResponse::Ok().json(assessment.into_response(request_id)))
}

/// Reads the first non-empty multipart field.
async fn read_image(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, PipelineError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| PipelineError::InvalidImage(format!("malformed upload: {e}")))?
    {
        let mut image_data = Vec::new();
        while let Some(chunk) = field.next().await {
            let data =
                chunk.map_err(|e| PipelineError::InvalidImage(format!("malformed upload: {e}")))?;
            if image_data.len() + data.len() > max_bytes {
                return Err(PipelineError::InvalidImage(format!(
                    "upload exceeds the {max_bytes} byte limit"
                )));
            }
            image_data.extend_from_slice(&data);
        }
        if !image_data.is_empty() {
            return Ok(image_data);
        }
    }

    Err(PipelineError::InvalidImage("no image was uploaded".to_string()))
}

async fn health(pipeline: web::Data<Pipeline>, state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        embedding_size: pipeline.embedding_size(),
        threshold: pipeline.threshold(),
    })
}
