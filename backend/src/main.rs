use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use backend::inference::weights::resolve_weights;
use backend::routes::{configure_routes, AppState};
use backend::{AppConfig, Pipeline};
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {e}");
        std::io::Error::other(format!("Configuration failed: {e}"))
    })?;

    let weights_path = resolve_weights(&config.models).await.map_err(|e| {
        log::error!("Failed to resolve feature extractor weights: {e}");
        std::io::Error::other(format!("Model loading failed: {e}"))
    })?;

    let pipeline = Pipeline::load(&config, &weights_path).map_err(|e| {
        log::error!("Failed to preload models at startup: {e}");
        std::io::Error::other(format!("Model loading failed: {e}"))
    })?;
    log::info!(
        "Pipeline ready: embedding size {}, suspicious threshold {}",
        pipeline.embedding_size(),
        pipeline.threshold()
    );

    let pipeline = web::Data::new(pipeline);
    let state = web::Data::new(AppState::new());
    let frontend_dir = config.server.frontend_dir.clone();
    let bind_address = config.bind_address();

    log::info!("Serving frontend from {}", frontend_dir.display());
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(pipeline.clone())
            .app_data(state.clone())
            .configure(|cfg| configure_routes(cfg, frontend_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
