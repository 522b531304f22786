mod config;
mod error;
mod forms;
mod packager;
mod processing;
mod routes;
mod storage;
mod views;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use processing::{ModelRegistry, Processor};
use routes::configure_routes;
use std::env;
use std::sync::Arc;
use storage::ImageStore;
use views::Views;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::other(format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| startup_error("Failed to load configuration", e))?;

    let store = ImageStore::from_config(&config.storage);
    if !store.root().is_dir() {
        log::warn!(
            "Image folder {} does not exist; creating it",
            store.root().display()
        );
        std::fs::create_dir_all(store.root())?;
    }

    let models = ModelRegistry::from_specs(&config.models)
        .map_err(|e| startup_error("Model loading failed", e))?;
    if config.models.is_empty() {
        log::warn!("No models configured; classification requests will fail");
    }

    let views = Views::new().map_err(|e| startup_error("Failed to compile templates", e))?;

    let processor = web::Data::new(Processor::new(store.clone(), Arc::new(models)));
    let store = web::Data::new(store);
    let views = web::Data::new(views);

    let static_dir = config.static_dir.clone();
    let image_dir = store.root().to_path_buf();
    let bind_address = config.bind_address();

    log::info!(
        "Serving {} images from {}",
        store.list_images().map(|i| i.len()).unwrap_or(0),
        image_dir.display()
    );
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(processor.clone())
            .app_data(store.clone())
            .app_data(views.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone(), image_dir.clone()))
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
