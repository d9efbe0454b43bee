mod charts;
mod config;
mod forms;
mod imaging;
mod ml;
mod routes;
mod tasks;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::env;
use std::path::Path;
use tera::Tera;

use config::Configuration;
use imaging::enhance::Enhancer;
use imaging::store::ImageStore;
use ml::classifier::Classifier;
use ml::registry::ModelRegistry;
use routes::configure_routes;
use tasks::cleanup::CleanupScheduler;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let base_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());

    let config = Configuration::load()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Configuration loading failed: {e}"),
            )
        })?
        .anchored(Path::new(&base_dir));
    log::info!(
        "Configured models: {}",
        config.model_names().join(", ")
    );

    let tera = Tera::new(&format!("{base_dir}/templates/**/*.html")).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Template loading failed: {e}"),
        )
    })?;
    let static_dir = format!("{base_dir}/static");

    let store = ImageStore::new(config.image_dir.clone());
    let registry = ModelRegistry::new(&config);
    let classifier = Classifier::new(registry.clone());
    let enhancer = Enhancer::new(store.clone(), config.enhanced_dir.clone());
    let cleanup = CleanupScheduler::new(config.cleanup_delay());

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    let cleanup_for_shutdown = cleanup.clone();
    let tera = web::Data::new(tera);
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
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(registry.clone()))
            .app_data(web::Data::new(classifier.clone()))
            .app_data(web::Data::new(enhancer.clone()))
            .app_data(web::Data::new(cleanup.clone()))
            .app_data(tera.clone())
            .configure(|cfg| configure_routes(cfg, static_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await?;

    // Pending delayed deletions die with the process.
    cleanup_for_shutdown.shutdown();
    Ok(())
}
