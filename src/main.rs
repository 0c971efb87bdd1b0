use crate::{
    config::{load_config, VERSION},
    services::{games::GameRegistry, hooks::delivery::HookDeliverer},
    utils::codec::NameCodec,
};
use axum::Extension;
use log::{error, info};
use std::{net::SocketAddr, process::exit, sync::Arc};
use tokio::{net::TcpListener, signal};
use utils::logging;

mod config;
mod database;
mod routes;
mod services;
mod utils;

#[tokio::main]
async fn main() {
    // Load configuration
    let config = load_config().unwrap_or_default();

    // Initialize logging
    logging::setup(config.logging);

    // Create the server socket address while the port is still available
    let addr: SocketAddr = SocketAddr::new(config.host, config.port);

    let codec = match NameCodec::from_base64(&config.encryption_key) {
        Some(value) => value,
        None => {
            error!("Invalid encryption key: expected base64 encoding of 16 bytes");
            exit(1);
        }
    };

    let db = match database::connect(&config.database_file).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to initialize database: {:?}", err);
            exit(1);
        }
    };

    let registry = Arc::new(GameRegistry::new(config.game_cache_ttl));

    // Start the webhook outbox delivery worker
    let deliverer = HookDeliverer::new(db.clone(), config.hooks.clone());
    tokio::spawn(deliverer.process());

    // Create the HTTP router
    let router = routes::router()
        // Apply data extensions
        .layer(Extension(db))
        .layer(Extension(registry))
        .layer(Extension(codec))
        .into_make_service_with_connect_info::<SocketAddr>();

    info!("Starting server on {} (v{})", addr, VERSION);

    // Start the TCP listener
    let listener = match TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!("Failed to bind HTTP server on {}: {:?}", addr, err);
            return;
        }
    };

    // Run the HTTP server
    if let Err(err) = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            _ = signal::ctrl_c().await;
        })
        .await
    {
        error!("Error within HTTP server {:?}", err);
    }
}
