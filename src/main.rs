use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizstream::{api, catalog::Catalog, config::Config, reaper, state::AppState};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizstream=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quizstream...");

    let config = Config::from_env();
    let addr = config.listen_addr;
    let idle_timeout = config.idle_timeout;
    let state = Arc::new(AppState::new(config, Catalog::default()));

    // The server can't do anything without questions
    match state.reload_catalog().await {
        Ok(loaded) => tracing::info!(
            "Catalog ready: {} categories, {} questions, {} exported",
            loaded.categories,
            loaded.questions,
            loaded.exported
        ),
        Err(e) => {
            tracing::error!(
                "Failed to load catalog from {}: {}",
                state.config.catalog_path.display(),
                e
            );
            std::process::exit(1);
        }
    }

    reaper::spawn_idle_reaper(state.registry.clone(), idle_timeout);

    let app = api::router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
