mod config;
mod errors;
mod routes;
mod state;
mod typeset;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::state::AppState;
use crate::typeset::{TectonicToolchain, Toolchain};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Keju compile API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the typesetting toolchain (TectonicToolchain by default,
    // program override via TECTONIC_PROGRAM)
    let toolchain: Arc<dyn Toolchain> =
        Arc::new(TectonicToolchain::new(config.tectonic_program.clone()));
    match toolchain.locate() {
        Some(path) => info!("Typesetting toolchain resolved at {}", path.display()),
        None => warn!(
            "Typesetting toolchain '{}' not found; compile requests will fail until it is installed",
            config.tectonic_program
        ),
    }

    // Build app state
    let state = AppState {
        config: config.clone(),
        toolchain,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
