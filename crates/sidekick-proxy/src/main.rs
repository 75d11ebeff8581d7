//! Sidekick API proxy
//!
//! Forwards every `/api/*` request to the chat backend, rewriting only the
//! scheme, host and port.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use sidekick_common::{DEFAULT_API_URL, ProxyConfig, env_vars};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod proxy;

/// Command-line arguments for the proxy server
#[derive(Parser, Debug)]
#[clap(name = "sidekick-proxy", about = "Forward /api requests to the Sidekick backend")]
struct Args {
    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Backend whose scheme, host and port replace the incoming ones
    #[clap(short, long, env = env_vars::BACKEND_URL, default_value = DEFAULT_API_URL)]
    backend_url: String,
}

impl From<Args> for ProxyConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            backend_url: args.backend_url,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let config = ProxyConfig::from(Args::parse());

    // Setup tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = config.backend()?;
    info!("Starting Sidekick proxy...");
    info!("Backend: {}", backend);

    let state = Arc::new(proxy::ProxyState::new(backend)?);
    let app = proxy::proxy_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start the server
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Proxy listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
