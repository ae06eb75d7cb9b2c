use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scanrelay::api::{create_router, AppState};
use scanrelay::config::Config;
use scanrelay::vertex::{InferenceFactory, InferenceHandle};

#[derive(Parser)]
#[command(name = "scanrelay")]
#[command(about = "Image-to-text relay for Gemini models on Vertex AI")]
struct Args {
    /// Exit at startup when credentials or configuration are invalid
    #[arg(long)]
    strict: bool,

    /// Listen port, overrides PORT
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scanrelay=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }

    if let Err(e) = config.validate() {
        if args.strict {
            return Err(anyhow::anyhow!("Invalid configuration: {e}"));
        }
        tracing::warn!("Configuration incomplete: {} - /scan will fail until fixed", e);
    }

    tracing::info!(
        "Initializing Vertex AI client (region={}, model={}, fallback={})...",
        config.vertex.region,
        config.vertex.model,
        config.vertex.fallback_model
    );
    let handle = Arc::new(InferenceHandle::from_factory(InferenceFactory::new(
        &config,
    )));
    if let Err(e) = handle.get().await {
        if args.strict {
            return Err(anyhow::anyhow!("Failed to initialize Vertex AI client: {e}"));
        }
        tracing::warn!(
            "Vertex AI client unavailable: {} - initialization will be retried per request",
            e
        );
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, handle);
    let app = create_router(state);

    tracing::info!("scanrelay starting on http://{}", addr);
    tracing::info!("  Health check: http://{}/ping", addr);
    tracing::info!("  Scan:         POST http://{}/scan", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server...");
}
