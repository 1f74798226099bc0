use clap::Parser;
use scribing_flow::FlowTheme;
use scribing_server::{router, AppState, ServerConfig};
use scribing_sync::MemoryAuthority;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Collaborative document authority over HTTP
#[derive(Parser, Debug)]
#[command(name = "scribing-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding scribing.config.json and the initial document
    #[arg(default_value = ".")]
    root_dir: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind (overrides the config file)
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(&args.root_dir)?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }

    let content = config.initial_content(&args.root_dir)?;
    info!(size = content.size(), "Loaded initial document");
    let authority = Arc::new(
        MemoryAuthority::new(content, FlowTheme::default()).with_presence_ttl(config.presence_ttl()),
    );
    let app = router(AppState::new(authority));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Failed to listen for shutdown signal");
            }
        })
        .await?;
    info!("Shut down");
    Ok(())
}
