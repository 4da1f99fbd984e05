//! perfwatch gateway
//!
//! - `serve`: HTTP server with access logging and request profiling layers
//! - `profile`: external controller holding the profiling lock token

use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use perfwatch_core::error::Result;
use perfwatch_gateway::{app_state, cli, config, controller, router};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = cli::Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(kind = e.kind().as_str(), error = %e, "perfwatch-gateway failed");
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> Result<()> {
    let cfg = config::load_from_file(&cli.config)?;
    match cli.command.unwrap_or(cli::Command::Serve) {
        cli::Command::Serve => serve(cfg).await,
        cli::Command::Profile { seconds } => controller::run_profile(&cfg.profiling, seconds).await,
    }
}

async fn serve(cfg: config::GatewayConfig) -> Result<()> {
    let listen = cfg.gateway.listen_addr()?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state);

    tracing::info!(%listen, "perfwatch-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
