//! sonet chat server entry point.
//!
//! Binary name: `sonet`
//!
//! Parses CLI arguments, loads configuration, then either prints it or
//! starts the WebSocket chat server.

mod cli;
mod http;
mod state;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use clap_complete::generate;
use sonet_core::hub::HubHandle;
use sonet_infra::config::{load_config, resolve_data_dir};
use sonet_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use sonet_types::config::GlobalConfig;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need config or logging
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "sonet", &mut std::io::stdout());
        return Ok(());
    }

    let otel = matches!(cli.command, Commands::Serve { otel: true, .. });
    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let data_dir = cli.data_dir.clone().unwrap_or_else(resolve_data_dir);
    let mut config = load_config(&data_dir).await;

    let result = match cli.command {
        Commands::Serve { port, host, .. } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            serve(config, data_dir).await
        }
        Commands::Config => cli::config::show_config(&config, &data_dir, cli.json),
        Commands::Completions { .. } => Ok(()),
    };

    shutdown_tracing();
    result
}

/// Run the chat server until Ctrl+C or SIGTERM, then drain the hub.
async fn serve(config: GlobalConfig, data_dir: PathBuf) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let (state, hub_task) = AppState::init(config, data_dir).await?;
    let hub = state.hub.clone();
    let db_pool = state.db_pool.clone();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    println!(
        "  {} sonet chat listening on {}",
        console::style("⚡").bold(),
        console::style(format!("ws://{addr}/ws")).cyan()
    );
    if !state.auth.is_signed() {
        println!(
            "  {}",
            console::style("Username cookies are not signed; set auth.cookie_signing_key in production").yellow()
        );
    }
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await?;

    // The signal handler already requested shutdown; this covers a server
    // error that returned early.
    hub.shutdown();
    hub_task.await.context("chat hub task failed")?;
    db_pool.close().await;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM, then stop the hub so open chat sessions are
/// closed and the HTTP server can finish.
async fn shutdown_signal(hub: HubHandle) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
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

    tracing::info!("shutdown requested, draining chat hub");
    hub.shutdown();
}
