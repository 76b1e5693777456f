//! Onchain Agent - main entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use onchain_agent::{
    agent::{ChatService, Orchestrator},
    cli::{Cli, Command, run_chat_command, run_tool_command, run_tools_command},
    config::Config,
    server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    let _ = dotenvy::dotenv();

    // One-shot commands don't need the server stack
    let port_override = match &cli.command {
        Some(Command::Tools) => return run_tools_command(),
        Some(Command::Tool { name, params }) => {
            init_cli_logging();
            return run_tool_command(name, params).await;
        }
        Some(Command::Chat { message, thread }) => {
            init_cli_logging();
            return run_chat_command(message, thread.as_deref()).await;
        }
        Some(Command::Serve { port }) => *port,
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("onchain_agent=info,tower_http=info"));
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }

    let mut config = Config::from_env()?;
    if let Some(port) = port_override {
        config.http.port = port;
    }

    tracing::info!("Starting Onchain Agent...");
    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let chat = Arc::new(ChatService::new(orchestrator));

    server::serve(chat, &config.http, shutdown_signal()).await?;
    Ok(())
}

/// Quieter logging for one-shot commands; their output goes to stdout.
fn init_cli_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
