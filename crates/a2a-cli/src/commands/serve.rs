//! `a2a serve` — run the reference echo agent.

use std::path::PathBuf;
use std::sync::Arc;

use a2a_server::telemetry::init_telemetry;
use a2a_server::{
    A2AServer, Dispatcher, EchoExecutor, InMemoryPushNotificationStore, ServerConfig,
};
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct ServeArgs {
    /// Path to server.toml (defaults to the user config dir, if present).
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Interface to bind (overrides config).
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on (overrides config).
    #[arg(long, short)]
    pub port: Option<u16>,
}

pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    init_telemetry(&config.telemetry)?;

    let store = config.build_store()?;
    let dispatcher = Dispatcher::new(store, Arc::new(EchoExecutor))
        .with_push_store(Arc::new(InMemoryPushNotificationStore::new()));
    let handle = A2AServer::new(dispatcher, config).start().await?;

    println!(
        "\n  {} Echo agent listening on {}",
        "✓".green().bold(),
        handle.url().cyan()
    );
    println!("  {} Press Ctrl-C to stop\n", "→".dimmed());

    tokio::signal::ctrl_c().await?;
    println!("  {} Shutting down...", "→".dimmed());
    handle.shutdown();
    handle.wait().await
}
