//! CLI command definitions and dispatch.

pub mod serve;
pub mod task;

use a2a_rpc::A2AClient;
use clap::{Parser, Subcommand};
use serde::Serialize;

const BANNER: &str = r#"
   a2a
   Agent-to-Agent tasks over JSON-RPC and SSE.
"#;

/// A2A CLI — serve an agent or talk to one.
#[derive(Parser)]
#[command(
    name = "a2a",
    version,
    about = "A2A — serve an agent or talk to one over JSON-RPC",
    long_about = BANNER,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Agent endpoint URL.
    #[arg(
        long,
        global = true,
        env = "A2A_URL",
        default_value = "http://localhost:41241"
    )]
    pub url: String,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an echo agent until Ctrl-C.
    Serve(serve::ServeArgs),

    /// Send a message and wait for the resulting task.
    Send(task::SendArgs),

    /// Send a message and print task updates as they stream in.
    Stream(task::SendArgs),

    /// Show a task.
    Get(task::GetArgs),

    /// Cancel a task.
    Cancel(task::IdArgs),

    /// Re-attach to a task's update stream.
    Resubscribe(task::IdArgs),
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Execute the CLI command.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let output = cli.output;
    match cli.command {
        Commands::Serve(args) => serve::execute(args).await,
        Commands::Send(args) => task::send(&client(&cli.url)?, args, output).await,
        Commands::Stream(args) => task::stream(&client(&cli.url)?, args, output).await,
        Commands::Get(args) => task::get(&client(&cli.url)?, args, output).await,
        Commands::Cancel(args) => task::cancel(&client(&cli.url)?, args, output).await,
        Commands::Resubscribe(args) => {
            task::resubscribe(&client(&cli.url)?, args, output).await
        }
    }
}

fn client(url: &str) -> anyhow::Result<A2AClient> {
    Ok(A2AClient::new(url)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
