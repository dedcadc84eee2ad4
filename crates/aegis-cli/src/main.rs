//! Thin CLI driver exercising the aegis `Runtime` end to end: bootstrap,
//! drive one or more turns through the orchestrator, and inspect the
//! registry/storage state `Runtime` exposes.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{chat, init_config, run, status};

#[derive(Parser)]
#[command(name = "aegis")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local AI-assistant orchestration runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter `aegis.toml` config file.
    InitConfig(init_config::InitConfigArgs),

    /// Send a single turn through the orchestrator and print the response.
    Run(run::RunArgs),

    /// Start an interactive REPL against a single session.
    Chat(chat::ChatArgs),

    /// Bootstrap the runtime and report model/storage health.
    Status(status::StatusArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitConfig(args) => init_config::run(args),
        Commands::Run(args) => run::run(args).await,
        Commands::Chat(args) => chat::run(args).await,
        Commands::Status(args) => status::run(args).await,
    }
}
