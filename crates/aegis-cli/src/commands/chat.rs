//! `aegis chat`: an interactive REPL over the orchestrator pipeline. Each
//! line of input is one turn in the same session, so short-term memory
//! accumulates across the conversation the way a real front-end would
//! drive it (spec.md §4.6's per-session FIFO).

use crate::output::{print_error, print_info, print_warning};
use aegis::{Config, Runtime};
use aegis_orchestrator::ProcessRequest;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::io::{self, BufRead, Write};

#[derive(Args)]
pub struct ChatArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "aegis.toml")]
    config: std::path::PathBuf,

    /// Session id for this conversation.
    #[arg(long, default_value = "cli-session")]
    session: String,
}

pub async fn run(args: ChatArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let runtime = Runtime::bootstrap(config).await?;
    let orchestrator = runtime.orchestrator().clone();

    print_info(&format!("session {} — type /quit to exit", args.session));

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{} ", "you>".bright_cyan().bold());
        io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }

        let request = ProcessRequest::new(args.session.clone(), input.to_string());
        match orchestrator.process(request).await {
            Ok(response) => {
                println!(
                    "{} {}",
                    "assistant>".bright_magenta().bold(),
                    response.content
                );
                println!(
                    "  {}",
                    format!(
                        "intent={} model={} {}ms",
                        response.intent.as_str(),
                        response.model,
                        response.duration_ms
                    )
                    .dimmed()
                );
            }
            Err(e) if e.recoverable() => {
                print_warning(&format!("degraded: {e}"));
            }
            Err(e) => {
                print_error(&format!("{e}"));
            }
        }
    }

    print_info("shutting down");
    runtime.shutdown().await;
    Ok(())
}
