//! `aegis run`: a single, non-interactive turn through the orchestrator
//! pipeline. The thinnest possible exercise of `Runtime::bootstrap` +
//! `Orchestrator::process`/`process_stream`.

use crate::output::{print_error, print_info};
use aegis::{Config, Runtime};
use anyhow::Result;
use aegis_orchestrator::ProcessRequest;
use clap::Args;
use colored::Colorize;
use futures::StreamExt;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "aegis.toml")]
    config: std::path::PathBuf,

    /// The user input to send.
    input: String,

    /// Session id to attribute this turn to.
    #[arg(long, default_value = "cli-session")]
    session: String,

    /// Stream tokens as they're generated instead of waiting for the full response.
    #[arg(long)]
    stream: bool,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let runtime = Runtime::bootstrap(config).await?;
    let orchestrator = runtime.orchestrator().clone();

    let request = ProcessRequest::new(args.session.clone(), args.input.clone());

    if args.stream {
        let mut chunks = orchestrator.process_stream(request);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(content) => {
                    print!("{content}");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                }
                Err(e) => {
                    println!();
                    print_error(&format!("{e}"));
                    runtime.shutdown().await;
                    return Err(e.into());
                }
            }
        }
        println!();
    } else {
        match orchestrator.process(request).await {
            Ok(response) => {
                println!("{}", response.content);
                print_info(&format!(
                    "model={} intent={} duration={}ms",
                    response.model.dimmed(),
                    response.intent.as_str(),
                    response.duration_ms
                ));
            }
            Err(e) => {
                print_error(&format!("{e}"));
                runtime.shutdown().await;
                return Err(e.into());
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}
