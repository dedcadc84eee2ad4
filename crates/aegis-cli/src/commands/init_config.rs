//! `aegis init-config`: write a starter TOML configuration file.
//!
//! Config *file format* parsing is out of scope for the aegis crates
//! themselves (spec.md §1 Non-goals) — `aegis-config::Config::load` just
//! expects a TOML file in this shape. This command hand-writes the
//! template rather than round-tripping `Config` through `toml::to_string`,
//! since `HashMap<SlotName, _>` keys make programmatic TOML serialization
//! more trouble than it is worth for a one-shot scaffold file.

use crate::output::{print_error, print_success};
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct InitConfigArgs {
    /// Where to write the new config file.
    #[arg(long, default_value = "aegis.toml")]
    out: PathBuf,

    /// Overwrite the file if it already exists.
    #[arg(long)]
    force: bool,
}

const TEMPLATE: &str = r#"app_data_dir = "./aegis-data"

[llm]
base_url = "http://localhost:11434"
timeout = 120
allow_runtime_switch = false
switch_cooldown = 5
keep_alive = "5m"
reasoning_model = ""
reasoning_enabled = false

[llm.process]
manage = true
startup_timeout = 60

[llm.models.fast]
name = "llama3:8b"
max_tokens = 2048
temperature = 0.7
context_window = 8192

[llm.models.critical]
name = "llama3:70b"
max_tokens = 4096
temperature = 0.5
context_window = 8192

[llm.models.code]
name = "codellama:13b"
max_tokens = 4096
temperature = 0.2
context_window = 16384

[memory.short_term]
max_messages = 20
expire_after_secs = 3600

[memory.long_term]
auto_extract = true
extract_interval = 10

[memory.retrieval]
threshold = 0.3
max_results = 5
reranking = false

[memory.embeddings]
model = "nomic-embed-text"
dimension = 768

[memory.personality]
inferential_learning_enabled = true
inferential_learning_requires_approval = true
auto_approve_enabled = false
auto_approve_threshold = 0.85
learning_mode = "passive"
personality_token_budget = 256
max_fragments_in_prompt = 10
compress_threshold = 15

[telemetry]
enabled = true
collect_interval_secs = 30
retention_days = 30
"#;

pub fn run(args: InitConfigArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        bail!("{} already exists; pass --force to overwrite", args.out.display());
    }
    if let Err(e) = std::fs::write(&args.out, TEMPLATE) {
        print_error(&format!("failed to write {}: {e}", args.out.display()));
        return Err(e.into());
    }
    print_success(&format!("wrote {}", args.out.display()));
    Ok(())
}
