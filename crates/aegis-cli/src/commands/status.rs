//! `aegis status`: bootstrap a `Runtime` against an existing config and
//! report registry/storage health, mirroring the liveness checks
//! `original_source/src/core/bootstrapper.py::Bootstrapper` performs before
//! serving, without the rich-console progress theater (spec.md §9 REDESIGN
//! FLAG — see `DESIGN.md`'s `aegis` entry).

use crate::output::{print_success, print_warning, section};
use aegis::{Config, Runtime};
use aegis_types::SlotName;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct StatusArgs {
    /// Path to the TOML config file.
    #[arg(long, default_value = "aegis.toml")]
    config: std::path::PathBuf,

    /// Emit machine-readable JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let runtime = Runtime::bootstrap(config).await?;

    let health = runtime.health_check().await;
    let registry_stats = runtime.registry_stats();
    let storage_stats = runtime.storage_stats().await?;

    if args.json {
        let report = serde_json::json!({
            "health": health,
            "registry": registry_stats,
            "storage": {
                "table_rows": storage_stats.table_rows,
                "wal_bytes": storage_stats.wal_bytes,
            },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        runtime.shutdown().await;
        return Ok(());
    }

    section("model slots");
    for slot in SlotName::ALL {
        let healthy = health.get(&slot).copied().unwrap_or(false);
        let marker = if healthy { "✓".bright_green() } else { "✗".bright_red() };
        match registry_stats.models.get(&slot) {
            Some(stats) => println!(
                "  {marker} {slot:<10} {} uses={} avg={:.0}ms tokens={}",
                stats.model_name.dimmed(),
                stats.use_count,
                stats.avg_duration_ms,
                stats.total_tokens,
            ),
            None => println!("  {marker} {slot:<10} {}", "not configured".dimmed()),
        }
    }
    if let Some(active) = registry_stats.active_slot {
        print_success(&format!("active slot: {active}"));
    }

    section("storage");
    for (table, rows) in &storage_stats.table_rows {
        println!("  {table:<24} {rows}");
    }
    println!("  {:<24} {} bytes", "wal", storage_stats.wal_bytes);

    let all_healthy = health.values().all(|h| *h);
    if all_healthy {
        print_success("all configured slots are healthy");
    } else {
        print_warning("one or more slots failed their health check");
    }

    runtime.shutdown().await;
    Ok(())
}
