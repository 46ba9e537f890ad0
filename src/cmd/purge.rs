//! Quarantine purge: delete quarantined items until the collection drains,
//! bounded by an iteration cap.

use crate::config::ConfigManager;
use crate::error::Result;
use crate::remediate::purge_collection;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct QuarantineArgs {
    /// Stop after this many list-and-delete iterations
    #[arg(long, default_value_t = 10)]
    pub max_iterations: u32,

    /// Show what would be purged without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn quarantine(args: QuarantineArgs) -> Result<()> {
    println!("{} quarantined items...", "Purging".cyan().bold());

    let manager = ConfigManager::load()?;
    let config = manager.load_config()?;
    let client = super::build_client(&manager, &config)?;

    if args.dry_run {
        let page = client
            .get_page("quarantine/messages", 0, config.api.page_size)
            .await?;
        println!(
            "{} {} item(s) currently quarantined; nothing deleted (dry run)",
            "→".cyan(),
            page.total_count
        );
        return Ok(());
    }

    let mut skipped = 0;
    let outcome = purge_collection(
        &client,
        "quarantine/messages",
        config.api.page_size,
        args.max_iterations,
        |id, e| {
            skipped += 1;
            eprintln!("{} Skipping item {}: {}", "⚠".yellow(), id.yellow(), e);
        },
    )
    .await?;

    if outcome.converged {
        println!(
            "{} Quarantine drained: {} item(s) deleted in {} iteration(s)",
            "✓".green().bold(),
            outcome.deleted,
            outcome.iterations
        );
    } else {
        println!(
            "{} Iteration cap reached after {} iteration(s): {} deleted, {} still quarantined",
            "⚠".yellow().bold(),
            outcome.iterations,
            outcome.deleted,
            outcome.remaining
        );
    }

    if skipped > 0 {
        println!("  → {} item(s) skipped due to per-item errors", skipped);
    }

    Ok(())
}
