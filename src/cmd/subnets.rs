//! Subnet membership report: one row per machine x address x subnet match,
//! sorted by subnet name so machines group by where they live on the
//! network. The sort happens before export — the exporter itself never
//! reorders.

use crate::config::ConfigManager;
use crate::error::Result;
use crate::export::{CsvExporter, SinkMode};
use crate::harvest::Harvester;
use crate::join::{EmptyPolicy, JoinMode, Joiner, MatchStrategy, ReferenceTable};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SubnetsArgs {
    /// Subnet reference table (CSV with 'subnet' and 'name' columns)
    #[arg(long, short = 'r')]
    pub reference: PathBuf,

    /// Output CSV path (default: <output dir>/subnets.csv)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Max records per output file, 0 = unbounded (default from config)
    #[arg(long)]
    pub ceiling: Option<usize>,

    /// Mask length applied to reference subnets given without one
    #[arg(long, default_value_t = 24)]
    pub mask: u8,

    /// Match on octet prefixes instead of masked subnet arithmetic
    #[arg(long)]
    pub prefix_match: bool,
}

pub async fn run(args: SubnetsArgs) -> Result<()> {
    println!("{} machines by subnet...", "Sorting".cyan().bold());

    let manager = ConfigManager::load()?;
    let config = manager.load_config()?;
    let client = super::build_client(&manager, &config)?;

    let table = ReferenceTable::load(&args.reference, args.mask)?;
    println!(
        "→ Reference table: {} ({} subnets)",
        args.reference.display().to_string().cyan(),
        table.len()
    );

    let strategy = if args.prefix_match {
        MatchStrategy::OctetPrefix
    } else {
        MatchStrategy::Masked
    };
    // Machines without addresses have no subnet to sort into
    let joiner = Joiner::new(&table, vec!["ipAddresses".to_string()], JoinMode::Explode)
        .strategy(strategy)
        .empty_policy(EmptyPolicy::Skip);

    let mut harvester = Harvester::new(
        &client,
        "machines",
        super::devices::device_schema(),
        config.api.page_size,
        config.rate_limit,
    );

    let spinner = super::create_spinner("Fetching machines...");
    let mut rows = Vec::new();
    while let Some(record) = harvester.next().await? {
        rows.extend(joiner.enrich(&record)?);
        spinner.set_message(format!("Fetching machines... {} rows", rows.len()));
    }
    spinner.finish_and_clear();

    rows.sort_by(|a, b| {
        let key_a = (a.get("subnet_name").unwrap_or(""), a.get("address").unwrap_or(""));
        let key_b = (b.get("subnet_name").unwrap_or(""), b.get("address").unwrap_or(""));
        key_a.cmp(&key_b)
    });

    let output = args
        .output
        .unwrap_or_else(|| config.output.directory.join("subnets.csv"));
    let mut exporter = CsvExporter::new(&output, SinkMode::Overwrite)
        .ceiling(args.ceiling.unwrap_or(config.output.ceiling));
    for row in &rows {
        exporter.write(row)?;
    }

    let summary = exporter.finish()?;
    println!(
        "{} Exported {} rows to {} file(s)",
        "✓".green().bold(),
        summary.records,
        summary.files.len()
    );
    for file in &summary.files {
        println!("  → {}", file.display());
    }

    Ok(())
}
