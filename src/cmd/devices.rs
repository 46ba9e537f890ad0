//! Device inventory report: harvest machines, enrich each with its subnet
//! assignment from the reference table, export CSV.

use crate::config::ConfigManager;
use crate::error::Result;
use crate::export::{CsvExporter, SinkMode};
use crate::harvest::schema::{FieldKind, RecordSchema};
use crate::harvest::Harvester;
use crate::join::{EmptyPolicy, JoinMode, Joiner, MatchStrategy, ReferenceTable};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct DevicesArgs {
    /// Subnet reference table (CSV with 'subnet' and 'name' columns)
    #[arg(long, short = 'r')]
    pub reference: PathBuf,

    /// Output CSV path (default: <output dir>/devices.csv)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Append to the output file instead of overwriting
    #[arg(long)]
    pub append: bool,

    /// Max records per output file, 0 = unbounded (default from config)
    #[arg(long)]
    pub ceiling: Option<usize>,

    /// Mask length applied to reference subnets given without one
    #[arg(long, default_value_t = 24)]
    pub mask: u8,

    /// Match on octet prefixes instead of masked subnet arithmetic
    #[arg(long)]
    pub prefix_match: bool,

    /// Drop devices that report no IP addresses
    #[arg(long)]
    pub skip_unaddressed: bool,
}

/// Fields harvested for each machine
pub fn device_schema() -> RecordSchema {
    RecordSchema::new()
        .field("id", FieldKind::Text)
        .field("computerDnsName", FieldKind::Text)
        .optional_field("osPlatform", FieldKind::Text)
        .optional_field("ipAddresses", FieldKind::List)
        .optional_field("lastSeen", FieldKind::Timestamp)
}

pub async fn run(args: DevicesArgs) -> Result<()> {
    println!("{} device inventory...", "Harvesting".cyan().bold());

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
    let empty_policy = if args.skip_unaddressed {
        EmptyPolicy::Skip
    } else {
        EmptyPolicy::PassThrough
    };
    let joiner = Joiner::new(&table, vec!["ipAddresses".to_string()], JoinMode::Enrich)
        .strategy(strategy)
        .empty_policy(empty_policy);

    let output = args
        .output
        .unwrap_or_else(|| config.output.directory.join("devices.csv"));
    let mode = if args.append {
        SinkMode::Append
    } else {
        SinkMode::Overwrite
    };
    let mut exporter = CsvExporter::new(&output, mode)
        .ceiling(args.ceiling.unwrap_or(config.output.ceiling));

    let mut harvester = Harvester::new(
        &client,
        "machines",
        device_schema(),
        config.api.page_size,
        config.rate_limit,
    );

    let spinner = super::create_spinner("Fetching machines...");
    let mut harvested = 0;
    while let Some(record) = harvester.next().await? {
        harvested += 1;
        if let Some(total) = harvester.total_count() {
            spinner.set_message(format!("Fetching machines... {}/{}", harvested, total));
        }
        for row in joiner.enrich(&record)? {
            exporter.write(&row)?;
        }
    }
    spinner.finish_and_clear();

    let summary = exporter.finish()?;
    println!(
        "{} Harvested {} machines, exported {} records to {} file(s)",
        "✓".green().bold(),
        harvested,
        summary.records,
        summary.files.len()
    );
    for file in &summary.files {
        println!("  → {}", file.display());
    }

    Ok(())
}
