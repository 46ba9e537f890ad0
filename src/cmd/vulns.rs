//! Vulnerability report: harvest the CVE collection, optionally restricted
//! to recently published entries, or walk machines and pull each one's
//! vulnerabilities from the per-device detail endpoint.

use crate::config::ConfigManager;
use crate::error::Result;
use crate::export::{CsvExporter, SinkMode};
use crate::harvest::schema::{FieldKind, RecordSchema};
use crate::harvest::{fetch_details, Harvester};
use crate::join::EnrichedRecord;
use chrono::{DateTime, NaiveDate, Utc};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct VulnsArgs {
    /// Only include vulnerabilities published after this date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "per_device")]
    pub published_after: Option<NaiveDate>,

    /// Walk machines and fetch each one's vulnerabilities instead of the
    /// flat CVE collection (one row per machine x CVE; slower)
    #[arg(long)]
    pub per_device: bool,

    /// Output CSV path (default: <output dir>/vulns.csv)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Append to the output file instead of overwriting
    #[arg(long)]
    pub append: bool,

    /// Max records per output file, 0 = unbounded (default from config)
    #[arg(long)]
    pub ceiling: Option<usize>,
}

/// Fields harvested for each CVE
fn vuln_schema() -> RecordSchema {
    RecordSchema::new()
        .field("id", FieldKind::Text)
        .field("name", FieldKind::Text)
        .optional_field("severity", FieldKind::Text)
        .optional_field("cvssV3", FieldKind::Float)
        .optional_field("exposedMachines", FieldKind::Int)
        .optional_field("publishedOn", FieldKind::Timestamp)
}

pub async fn run(args: VulnsArgs) -> Result<()> {
    println!("{} vulnerability data...", "Harvesting".cyan().bold());

    let manager = ConfigManager::load()?;
    let config = manager.load_config()?;
    let client = super::build_client(&manager, &config)?;

    let output = args
        .output
        .unwrap_or_else(|| config.output.directory.join("vulns.csv"));
    let mode = if args.append {
        SinkMode::Append
    } else {
        SinkMode::Overwrite
    };
    let mut exporter = CsvExporter::new(&output, mode)
        .ceiling(args.ceiling.unwrap_or(config.output.ceiling));

    let cutoff = args.published_after.map(|d| {
        let ts: DateTime<Utc> = d
            .and_hms_opt(23, 59, 59)
            .expect("valid wall-clock time")
            .and_utc();
        println!("→ Published after: {}", d.to_string().cyan());
        ts
    });

    let exported = if args.per_device {
        harvest_per_device(&client, &config, &mut exporter).await?
    } else {
        let mut harvester = Harvester::new(
            &client,
            "vulnerabilities",
            vuln_schema(),
            config.api.page_size,
            config.rate_limit,
        );
        if let Some(cutoff) = cutoff {
            harvester = harvester.published_after("publishedOn", cutoff);
        }

        let spinner = super::create_spinner("Fetching vulnerabilities...");
        let mut count = 0;
        while let Some(record) = harvester.next().await? {
            exporter.write(&EnrichedRecord::from(&record))?;
            count += 1;
            spinner.set_message(format!("Fetching vulnerabilities... {}", count));
        }
        spinner.finish_and_clear();
        count
    };

    let summary = exporter.finish()?;
    println!(
        "{} Exported {} records to {} file(s)",
        "✓".green().bold(),
        exported,
        summary.files.len()
    );
    for file in &summary.files {
        println!("  → {}", file.display());
    }

    Ok(())
}

/// One row per machine x vulnerability, via the per-device detail endpoint.
/// A machine whose detail call fails is skipped, not fatal.
async fn harvest_per_device(
    client: &crate::api::ApiClient,
    config: &crate::config::Config,
    exporter: &mut CsvExporter,
) -> Result<usize> {
    let machine_schema = RecordSchema::new()
        .field("id", FieldKind::Text)
        .field("computerDnsName", FieldKind::Text);

    let mut harvester = Harvester::new(
        client,
        "machines",
        machine_schema,
        config.api.page_size,
        config.rate_limit,
    );
    let machines = harvester.collect_all().await?;
    println!("→ {} machines to query", machines.len());

    let mut ids = Vec::with_capacity(machines.len());
    let mut names = Vec::with_capacity(machines.len());
    for machine in &machines {
        ids.push(machine.get("id")?.to_export_string());
        names.push(machine.get("computerDnsName")?.to_export_string());
    }

    let spinner = super::create_spinner("Fetching per-device vulnerabilities...");
    let details = fetch_details(
        client,
        "machines",
        "vulnerabilities",
        &ids,
        Duration::from_secs(config.harvest.detail_delay_secs),
        |id, e| {
            eprintln!(
                "{} Skipping machine {}: {}",
                "⚠".yellow(),
                id.yellow(),
                e
            );
        },
    )
    .await?;
    spinner.finish_and_clear();

    let detail_schema = vuln_schema();
    let mut count = 0;
    for (machine_id, items) in details {
        let machine_name = ids
            .iter()
            .position(|id| *id == machine_id)
            .map(|i| names[i].clone())
            .unwrap_or_default();

        for item in items {
            let vuln = detail_schema.validate(&item)?;
            let mut pairs = vec![
                ("machineId".to_string(), machine_id.clone()),
                ("computerDnsName".to_string(), machine_name.clone()),
            ];
            pairs.extend(
                vuln.fields()
                    .map(|(n, v)| (n.to_string(), v.to_export_string())),
            );
            exporter.write(&EnrichedRecord::from_pairs(pairs))?;
            count += 1;
        }
    }

    Ok(count)
}
