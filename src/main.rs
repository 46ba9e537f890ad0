use clap::{Parser, Subcommand};
use colored::Colorize;
use rep365::{cmd, error};

#[derive(Parser, Debug)]
#[command(
    name = "rep365",
    about = "Harvest, enrich, and report Microsoft 365 security inventory — at scale",
    version,
    long_about = "Security inventory reporting CLI for Microsoft 365 tenants\n\n\
                  Harvest device and vulnerability data from the Defender API, enrich it\n\
                  against your subnet reference table, and export deterministic CSV reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate CSV reports from harvested tenant data
    #[command(subcommand)]
    Report(ReportCommands),

    /// One-shot remediation actions
    #[command(subcommand)]
    Purge(PurgeCommands),

    /// Manage rep365 configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    /// Device inventory enriched with subnet assignments
    Devices(cmd::devices::DevicesArgs),

    /// Vulnerabilities, flat or per-device
    Vulns(cmd::vulns::VulnsArgs),

    /// Machines exploded and sorted by subnet membership
    Subnets(cmd::subnets::SubnetsArgs),
}

#[derive(Subcommand, Debug)]
enum PurgeCommands {
    /// Drain the quarantine collection (bounded)
    Quarantine(cmd::purge::QuarantineArgs),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved configuration
    Show,

    /// Write a default config file
    Init(cmd::config::InitArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("rep365=debug")
            .init();
    }

    match cli.command {
        Commands::Report(report_cmd) => match report_cmd {
            ReportCommands::Devices(args) => cmd::devices::run(args).await?,
            ReportCommands::Vulns(args) => cmd::vulns::run(args).await?,
            ReportCommands::Subnets(args) => cmd::subnets::run(args).await?,
        },
        Commands::Purge(purge_cmd) => match purge_cmd {
            PurgeCommands::Quarantine(args) => cmd::purge::quarantine(args).await?,
        },
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => cmd::config::show()?,
            ConfigCommands::Init(args) => cmd::config::init(args)?,
        },
    }

    Ok(())
}
