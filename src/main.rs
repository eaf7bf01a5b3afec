//! # AgentStore CLI
//!
//! The `agentstore` binary runs the capability discovery-and-scoring
//! pipeline and inspects its configuration.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `agentstore update` | Run the full pipeline (incremental by default) |
//! | `agentstore discover` | Preview discovery and deduplication only |
//! | `agentstore sources` | List configured discoverers and their status |
//!
//! ## Examples
//!
//! ```bash
//! # Incremental update: only newly discovered capabilities are processed
//! agentstore update
//!
//! # Full refresh, ignoring persisted data
//! agentstore update --force
//!
//! # See what would be processed without touching anything
//! agentstore update --dry-run
//!
//! # Cap a single source for a quick run
//! agentstore update --search-limit 50 --npm-limit 0
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use agentstore::config;
use agentstore::discover::{dedupe_entries, DiscovererRegistry};
use agentstore::pipeline::{self, UpdateOptions};
use agentstore::progress::ProgressMode;

/// AgentStore — a discovery and scoring pipeline for AI agent capabilities.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file means defaults. Credentials come from the
/// environment (`GITHUB_TOKEN`, `OPENAI_API_KEY`, ...).
#[derive(Parser)]
#[command(
    name = "agentstore",
    about = "AgentStore — a discovery and scoring pipeline for AI agent capabilities",
    version,
    long_about = "AgentStore discovers AI agent capabilities (MCP servers, agent skills) from \
    curated lists, registries, and search APIs, collects repository signals, scans clones for \
    security findings, runs AI analysis, and publishes a ranked JSON snapshot."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/agentstore.toml")]
    config: PathBuf,

    /// Progress output: auto (human on TTY), human, json, or off.
    #[arg(long, global = true, default_value = "auto")]
    progress: String,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the discovery-and-scoring pipeline.
    ///
    /// Incremental by default: capabilities whose slug is already persisted
    /// are skipped entirely. The run always ends with a merged, ranked
    /// snapshot and an appended run-log entry (dry runs persist nothing).
    Update {
        /// Ignore persisted data and recompute everything.
        #[arg(long)]
        force: bool,

        /// List the capabilities that would be processed, then exit.
        #[arg(long)]
        dry_run: bool,

        /// Override the curated-list item limit.
        #[arg(long)]
        curated_limit: Option<usize>,

        /// Override the official-registry item limit.
        #[arg(long)]
        registry_limit: Option<usize>,

        /// Override the GitHub search item limit.
        #[arg(long)]
        search_limit: Option<usize>,

        /// Override the GitHub topics item limit.
        #[arg(long)]
        topics_limit: Option<usize>,

        /// Override the npm registry item limit.
        #[arg(long)]
        npm_limit: Option<usize>,
    },

    /// Run discovery and deduplication only, printing the result.
    ///
    /// Useful for checking upstream list formats and source priorities
    /// without collecting, scanning, or analyzing anything.
    Discover,

    /// List configured discoverers and whether their prerequisites are met.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = config::load_config(&cli.config)?;

    let progress_mode = match cli.progress.as_str() {
        "human" => ProgressMode::Human,
        "json" => ProgressMode::Json,
        "off" => ProgressMode::Off,
        _ => ProgressMode::default_for_tty(),
    };
    let progress = progress_mode.reporter();

    match cli.command {
        Commands::Update {
            force,
            dry_run,
            curated_limit,
            registry_limit,
            search_limit,
            topics_limit,
            npm_limit,
        } => {
            if let Some(n) = curated_limit {
                cfg.discovery.curated_limit = n;
            }
            if let Some(n) = registry_limit {
                cfg.discovery.registry_limit = n;
            }
            if let Some(n) = search_limit {
                cfg.discovery.search_limit = n;
            }
            if let Some(n) = topics_limit {
                cfg.discovery.topics_limit = n;
            }
            if let Some(n) = npm_limit {
                cfg.discovery.npm_limit = n;
            }

            let opts = UpdateOptions { force, dry_run };
            pipeline::run_update(&cfg, &opts, progress.as_ref()).await?;
        }
        Commands::Discover => {
            let registry = DiscovererRegistry::from_config(&cfg);
            let entries = dedupe_entries(registry.discover_all().await);
            println!("{} unique capabilities:", entries.len());
            for entry in &entries {
                println!("  {:<40} {:<14} {}", entry.slug(), entry.source, entry.name);
            }
        }
        Commands::Sources => {
            list_sources(&cfg);
        }
    }

    Ok(())
}

/// Print the discoverer roster with configuration status.
fn list_sources(cfg: &config::Config) {
    let registry = DiscovererRegistry::from_config(cfg);

    println!("{:<18} {:<14} {:<8} STATUS", "DISCOVERER", "SOURCE", "LIMIT");
    for (discoverer, limit) in registry.discoverers() {
        let status = if limit == 0 { "disabled (limit 0)" } else { "OK" };
        println!(
            "{:<18} {:<14} {:<8} {}",
            discoverer.name(),
            discoverer.source(),
            limit,
            status
        );
    }

    if cfg.discovery.hub_url.is_none() {
        println!("{:<18} {:<14} {:<8} NOT CONFIGURED (no hub_url)", "skills-hub", "skillhub", "-");
    }
    if cfg.github.token.is_empty() {
        println!("\nnote: GITHUB_TOKEN is not set; GitHub API calls run at the anonymous quota.");
    }
}
