//! CLI command definitions and parsing
use crate::model::SourceTag;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "hostsync",
    version,
    author = "neur0map",
    about = "Host inventory ETL for Qualys and CrowdStrike",
    long_about = "hostsync pulls host records from the Qualys and CrowdStrike inventory APIs, \
                  normalizes and deduplicates them, stores them in a local SQLite database and \
                  renders summary charts."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/hostsync/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also append log lines to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline: fetch, normalize, deduplicate, store, chart
    Run {
        /// Skip chart and summary generation
        #[arg(long)]
        no_report: bool,
    },

    /// Fetch one source and print its raw records
    Fetch {
        /// Source to fetch
        #[arg(value_parser = parse_source)]
        source: SourceTag,

        /// Print records as JSON instead of a count
        #[arg(long)]
        json: bool,
    },

    /// Summarize the hosts currently in the store
    Summary {
        /// Show the summary in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

fn parse_source(value: &str) -> Result<SourceTag, String> {
    value.to_lowercase().parse()
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
