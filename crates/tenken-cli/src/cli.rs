//! CLI definition using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tenken_types::{InspectionStatus, OutputFormat};

#[derive(Parser)]
#[command(name = "tenken-checker")]
#[command(author = "yuuji")]
#[command(version)]
#[command(about = "Vehicle inspection checklist synced with a shared spreadsheet")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Operational status accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Standby,
    Stop,
    Skip,
    #[value(name = "7days")]
    SevenDays,
}

impl From<StatusArg> for InspectionStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Standby => InspectionStatus::Standby,
            StatusArg::Stop => InspectionStatus::Stop,
            StatusArg::Skip => InspectionStatus::Skip,
            StatusArg::SevenDays => InspectionStatus::SevenDaysRule,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pull the sheet and merge it into local partitions
    Sync {
        /// Push local state before pulling
        #[arg(long)]
        push: bool,

        /// Discard local state of a partition before merging (repeatable)
        #[arg(long, value_name = "PARTITION", conflicts_with = "reset_all")]
        reset: Vec<String>,

        /// Discard local state of every partition
        #[arg(long)]
        reset_all: bool,

        /// Reload partition definitions from the endpoint first
        #[arg(long)]
        refresh_config: bool,
    },

    /// Show the checklist of a partition
    List {
        /// Partition name or slug
        partition: String,
    },

    /// Show progress counts
    Counts {
        /// Partition name or slug; all partitions if omitted
        partition: Option<String>,
    },

    /// Mark a vehicle inspected today
    Check {
        partition: String,

        /// Plate or display index (e.g. Y3)
        key: String,
    },

    /// Clear the inspected mark
    Uncheck {
        partition: String,

        /// Plate or display index
        key: String,
    },

    /// Set a vehicle's operational status
    SetStatus {
        partition: String,

        /// Plate or display index
        key: String,

        #[arg(value_enum)]
        status: StatusArg,
    },

    /// Set the last inspection date
    SetDate {
        partition: String,

        /// Plate or display index
        key: String,

        /// Date (YYYY-MM-DD). Today if omitted.
        date: Option<String>,

        /// Clear the date instead
        #[arg(long, conflicts_with = "date")]
        clear: bool,
    },

    /// Clear all local records of a partition
    Reset {
        partition: String,
    },

    /// List configured cities
    Cities {
        /// Include stopped cities
        #[arg(long)]
        all: bool,
    },

    /// Import a pasted list (station, model, plate per line) into a partition
    Import {
        partition: String,

        /// Text file, tab or comma separated (UTF-8 or CP932)
        file: PathBuf,
    },

    /// Export the checklist to Excel
    Export {
        /// Output Excel file path
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Set spreadsheet endpoint URL
        #[arg(long)]
        set_endpoint: Option<String>,

        /// Set sheet name passed on pull
        #[arg(long)]
        set_sheet: Option<String>,

        /// Set request timeout in seconds
        #[arg(long)]
        set_timeout: Option<u64>,

        /// Set default output format
        #[arg(long)]
        set_output: Option<OutputFormat>,

        /// Push before every pull
        #[arg(long)]
        set_push_before_pull: Option<bool>,

        /// Reset to defaults
        #[arg(long)]
        reset: bool,
    },
}
