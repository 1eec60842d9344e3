//! Command-Line Interface

use crate::capture::types::TriggerKey;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drag Scroll - hold a key, move the pointer, and the content scrolls
#[derive(Parser, Debug)]
#[command(name = "drag-scroll")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scroll the content under the pointer while the trigger key is held
    Run {
        /// Trigger key (overrides config)
        #[arg(short, long, value_enum)]
        key: Option<TriggerKey>,

        /// Scroll sensitivity multiplier (overrides config)
        #[arg(short, long)]
        sensitivity: Option<f64>,

        /// Momentum decay per tick, between 0 and 1 (overrides config)
        #[arg(short, long)]
        deceleration: Option<f64>,
    },

    /// Record raw input events to a trace file
    Record {
        /// Recording duration in seconds (0 = until stopped)
        #[arg(short, long, default_value = "30")]
        duration: u64,

        /// Output file name (without extension)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Replay a trace offline and print the scroll deltas it produces
    Replay {
        /// Trace file
        trace: PathBuf,

        /// Print the full playback as JSON
        #[arg(long)]
        json: bool,
    },

    /// List recorded traces
    List {
        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Check accessibility access
    Permissions {
        /// Show the system prompt if access is missing
        #[arg(short, long)]
        request: bool,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "tuning.sensitivity", "trigger.key")
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a specific configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the trace directory
    pub fn traces_dir() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".drag_scroll").join("traces"))
            .unwrap_or_else(|| PathBuf::from("traces"))
    }
}
