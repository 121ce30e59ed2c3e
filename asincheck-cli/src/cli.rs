//! Command-line definitions for the `asincheck` binary
//!
//! ## Commands
//!
//! - `login` / `logout` / `whoami` - session management
//! - `check` - run a batch of ASIN eligibility checks
//! - `usage` - show plan, usage and billing
//! - `config` - write or show configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::results::SortKey;

/// asincheck - Amazon ASIN eligibility checker
#[derive(Parser, Debug)]
#[command(name = "asincheck")]
#[command(about = "Check Amazon ASIN selling eligibility", long_about = None)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides ASINCHECK_BASE_URL and the config file)
    #[arg(long, global = true)]
    pub base_url: Option<String>,
}

/// Result table ordering
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CliSortKey {
    /// Order results were received, newest first
    #[default]
    Insertion,
    Asin,
    Title,
    Status,
}

impl From<CliSortKey> for SortKey {
    fn from(key: CliSortKey) -> Self {
        match key {
            CliSortKey::Insertion => SortKey::Insertion,
            CliSortKey::Asin => SortKey::Asin,
            CliSortKey::Title => SortKey::Title,
            CliSortKey::Status => SortKey::Status,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,

        /// Password (prompted from stdin when omitted)
        #[arg(long, env = "ASINCHECK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Check ASINs one at a time
    Check {
        /// ASINs (whitespace or comma separated); read from stdin when empty
        asins: Vec<String>,

        /// Read ASINs from a file
        #[arg(short, long, conflicts_with = "asins")]
        file: Option<PathBuf>,

        /// Result table order
        #[arg(long, value_enum, default_value = "insertion")]
        sort: CliSortKey,

        /// Descending order
        #[arg(long)]
        desc: bool,

        /// Write results as CSV to this path
        #[arg(long, conflicts_with = "export_default")]
        export: Option<PathBuf>,

        /// Write results as CSV to asin-results-YYYY-MM-DD.csv
        #[arg(long)]
        export_default: bool,
    },

    /// Show plan, usage and billing
    Usage,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a config file with the compiled defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the resolved configuration
    Show,
}
