//! Command-line argument parsing for the dataset cache
//!
//! This module defines the CLI structure using clap derive macros. The CLI
//! administers a snapshot store: it locates, inspects, verifies and flushes
//! snapshots, and manages the configuration file.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::app::DatasetRef;

/// Dataset Cache - administer cached dataset snapshots
#[derive(Parser, Debug)]
#[command(
    name = "dataset-cache",
    version,
    about = "Inspect, verify and flush cached dataset snapshots",
    long_about = "Administrative tool for the two-tier dataset cache.
Snapshots are versioned binary files, one per entity type and dataset."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Snapshot root directory, overriding the configuration
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the snapshot path for an entity type of a dataset
    Path(PathArgs),

    /// Show snapshot store statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify snapshot integrity
    Verify {
        /// Only verify this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Only verify datasets with this id
        #[arg(short, long)]
        dataset: Option<String>,

        /// Delete snapshots that fail verification
        #[arg(long)]
        prune: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove snapshots so they are regenerated on next use
    Invalidate(InvalidateArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the path command
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Dataset namespace
    #[arg(short, long)]
    pub namespace: String,

    /// Dataset id
    #[arg(short, long)]
    pub dataset: String,

    /// Entity type name
    #[arg(short, long)]
    pub entity: String,

    /// Entity schema version
    #[arg(long, default_value = "1")]
    pub version: u32,
}

/// Arguments for the invalidate command
#[derive(Args, Debug, Clone)]
#[command(group(
    ArgGroup::new("scope")
        .required(true)
        .args(["all", "namespace", "dataset"])
))]
pub struct InvalidateArgs {
    /// Remove every snapshot
    #[arg(long)]
    pub all: bool,

    /// Remove every snapshot of a namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Remove every snapshot of one dataset, given as NAMESPACE/ID
    #[arg(short, long, value_name = "NAMESPACE/ID", value_parser = parse_dataset_ref)]
    pub dataset: Option<DatasetRef>,
}

/// Invalidation scope selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidateScope {
    All,
    Namespace(String),
    Dataset(DatasetRef),
}

impl InvalidateArgs {
    pub fn scope(&self) -> InvalidateScope {
        match (&self.namespace, &self.dataset) {
            (_, Some(dataset)) => InvalidateScope::Dataset(dataset.clone()),
            (Some(namespace), None) => InvalidateScope::Namespace(namespace.clone()),
            (None, None) => InvalidateScope::All,
        }
    }
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Where to write the file (default: user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },

    /// Print the effective configuration
    Show,
}

/// Parse `NAMESPACE/ID` into a dataset reference
pub fn parse_dataset_ref(value: &str) -> Result<DatasetRef, String> {
    let (namespace, id) = value
        .split_once('/')
        .ok_or_else(|| format!("expected NAMESPACE/ID, got '{}'", value))?;

    let dataset = DatasetRef::new(namespace, id);
    dataset.validate().map_err(|e| e.to_string())?;
    Ok(dataset)
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log filter level, falling back to the configured level without flags
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_string()
        }
    }
}
