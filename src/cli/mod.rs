//! Command-line interface components
//!
//! This module contains CLI-specific code for the dataset cache
//! administration tool: argument parsing and command handlers.

pub mod args;
pub mod commands;

pub use args::{
    parse_dataset_ref, Cli, Commands, ConfigAction, ConfigArgs, GlobalArgs, InvalidateArgs,
    InvalidateScope, PathArgs,
};
pub use commands::{
    handle_config, handle_invalidate, handle_path, handle_stats, handle_verify, resolve_root,
};
