//! Command-line interface for chat-forge.
//!
//! Provides commands for conversation generation, manifest merging, output
//! formatting and taxonomy inspection.

mod commands;

pub use commands::{parse_cli, resolve_config, run, run_with_cli, Cli, Commands};
