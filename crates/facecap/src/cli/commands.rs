//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Enroll command arguments.
#[derive(Debug, Args)]
pub struct EnrollCommand {
    /// Seed for the simulated camera (deterministic batches)
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Discard everything and recapture once before finalizing
    #[arg(long)]
    pub retry_once: bool,

    /// Skip finalizing (leave the session capturing and exit)
    #[arg(long)]
    pub no_finalize: bool,

    /// Output the final session view as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Attendance command arguments.
#[derive(Debug, Args)]
pub struct AttendanceCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Stages command arguments.
#[derive(Debug, Args)]
pub struct StagesCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}
