//! Command-line interface for facecap.
//!
//! This module provides the CLI structure and command handlers for the
//! `facecap` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{AttendanceCommand, ConfigCommand, EnrollCommand, StagesCommand};

/// facecap - enrollment capture for facial-recognition attendance
///
/// Drives the staged capture flow used to enroll a person: a fixed stage
/// sequence, a bounded capture buffer, and a single training call at the
/// end. Also exposes the attendance endpoint client.
#[derive(Debug, Parser)]
#[command(name = "facecap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a simulated enrollment session end to end
    Enroll(EnrollCommand),

    /// List the enrollment stage sequence
    Stages(StagesCommand),

    /// Fetch attendance records from the backend
    Attendance(AttendanceCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
