//! `facecap` - CLI for the enrollment capture core
//!
//! This binary drives simulated enrollment sessions, inspects the stage
//! sequence, queries the attendance backend, and manages configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use facecap::cli::{AttendanceCommand, Cli, Command, ConfigCommand, EnrollCommand, StagesCommand};
use facecap::sequencer::default_stages;
use facecap::session::{EnrollmentSession, SessionHandle};
use facecap::sim::{SimCamera, SimTrainer};
use facecap::{init_logging, AttendanceClient, Config, SessionStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Enroll(cmd) => handle_enroll(&config, &cmd).await,
        Command::Stages(cmd) => handle_stages(&cmd),
        Command::Attendance(cmd) => handle_attendance(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_enroll(config: &Config, cmd: &EnrollCommand) -> anyhow::Result<()> {
    let camera = match cmd.seed {
        Some(seed) => SimCamera::seeded(config.capture.batch_min, config.capture.batch_max, seed),
        None => SimCamera::new(config.capture.batch_min, config.capture.batch_max),
    };
    let trainer = SimTrainer::new(config.simulated_training_duration());

    let handle = EnrollmentSession::spawn(
        default_stages(),
        config.session_settings(),
        Arc::new(camera),
        Arc::new(trainer),
    )?;

    handle.start().await.context("failed to start enrollment")?;
    wait_for_last_stage(&handle).await?;

    if cmd.retry_once {
        handle.retry().await.context("retry failed")?;
        wait_for_last_stage(&handle).await?;
    }

    if cmd.no_finalize {
        print_session(&handle, cmd.json)?;
        return Ok(());
    }

    let report = handle.finalize().await.context("training failed")?;
    print_session(&handle, cmd.json)?;
    if !cmd.json {
        println!();
        println!(
            "Training complete: {} images at {}",
            report.image_count, report.finished_at
        );
    }
    Ok(())
}

/// Block until the session has captured a batch at the final stage.
async fn wait_for_last_stage(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut updates = handle.subscribe();
    loop {
        let view = handle.view();
        if view.stage_index + 1 == view.stage_count && view.status == SessionStatus::Capturing {
            return Ok(());
        }
        updates
            .changed()
            .await
            .context("enrollment session stopped unexpectedly")?;
    }
}

fn print_session(handle: &SessionHandle, json: bool) -> anyhow::Result<()> {
    let view = handle.view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Enrollment session");
    println!("------------------");
    println!("Status:   {}", view.status);
    println!("Stage:    {} of {}", view.stage_index + 1, view.stage_count);
    println!("Captures: {}", view.records.len());
    for record in &view.records {
        println!(
            "  #{:<3} stage {}  {:<14} {}",
            record.id, record.stage_index, record.position, record.image_ref
        );
    }
    Ok(())
}

fn handle_stages(cmd: &StagesCommand) -> anyhow::Result<()> {
    let stages = default_stages();
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&stages)?);
        return Ok(());
    }

    println!("Enrollment stages");
    println!("-----------------");
    for (index, stage) in stages.iter().enumerate() {
        println!("{}. {}", index + 1, stage.title);
        println!("   {}", stage.description);
        for instruction in &stage.instructions {
            println!("   - {instruction}");
        }
    }
    Ok(())
}

async fn handle_attendance(config: &Config, cmd: &AttendanceCommand) -> anyhow::Result<()> {
    let client = AttendanceClient::new(&config.attendance)?;
    let records = client
        .fetch_records()
        .await
        .with_context(|| format!("could not fetch attendance from {}", client.endpoint()))?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("Attendance records ({})", records.len());
    println!("----------------------");
    for record in &records {
        println!(
            "{:<5} {:<25} {:<12} {:<10} {:<12} {}",
            record.id, record.name, record.document_id, record.time, record.date, record.department
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Capture]");
                println!("  Buffer capacity:    {}", config.capture.buffer_capacity);
                println!(
                    "  Batch size:         {}-{}",
                    config.capture.batch_min, config.capture.batch_max
                );
                println!("  Advance delay (ms): {}", config.capture.advance_delay_ms);
                println!("  Retry delay (ms):   {}", config.capture.retry_delay_ms);
                println!();
                println!("[Training]");
                println!(
                    "  Simulated (ms):     {}",
                    config.training.simulated_duration_ms
                );
                println!();
                println!("[Attendance]");
                println!("  Base URL:           {}", config.attendance.base_url);
                println!(
                    "  Timeout (s):        {}",
                    config.attendance.request_timeout_secs
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
