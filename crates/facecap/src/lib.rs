//! `facecap` - enrollment capture core for a facial-recognition attendance system
//!
//! This library provides the staged enrollment flow used to add a person to
//! the recognition model: a fixed sequence of capture stages, a bounded
//! FIFO buffer of captured images, and a single-owner session task that
//! coordinates timers, the capture source, and the training service. It
//! also includes the thin client for the attendance backend.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod attendance;
pub mod buffer;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod sequencer;
pub mod session;
pub mod sim;
pub mod training;

pub use attendance::{AttendanceClient, AttendanceRecord};
pub use buffer::CaptureBuffer;
pub use capture::{CaptureRecord, CaptureSource, CapturedFrame, Position};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use sequencer::{EnrollmentSequencer, SessionStatus, StageDescriptor};
pub use session::{EnrollmentSession, SessionHandle, SessionSettings, SessionView};
pub use training::{TrainingReport, TrainingService};
