//! Error types for facecap.
//!
//! This module defines all error types used throughout the facecap crate,
//! providing detailed context for debugging and user-friendly error messages.

use thiserror::Error;

use crate::sequencer::SessionStatus;

/// The main error type for facecap operations.
#[derive(Error, Debug)]
pub enum Error {
    // === State Machine Errors ===
    /// An operation was called while the sequencer was in a status that
    /// does not permit it.
    #[error("cannot {operation} while session is {status}")]
    InvalidTransition {
        /// The operation that was attempted.
        operation: &'static str,
        /// The status the sequencer was in.
        status: SessionStatus,
    },

    /// A finalize call was made while a previous one is still outstanding.
    #[error("a finalize is already in flight")]
    FinalizeInFlight,

    /// Finalize was requested with no captured records to train on.
    #[error("cannot finalize: capture buffer is empty")]
    EmptyBuffer,

    /// The enrollment session task has shut down.
    #[error("enrollment session is no longer running")]
    SessionClosed,

    // === Collaborator Errors ===
    /// The capture source failed to produce a batch.
    #[error("capture source '{name}' failed: {message}")]
    CaptureSource {
        /// Name of the capture source.
        name: &'static str,
        /// Description of what went wrong.
        message: String,
    },

    /// The training service reported a failure.
    #[error("training failed: {message}")]
    Training {
        /// Description of what went wrong.
        message: String,
    },

    // === Attendance Errors ===
    /// The attendance endpoint could not be reached.
    #[error("attendance request failed: {0}")]
    AttendanceRequest(#[from] reqwest::Error),

    /// The attendance endpoint returned a non-success HTTP status.
    #[error("attendance endpoint returned HTTP {status}")]
    AttendanceStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The attendance response body did not have the expected shape.
    #[error("unexpected attendance response: {message}")]
    AttendanceDecode {
        /// Description of what was wrong with the body.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for facecap operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid-transition error.
    #[must_use]
    pub fn invalid_transition(operation: &'static str, status: SessionStatus) -> Self {
        Self::InvalidTransition { operation, status }
    }

    /// Create a capture source error.
    #[must_use]
    pub fn capture_source(name: &'static str, message: impl Into<String>) -> Self {
        Self::CaptureSource {
            name,
            message: message.into(),
        }
    }

    /// Create a training error.
    #[must_use]
    pub fn training(message: impl Into<String>) -> Self {
        Self::Training {
            message: message.into(),
        }
    }

    /// Create an attendance decode error.
    #[must_use]
    pub fn attendance_decode(message: impl Into<String>) -> Self {
        Self::AttendanceDecode {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a rejected state transition.
    #[must_use]
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }

    /// Check if this error came from a collaborator rather than the core.
    #[must_use]
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::CaptureSource { .. } | Self::Training { .. })
    }
}
