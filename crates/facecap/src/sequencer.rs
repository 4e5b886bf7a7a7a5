//! Enrollment step sequencer.
//!
//! A fixed, ordered sequence of capture stages with exactly one stage active
//! at a time. The sequencer is a pure synchronous state machine: it decides
//! which transitions are legal and which stage a capture batch belongs to,
//! but owns no timers, no buffer, and no collaborators. The session task
//! (`crate::session`) drives it and acts on the capture requests it emits.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Status of an enrollment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No enrollment in progress.
    Idle,
    /// Actively stepping through capture stages.
    Capturing,
    /// A training call is outstanding.
    Finalizing,
    /// Training succeeded; the session is done.
    Complete,
    /// The user cancelled; collaborators have been released.
    Cancelled,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Capturing => write!(f, "capturing"),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Complete => write!(f, "complete"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One stage of the enrollment sequence.
///
/// The stage set is fixed at construction and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Short title shown as the stage heading.
    pub title: String,
    /// Longer description of what the subject should do.
    pub description: String,
    /// Checklist-style hints for the operator.
    pub instructions: Vec<String>,
}

impl StageDescriptor {
    /// Create a stage descriptor.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        instructions: Vec<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            instructions,
        }
    }
}

/// The stage sequence observed in the enrollment flow this crate was built
/// for: frontal pose, a slight angle variation, then data collection.
#[must_use]
pub fn default_stages() -> Vec<StageDescriptor> {
    vec![
        StageDescriptor::new(
            "Frontal pose",
            "Face the camera directly with good lighting",
            vec![
                "Good lighting".to_string(),
                "Face centered".to_string(),
                "Eyes toward the camera".to_string(),
            ],
        ),
        StageDescriptor::new(
            "Slight angle variation",
            "Turn the head slightly to the left (15-20 degrees)",
            vec![
                "Gentle turn to the left".to_string(),
                "Keep eyes open".to_string(),
                "Face fully visible".to_string(),
            ],
        ),
        StageDescriptor::new(
            "Data collection",
            "Collect the remaining images and prepare to train",
            vec![
                "Collect the image set".to_string(),
                "Review the captures".to_string(),
                "Train the model".to_string(),
            ],
        ),
    ]
}

/// Request for the capture source to produce a batch for one stage.
///
/// Emitted by `start`, `advance`, and `retry_capture`; consumed by the
/// session, which forwards it to the capture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// The stage the batch belongs to.
    pub stage_index: usize,
}

/// Drives a fixed ordered set of capture stages, one active at a time.
///
/// Transitions:
///
/// ```text
/// Idle ──start──▶ Capturing ──begin_finalize──▶ Finalizing ──▶ Complete
///                  │  ▲                            │
///                  │  └────────fail_finalize───────┘
///                  └──cancel──▶ Cancelled
/// ```
///
/// `reset` returns to `Idle` from any status; `start` restarts from any
/// status except `Finalizing` (re-entry while `Capturing` is a documented
/// reset-and-restart).
#[derive(Debug, Clone)]
pub struct EnrollmentSequencer {
    stages: Vec<StageDescriptor>,
    current: usize,
    status: SessionStatus,
}

impl EnrollmentSequencer {
    /// Create a sequencer over the given stage sequence.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `stages` is empty.
    pub fn new(stages: Vec<StageDescriptor>) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::ConfigValidation {
                message: "enrollment requires at least one stage".to_string(),
            });
        }
        Ok(Self {
            stages,
            current: 0,
            status: SessionStatus::Idle,
        })
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Index of the active stage, always in `[0, stage_count)`.
    #[must_use]
    pub fn current_stage_index(&self) -> usize {
        self.current
    }

    /// Number of stages in the sequence.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// The full stage sequence.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }

    /// Descriptor of the active stage.
    #[must_use]
    pub fn current_stage(&self) -> &StageDescriptor {
        &self.stages[self.current]
    }

    /// Whether the active stage is the last one.
    #[must_use]
    pub fn is_last_stage(&self) -> bool {
        self.current == self.stages.len() - 1
    }

    /// Begin (or restart) capturing from stage 0.
    ///
    /// Calling while already `Capturing` is a reset-and-restart, matching
    /// the enrollment flow this was modeled on. `Complete` and `Cancelled`
    /// sessions may also be restarted.
    ///
    /// # Errors
    ///
    /// Rejected while a finalize is outstanding.
    pub fn start(&mut self) -> Result<CaptureRequest> {
        if self.status == SessionStatus::Finalizing {
            return Err(Error::invalid_transition("start", self.status));
        }
        self.status = SessionStatus::Capturing;
        self.current = 0;
        Ok(CaptureRequest { stage_index: 0 })
    }

    /// Move to the next stage and request a batch for it.
    ///
    /// At the final stage this is a no-op returning `None`; the index never
    /// leaves bounds and the sequencer waits for an explicit finalize.
    ///
    /// # Errors
    ///
    /// Rejected unless the session is `Capturing`.
    pub fn advance(&mut self) -> Result<Option<CaptureRequest>> {
        if self.status != SessionStatus::Capturing {
            return Err(Error::invalid_transition("advance", self.status));
        }
        if self.is_last_stage() {
            return Ok(None);
        }
        self.current += 1;
        Ok(Some(CaptureRequest {
            stage_index: self.current,
        }))
    }

    /// Restart capture from stage 0 while staying in `Capturing`.
    ///
    /// This is a full restart, not a per-stage retry: the caller is expected
    /// to discard every captured record alongside this call.
    ///
    /// # Errors
    ///
    /// Rejected unless the session is `Capturing`.
    pub fn retry_capture(&mut self) -> Result<CaptureRequest> {
        if self.status != SessionStatus::Capturing {
            return Err(Error::invalid_transition("retry", self.status));
        }
        self.current = 0;
        Ok(CaptureRequest { stage_index: 0 })
    }

    /// Enter `Finalizing` ahead of the training call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FinalizeInFlight`] if a finalize is already
    /// outstanding, or an invalid-transition error if not `Capturing`.
    pub fn begin_finalize(&mut self) -> Result<()> {
        match self.status {
            SessionStatus::Finalizing => Err(Error::FinalizeInFlight),
            SessionStatus::Capturing => {
                self.status = SessionStatus::Finalizing;
                Ok(())
            }
            status => Err(Error::invalid_transition("finalize", status)),
        }
    }

    /// Record a successful training call.
    ///
    /// # Errors
    ///
    /// Internal error if no finalize was in flight.
    pub fn complete_finalize(&mut self) -> Result<()> {
        if self.status != SessionStatus::Finalizing {
            return Err(Error::internal(format!(
                "complete_finalize called while {}",
                self.status
            )));
        }
        self.status = SessionStatus::Complete;
        Ok(())
    }

    /// Record a failed training call, returning to `Capturing`.
    ///
    /// The failed finalize is never retried automatically; the caller
    /// surfaces the error and the user may re-trigger.
    ///
    /// # Errors
    ///
    /// Internal error if no finalize was in flight.
    pub fn fail_finalize(&mut self) -> Result<()> {
        if self.status != SessionStatus::Finalizing {
            return Err(Error::internal(format!(
                "fail_finalize called while {}",
                self.status
            )));
        }
        self.status = SessionStatus::Capturing;
        Ok(())
    }

    /// Cancel the session. Valid from any status.
    pub fn cancel(&mut self) {
        self.status = SessionStatus::Cancelled;
        self.current = 0;
    }

    /// Return to `Idle` at stage 0. Valid from any status.
    pub fn reset(&mut self) {
        self.status = SessionStatus::Idle;
        self.current = 0;
    }
}
