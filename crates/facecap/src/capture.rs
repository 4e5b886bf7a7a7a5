//! Core capture types for facecap.
//!
//! This module defines the fundamental data structures for representing
//! captured enrollment images and the capability trait behind which a real
//! camera (or a simulated one) sits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed set of head positions a capture can be tagged with.
///
/// Labels are assigned cyclically within a batch: the first frame of a batch
/// is `Frontal`, the second `Left`, and so on, wrapping after seven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Face straight toward the camera.
    Frontal,
    /// Head turned to the subject's left.
    Left,
    /// Head turned to the subject's right.
    Right,
    /// Chin raised.
    Up,
    /// Chin lowered.
    Down,
    /// Head turned diagonally left.
    DiagonalLeft,
    /// Head turned diagonally right.
    DiagonalRight,
}

impl Position {
    /// All positions, in cycling order.
    pub const ALL: [Self; 7] = [
        Self::Frontal,
        Self::Left,
        Self::Right,
        Self::Up,
        Self::Down,
        Self::DiagonalLeft,
        Self::DiagonalRight,
    ];

    /// The position assigned to the frame at `index` within a batch.
    #[must_use]
    pub fn for_batch_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frontal => write!(f, "frontal"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::DiagonalLeft => write!(f, "diagonal_left"),
            Self::DiagonalRight => write!(f, "diagonal_right"),
        }
    }
}

/// A raw frame as produced by a [`CaptureSource`].
///
/// Frames carry no identity or stage tag; the session assigns those when it
/// absorbs the batch into the buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFrame {
    /// Opaque handle to the image data (file path, URL, device buffer id).
    /// The core stores the reference and never touches pixel data.
    pub image_ref: String,

    /// The head position this frame was tagged with at capture time.
    pub position: Position,
}

impl CapturedFrame {
    /// Create a new frame with the given image reference and position.
    #[must_use]
    pub fn new(image_ref: impl Into<String>, position: Position) -> Self {
        Self {
            image_ref: image_ref.into(),
            position,
        }
    }
}

/// A captured enrollment image with full session metadata.
///
/// Represents one retained entry in the capture buffer. All fields are
/// assigned at creation and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Unique, monotonically increasing identifier assigned by the session.
    pub id: u64,

    /// Opaque handle to the image data.
    pub image_ref: String,

    /// The sequencer stage that was active when this frame was produced.
    pub stage_index: usize,

    /// When this capture occurred.
    pub captured_at: DateTime<Utc>,

    /// The head position this frame was tagged with.
    pub position: Position,
}

impl CaptureRecord {
    /// Build a record from a raw frame, stamping identity, stage, and time.
    #[must_use]
    pub fn from_frame(frame: CapturedFrame, id: u64, stage_index: usize) -> Self {
        Self {
            id,
            image_ref: frame.image_ref,
            stage_index,
            captured_at: Utc::now(),
            position: frame.position,
        }
    }
}

/// Trait for capture devices.
///
/// Implementors provide the actual mechanism for producing enrollment frames
/// for a given stage (a camera frame-grabber in production, a simulated
/// source in tests and demos). The sequencer and buffer only ever see this
/// interface.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// The name of this capture source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Produce a batch of frames for the given stage.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unavailable or fails mid-capture.
    async fn request_capture(
        &self,
        stage_index: usize,
    ) -> Result<Vec<CapturedFrame>, crate::error::Error>;

    /// Release the device.
    ///
    /// Called on session cancel/reset so an outstanding device claim does
    /// not outlive the session. Must be safe to call when nothing is held.
    async fn cancel(&self);
}
