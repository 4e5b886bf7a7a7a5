//! Training service interface.
//!
//! Finalizing an enrollment hands the retained capture set to a training
//! collaborator. The session makes exactly one call per finalize and never
//! retries on its own; failures go back to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::CaptureRecord;
use crate::error::Result;

/// Outcome of a successful training call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Number of images the model was trained with.
    pub image_count: usize,
    /// When training finished.
    pub finished_at: DateTime<Utc>,
}

impl TrainingReport {
    /// Create a report for the given number of images, finished now.
    #[must_use]
    pub fn new(image_count: usize) -> Self {
        Self {
            image_count,
            finished_at: Utc::now(),
        }
    }
}

/// Trait for the model-training collaborator.
///
/// Implementors receive the retained capture set and either succeed with a
/// [`TrainingReport`] or fail. A real implementation would talk to the
/// recognition backend; the `sim` module provides a stand-in.
#[async_trait::async_trait]
pub trait TrainingService: Send + Sync {
    /// The name of this training service (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Train the model on the given records.
    ///
    /// # Errors
    ///
    /// Returns an error if the training backend is unavailable or rejects
    /// the capture set.
    async fn train(&self, records: &[CaptureRecord]) -> Result<TrainingReport>;
}
