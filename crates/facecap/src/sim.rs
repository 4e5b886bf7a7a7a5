//! Simulated collaborators.
//!
//! The enrollment core only ever talks to a [`CaptureSource`] and a
//! [`TrainingService`]; these implementations stand in for the camera and
//! the recognition backend in demos and tests. Both are deterministic when
//! seeded, so timing-sensitive session tests stay reproducible.

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::capture::{CaptureSource, CapturedFrame, Position};
use crate::error::{Error, Result};
use crate::training::{TrainingReport, TrainingService};

/// Placeholder image handles the simulated camera draws from.
const PLACEHOLDER_IMAGES: [&str; 9] = [
    "placeholder://300x300/frontal",
    "placeholder://300x300/left",
    "placeholder://300x300/right",
    "placeholder://300x300/up",
    "placeholder://300x300/down",
    "placeholder://300x300/diagonal-left",
    "placeholder://300x300/diagonal-right",
    "placeholder://300x300/gaze-up",
    "placeholder://300x300/gaze-down",
];

/// A simulated camera producing 1 to N placeholder frames per request.
///
/// Frame positions are assigned cyclically by batch-local index, the same
/// way a real grabber would tag poses in a guided capture.
#[derive(Debug)]
pub struct SimCamera {
    batch_min: usize,
    batch_max: usize,
    rng: Mutex<StdRng>,
    fail: bool,
}

impl SimCamera {
    /// Create a camera producing between `batch_min` and `batch_max` frames
    /// per request, seeded from system entropy.
    #[must_use]
    pub fn new(batch_min: usize, batch_max: usize) -> Self {
        Self {
            batch_min,
            batch_max,
            rng: Mutex::new(StdRng::from_os_rng()),
            fail: false,
        }
    }

    /// Create a deterministically seeded camera for tests.
    #[must_use]
    pub fn seeded(batch_min: usize, batch_max: usize, seed: u64) -> Self {
        Self {
            batch_min,
            batch_max,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            fail: false,
        }
    }

    /// Create a camera whose every request fails, for error-path tests.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            batch_min: 1,
            batch_max: 1,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for SimCamera {
    fn name(&self) -> &'static str {
        "sim-camera"
    }

    async fn request_capture(&self, stage_index: usize) -> Result<Vec<CapturedFrame>> {
        if self.fail {
            return Err(Error::capture_source(self.name(), "simulated device failure"));
        }

        let (count, picks) = {
            let mut rng = self.rng.lock().map_err(|_| {
                Error::capture_source(self.name(), "rng mutex poisoned")
            })?;
            let count = rng.random_range(self.batch_min..=self.batch_max);
            let picks: Vec<usize> = (0..count)
                .map(|_| rng.random_range(0..PLACEHOLDER_IMAGES.len()))
                .collect();
            (count, picks)
        };

        let frames: Vec<CapturedFrame> = picks
            .into_iter()
            .enumerate()
            .map(|(i, pick)| {
                CapturedFrame::new(PLACEHOLDER_IMAGES[pick], Position::for_batch_index(i))
            })
            .collect();

        debug!(stage_index, count, "simulated capture batch");
        Ok(frames)
    }

    async fn cancel(&self) {
        debug!("simulated camera released");
    }
}

/// A simulated trainer that sleeps for a configured duration and reports
/// success (or a canned failure, for tests).
#[derive(Debug)]
pub struct SimTrainer {
    duration: Duration,
    fail: bool,
}

impl SimTrainer {
    /// Create a trainer that succeeds after `duration`.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            fail: false,
        }
    }

    /// Create a trainer that fails after `duration`, for error-path tests.
    #[must_use]
    pub fn failing(duration: Duration) -> Self {
        Self {
            duration,
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl TrainingService for SimTrainer {
    fn name(&self) -> &'static str {
        "sim-trainer"
    }

    async fn train(&self, records: &[crate::capture::CaptureRecord]) -> Result<TrainingReport> {
        tokio::time::sleep(self.duration).await;
        if self.fail {
            return Err(Error::training("simulated training failure"));
        }
        debug!(image_count = records.len(), "simulated training finished");
        Ok(TrainingReport::new(records.len()))
    }
}
