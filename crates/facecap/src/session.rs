//! Enrollment session coordination.
//!
//! The sequencer and buffer are owned by a single tokio task; every
//! mutation flows through that task's message queue, so no two operations
//! ever run concurrently against the same pair. Timers and the training
//! call never touch state directly either: they post messages back to the
//! task, tagged with an epoch so anything scheduled before a
//! start/retry/cancel/reset is discarded instead of firing late.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::buffer::CaptureBuffer;
use crate::capture::{CaptureRecord, CaptureSource};
use crate::error::{Error, Result};
use crate::sequencer::{CaptureRequest, EnrollmentSequencer, SessionStatus, StageDescriptor};
use crate::training::{TrainingReport, TrainingService};

/// Timing and capacity knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capture buffer capacity.
    pub buffer_capacity: usize,
    /// Delay before auto-advancing to the next stage after a batch.
    pub advance_delay: Duration,
    /// Delay before recapturing stage 0 after a retry.
    pub retry_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 7,
            advance_delay: Duration::from_millis(1500),
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Read-only snapshot of a session, published after every mutation.
///
/// This is the interface the rendering layer consumes; it never reaches
/// into the sequencer or buffer directly.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    /// Current session status.
    pub status: SessionStatus,
    /// Index of the active stage.
    pub stage_index: usize,
    /// Total number of stages.
    pub stage_count: usize,
    /// Retained captures in insertion order.
    pub records: Vec<CaptureRecord>,
}

/// External commands accepted by the session task.
enum Command {
    Start(oneshot::Sender<Result<()>>),
    Advance(oneshot::Sender<Result<()>>),
    Retry(oneshot::Sender<Result<()>>),
    Finalize(oneshot::Sender<Result<TrainingReport>>),
    Cancel(oneshot::Sender<Result<()>>),
    Reset(oneshot::Sender<Result<()>>),
}

/// Messages the session posts to itself from spawned timers and the
/// training task. Stale epochs are dropped on receipt.
enum Internal {
    AdvanceElapsed { epoch: u64 },
    RetryElapsed { epoch: u64 },
    TrainingFinished { epoch: u64, result: Result<TrainingReport> },
}

/// Cloneable handle to a running enrollment session.
///
/// All operations are serialized through the session task's queue; each
/// call resolves once the task has applied (or rejected) it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    view_rx: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Begin (or restart) the enrollment, capturing stage 0.
    ///
    /// # Errors
    ///
    /// Rejected while a finalize is outstanding, or if the capture source
    /// fails to produce the first batch.
    pub async fn start(&self) -> Result<()> {
        self.send(Command::Start).await
    }

    /// Manually advance to the next stage and capture a batch for it.
    ///
    /// A no-op at the final stage. Cancels any pending auto-advance.
    ///
    /// # Errors
    ///
    /// Rejected unless the session is capturing.
    pub async fn advance(&self) -> Result<()> {
        self.send(Command::Advance).await
    }

    /// Discard all captures and restart from stage 0.
    ///
    /// # Errors
    ///
    /// Rejected unless the session is capturing.
    pub async fn retry(&self) -> Result<()> {
        self.send(Command::Retry).await
    }

    /// Hand the retained captures to the training service.
    ///
    /// Exactly one training call per finalize; never retried here.
    ///
    /// # Errors
    ///
    /// Rejected when the buffer is empty or a finalize is already in
    /// flight; otherwise resolves with the training outcome.
    pub async fn finalize(&self) -> Result<TrainingReport> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Finalize(tx))
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    /// Cancel the enrollment, releasing the capture source and clearing
    /// the buffer. Valid from any status.
    ///
    /// # Errors
    ///
    /// Only fails if the session task has shut down.
    pub async fn cancel(&self) -> Result<()> {
        self.send(Command::Cancel).await
    }

    /// Return the session to idle at stage 0 with an empty buffer.
    /// Valid from any status.
    ///
    /// # Errors
    ///
    /// Only fails if the session task has shut down.
    pub async fn reset(&self) -> Result<()> {
        self.send(Command::Reset).await
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    async fn send(&self, make: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }
}

/// The enrollment session task.
///
/// Owns the sequencer + buffer pair and the collaborators. Created with
/// [`EnrollmentSession::spawn`], driven entirely by its queues.
pub struct EnrollmentSession {
    sequencer: EnrollmentSequencer,
    buffer: CaptureBuffer,
    source: Arc<dyn CaptureSource>,
    trainer: Arc<dyn TrainingService>,
    settings: SessionSettings,

    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::Sender<Internal>,
    internal_rx: mpsc::Receiver<Internal>,
    view_tx: watch::Sender<SessionView>,

    /// Bumped on start/advance/retry/cancel/reset; messages carrying an
    /// older epoch are stale and ignored.
    epoch: u64,
    /// Responder for the finalize call whose training run is in flight.
    pending_finalize: Option<oneshot::Sender<Result<TrainingReport>>>,
    /// Next capture record id.
    next_id: u64,
}

impl std::fmt::Debug for EnrollmentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrollmentSession")
            .field("status", &self.sequencer.status())
            .field("stage_index", &self.sequencer.current_stage_index())
            .field("buffer_len", &self.buffer.len())
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl EnrollmentSession {
    /// Spawn a session task over the given stages and collaborators.
    ///
    /// The task runs until every [`SessionHandle`] clone is dropped.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty stage list or a zero
    /// buffer capacity.
    pub fn spawn(
        stages: Vec<StageDescriptor>,
        settings: SessionSettings,
        source: Arc<dyn CaptureSource>,
        trainer: Arc<dyn TrainingService>,
    ) -> Result<SessionHandle> {
        let sequencer = EnrollmentSequencer::new(stages)?;
        let buffer = CaptureBuffer::new(settings.buffer_capacity)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (internal_tx, internal_rx) = mpsc::channel(32);
        let (view_tx, view_rx) = watch::channel(SessionView {
            status: sequencer.status(),
            stage_index: sequencer.current_stage_index(),
            stage_count: sequencer.stage_count(),
            records: Vec::new(),
        });

        let session = Self {
            sequencer,
            buffer,
            source,
            trainer,
            settings,
            commands: cmd_rx,
            internal_tx,
            internal_rx,
            view_tx,
            epoch: 0,
            pending_finalize: None,
            next_id: 1,
        };

        tokio::spawn(session.run());

        Ok(SessionHandle {
            commands: cmd_tx,
            view_rx,
        })
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    self.handle_command(command).await;
                }
                Some(message) = self.internal_rx.recv() => {
                    self.handle_internal(message).await;
                }
            }
        }
        debug!("enrollment session task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start(respond) => {
                let result = self.do_start().await;
                let _ = respond.send(result);
            }
            Command::Advance(respond) => {
                let result = self.do_advance().await;
                let _ = respond.send(result);
            }
            Command::Retry(respond) => {
                let result = self.do_retry();
                let _ = respond.send(result);
            }
            Command::Finalize(respond) => {
                match self.do_finalize() {
                    Ok(()) => self.pending_finalize = Some(respond),
                    Err(err) => {
                        let _ = respond.send(Err(err));
                    }
                }
            }
            Command::Cancel(respond) => {
                self.do_teardown(true).await;
                let _ = respond.send(Ok(()));
            }
            Command::Reset(respond) => {
                self.do_teardown(false).await;
                let _ = respond.send(Ok(()));
            }
        }
        self.publish();
    }

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::AdvanceElapsed { epoch } => {
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "dropping stale advance timer");
                    return;
                }
                // The timer only runs while capturing below the last stage,
                // so a legal advance is expected here.
                match self.sequencer.advance() {
                    Ok(Some(request)) => {
                        if let Err(err) = self.capture_batch(request).await {
                            warn!(%err, "auto-advance capture failed");
                        }
                    }
                    Ok(None) => {}
                    Err(err) => debug!(%err, "advance timer raced a status change"),
                }
            }
            Internal::RetryElapsed { epoch } => {
                if epoch != self.epoch {
                    debug!(epoch, current = self.epoch, "dropping stale retry timer");
                    return;
                }
                if let Err(err) = self
                    .capture_batch(CaptureRequest { stage_index: 0 })
                    .await
                {
                    warn!(%err, "retry capture failed");
                }
            }
            Internal::TrainingFinished { epoch, result } => {
                self.finish_training(epoch, result);
            }
        }
        self.publish();
    }

    async fn do_start(&mut self) -> Result<()> {
        let request = self.sequencer.start()?;
        self.bump_epoch();
        self.buffer.clear();
        info!(stages = self.sequencer.stage_count(), "enrollment started");
        self.capture_batch(request).await
    }

    async fn do_advance(&mut self) -> Result<()> {
        let Some(request) = self.sequencer.advance()? else {
            return Ok(());
        };
        // A manual advance supersedes any pending auto-advance.
        self.bump_epoch();
        self.capture_batch(request).await
    }

    fn do_retry(&mut self) -> Result<()> {
        self.sequencer.retry_capture()?;
        self.bump_epoch();
        self.buffer.clear();
        info!(delay_ms = self.settings.retry_delay.as_millis() as u64, "retrying from stage 0");
        self.schedule(self.settings.retry_delay, |epoch| Internal::RetryElapsed { epoch });
        Ok(())
    }

    fn do_finalize(&mut self) -> Result<()> {
        if self.sequencer.status() == SessionStatus::Capturing && self.buffer.is_empty() {
            return Err(Error::EmptyBuffer);
        }
        self.sequencer.begin_finalize()?;

        let records = self.buffer.snapshot();
        let trainer = Arc::clone(&self.trainer);
        let internal = self.internal_tx.clone();
        let epoch = self.epoch;
        info!(
            image_count = records.len(),
            trainer = trainer.name(),
            "finalizing enrollment"
        );
        tokio::spawn(async move {
            let result = trainer.train(&records).await;
            let _ = internal
                .send(Internal::TrainingFinished { epoch, result })
                .await;
        });
        Ok(())
    }

    fn finish_training(&mut self, epoch: u64, result: Result<TrainingReport>) {
        if epoch != self.epoch {
            debug!("dropping training result from an abandoned finalize");
            return;
        }
        let Some(respond) = self.pending_finalize.take() else {
            warn!("training finished with no caller waiting");
            return;
        };
        let outcome = match result {
            Ok(report) => {
                let done = self.sequencer.complete_finalize();
                debug_assert!(done.is_ok());
                info!(image_count = report.image_count, "enrollment complete");
                Ok(report)
            }
            Err(err) => {
                let back = self.sequencer.fail_finalize();
                debug_assert!(back.is_ok());
                warn!(%err, "training failed; session stays capturing");
                Err(err)
            }
        };
        let _ = respond.send(outcome);
    }

    /// Release collaborators and clear state. `cancelled` selects the
    /// resulting status (`Cancelled` vs `Idle`).
    async fn do_teardown(&mut self, cancelled: bool) {
        self.bump_epoch();
        self.source.cancel().await;
        self.buffer.clear();
        if let Some(respond) = self.pending_finalize.take() {
            let _ = respond.send(Err(Error::training(
                "enrollment was cancelled before training completed",
            )));
        }
        if cancelled {
            self.sequencer.cancel();
        } else {
            self.sequencer.reset();
        }
        info!(status = %self.sequencer.status(), "session torn down");
    }

    /// Run one capture batch: ask the source for frames, stamp them into
    /// records, absorb them into the buffer, and schedule the auto-advance
    /// unless the last stage is active.
    async fn capture_batch(&mut self, request: CaptureRequest) -> Result<()> {
        let frames = self.source.request_capture(request.stage_index).await?;

        let records: Vec<CaptureRecord> = frames
            .into_iter()
            .map(|frame| {
                let id = self.next_id;
                self.next_id += 1;
                CaptureRecord::from_frame(frame, id, request.stage_index)
            })
            .collect();

        let absorbed = records.len();
        let evicted = self.buffer.insert_batch(records);
        debug!(
            stage_index = request.stage_index,
            absorbed, evicted,
            retained = self.buffer.len(),
            "capture batch absorbed"
        );

        if !self.sequencer.is_last_stage() {
            self.schedule(self.settings.advance_delay, |epoch| Internal::AdvanceElapsed {
                epoch,
            });
        }
        Ok(())
    }

    /// Spawn a single-shot timer that posts `message(epoch)` back to the
    /// session. A later epoch bump makes the fire a no-op.
    fn schedule(&self, delay: Duration, message: impl FnOnce(u64) -> Internal + Send + 'static) {
        let internal = self.internal_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(message(epoch)).await;
        });
    }

    fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    fn publish(&self) {
        let view = SessionView {
            status: self.sequencer.status(),
            stage_index: self.sequencer.current_stage_index(),
            stage_count: self.sequencer.stage_count(),
            records: self.buffer.snapshot(),
        };
        // Receivers may all be gone; that's fine.
        let _ = self.view_tx.send(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::default_stages;
    use crate::sim::{SimCamera, SimTrainer};

    fn settings() -> SessionSettings {
        SessionSettings::default()
    }

    fn spawn_session(
        camera: SimCamera,
        trainer: SimTrainer,
    ) -> SessionHandle {
        EnrollmentSession::spawn(
            default_stages(),
            settings(),
            Arc::new(camera),
            Arc::new(trainer),
        )
        .unwrap()
    }

    fn sim_session() -> SessionHandle {
        spawn_session(
            SimCamera::seeded(1, 3, 42),
            SimTrainer::new(Duration::from_secs(3)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_view_is_idle() {
        let handle = sim_session();
        let view = handle.view();

        assert_eq!(view.status, SessionStatus::Idle);
        assert_eq!(view.stage_index, 0);
        assert_eq!(view.stage_count, 3);
        assert!(view.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_captures_stage_zero() {
        let handle = sim_session();
        handle.start().await.unwrap();

        let view = handle.view();
        assert_eq!(view.status, SessionStatus::Capturing);
        assert_eq!(view.stage_index, 0);
        assert!(!view.records.is_empty());
        assert!(view.records.iter().all(|r| r.stage_index == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_advance_walks_to_last_stage() {
        let handle = sim_session();
        handle.start().await.unwrap();

        // Two auto-advances at 1.5s apart reach the final stage.
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(handle.view().stage_index, 1);

        tokio::time::sleep(Duration::from_millis(1600)).await;
        let view = handle.view();
        assert_eq!(view.stage_index, 2);
        assert_eq!(view.status, SessionStatus::Capturing);

        // No further advance at the last stage.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.view().stage_index, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_advance() {
        // A pending auto-advance must not fire after reset.
        let handle = sim_session();
        handle.start().await.unwrap();
        handle.reset().await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        let view = handle.view();
        assert_eq!(view.status, SessionStatus::Idle);
        assert_eq!(view.stage_index, 0);
        assert!(view.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_and_marks_cancelled() {
        let handle = sim_session();
        handle.start().await.unwrap();
        handle.cancel().await.unwrap();

        let view = handle.view();
        assert_eq!(view.status, SessionStatus::Cancelled);
        assert_eq!(view.stage_index, 0);
        assert!(view.records.is_empty());

        // No zombie advance after cancel either.
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(handle.view().status, SessionStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffer_never_exceeds_capacity() {
        let handle = sim_session();
        handle.start().await.unwrap();

        for _ in 0..6 {
            tokio::time::sleep(Duration::from_millis(1600)).await;
            assert!(handle.view().records.len() <= 7);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_ids_are_monotonic() {
        let handle = sim_session();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        let records = handle.view().records;
        for pair in records.windows(2) {
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_tagged_with_capture_stage() {
        let handle = sim_session();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(4)).await;

        let view = handle.view();
        for record in &view.records {
            assert!(record.stage_index <= view.stage_index);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_advance() {
        let handle = sim_session();
        handle.start().await.unwrap();
        handle.advance().await.unwrap();

        let view = handle.view();
        assert_eq!(view.stage_index, 1);
        assert!(view.records.iter().any(|r| r.stage_index == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_advance_rejected_while_idle() {
        let handle = sim_session();
        let err = handle.advance().await.unwrap_err();
        assert!(err.is_invalid_transition());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_discards_everything_and_restarts() {
        let handle = sim_session();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(handle.view().stage_index, 1);

        handle.retry().await.unwrap();
        // Buffer cleared immediately; recapture happens after the delay.
        let view = handle.view();
        assert_eq!(view.stage_index, 0);
        assert!(view.records.is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let view = handle.view();
        assert!(!view.records.is_empty());
        assert!(view.records.iter().all(|r| r.stage_index == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_success() {
        let handle = sim_session();
        handle.start().await.unwrap();

        let before = handle.view().records.len();
        let report = handle.finalize().await.unwrap();
        assert_eq!(report.image_count, before);
        assert_eq!(handle.view().status, SessionStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_with_empty_buffer_rejected() {
        let handle = spawn_session(
            SimCamera::failing(),
            SimTrainer::new(Duration::from_secs(3)),
        );
        // Start fails to capture, leaving the session capturing but empty.
        assert!(handle.start().await.is_err());
        assert_eq!(handle.view().status, SessionStatus::Capturing);

        let err = handle.finalize().await.unwrap_err();
        assert!(matches!(err, Error::EmptyBuffer));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_finalize_rejected() {
        let handle = sim_session();
        handle.start().await.unwrap();

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.finalize().await })
        };
        // Give the first finalize time to enter Finalizing.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.view().status, SessionStatus::Finalizing);

        let second = handle.finalize().await;
        assert!(matches!(second, Err(Error::FinalizeInFlight)));

        // The first call's outcome still decides the final status.
        let report = first.await.unwrap().unwrap();
        assert!(report.image_count > 0);
        assert_eq!(handle.view().status, SessionStatus::Complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finalize_failure_returns_to_capturing() {
        let handle = spawn_session(
            SimCamera::seeded(1, 3, 42),
            SimTrainer::failing(Duration::from_millis(200)),
        );
        handle.start().await.unwrap();

        let err = handle.finalize().await.unwrap_err();
        assert!(err.is_collaborator_failure());
        assert_eq!(handle.view().status, SessionStatus::Capturing);

        // Not retried automatically: status stays put.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(handle.view().status, SessionStatus::Capturing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_in_flight_finalize() {
        let handle = sim_session();
        handle.start().await.unwrap();

        let pending = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.finalize().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel().await.unwrap();

        let outcome = pending.await.unwrap();
        assert!(outcome.is_err());
        assert_eq!(handle.view().status, SessionStatus::Cancelled);

        // The late training result must not flip the status.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.view().status, SessionStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_complete_restarts() {
        let handle = sim_session();
        handle.start().await.unwrap();
        handle.finalize().await.unwrap();
        assert_eq!(handle.view().status, SessionStatus::Complete);

        handle.start().await.unwrap();
        let view = handle.view();
        assert_eq!(view.status, SessionStatus::Capturing);
        assert_eq!(view.stage_index, 0);
        assert!(view.records.iter().all(|r| r.stage_index == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_sees_updates() {
        let handle = sim_session();
        let mut updates = handle.subscribe();

        handle.start().await.unwrap();
        updates.changed().await.unwrap();
        assert_eq!(updates.borrow().status, SessionStatus::Capturing);
    }
}
