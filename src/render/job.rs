//! Background render jobs
//!
//! Mixing and encoding are CPU-bound, so they run on tokio's blocking pool
//! while the editing surface keeps going. A job exposes progress through a
//! watch channel and can be cancelled cooperatively; a cancelled job ends
//! with `Cancelled` and yields no result. Dropping the handle cancels the
//! job, so a render nobody waits for stops at its next checkpoint.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use crate::error::Result;
use crate::render::{render_snapshot, EncoderConfig, RenderContext, RenderProgress, RenderResult};
use crate::timeline::TimelineSnapshot;

/// Handle to an in-flight render
///
/// The job owns a child of the token it was started with. Cancelling the job,
/// or dropping it before `wait` returns, cancels only that child.
#[derive(Debug)]
pub struct RenderJob {
    cancel: CancellationToken,
    progress: watch::Receiver<RenderProgress>,
    handle: JoinHandle<Result<RenderResult>>,
    revision: u64,
    _cancel_on_drop: DropGuard,
}

impl RenderJob {
    /// Start rendering a snapshot on the blocking pool
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(snapshot: TimelineSnapshot, config: EncoderConfig) -> Self {
        Self::spawn_with_token(snapshot, config, CancellationToken::new())
    }

    /// Start rendering with a caller-supplied cancellation token
    ///
    /// Useful for tying a render to a wider shutdown signal. Cancelling
    /// `parent` cancels the job; cancelling the job leaves `parent` alone.
    pub fn spawn_with_token(
        snapshot: TimelineSnapshot,
        config: EncoderConfig,
        parent: CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let (tx, rx) = watch::channel(RenderProgress::default());
        let ctx = RenderContext::new(cancel.clone()).with_progress(tx);
        let revision = snapshot.revision();

        info!(
            revision,
            clips = snapshot.clips().len(),
            format = %config.format,
            "render started"
        );
        let handle = tokio::task::spawn_blocking(move || {
            let result = render_snapshot(&snapshot, &config, &ctx);
            if let Err(e) = &result {
                if e.is_cancellation() {
                    warn!(revision, "render cancelled");
                } else {
                    warn!(revision, error = %e, "render failed");
                }
            }
            result
        });

        Self {
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            progress: rx,
            handle,
            revision,
        }
    }

    /// Timeline revision this job renders
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Ask the job to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token the background task observes
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> RenderProgress {
        *self.progress.borrow()
    }

    /// Receiver for awaiting progress changes
    pub fn subscribe(&self) -> watch::Receiver<RenderProgress> {
        self.progress.clone()
    }

    /// Wait for the job to finish
    ///
    /// The job stays armed until this returns; dropping the future early
    /// cancels the render.
    ///
    /// # Errors
    /// * `Cancelled` - the job was cancelled before it completed
    /// * `TaskFailed` - the background task panicked
    /// * anything the mixer or encoder reported
    pub async fn wait(self) -> Result<RenderResult> {
        self.handle.await?
    }
}
