//! Rendering
//!
//! Flattens a timeline snapshot into one mono buffer ([`mixer`]), encodes it
//! ([`encoder`]) and runs the whole thing off the editing thread ([`job`]).
//!
//! Both stages poll a [`RenderContext`] between units of work: that is where
//! cancellation is observed and progress is published.

pub mod encoder;
pub mod job;
pub mod mixer;

pub use encoder::{encode, encoder_for, AudioEncoder, EncodeQuality, EncoderConfig, OutputFormat, WavEncoder};
#[cfg(feature = "mp3")]
pub use encoder::Mp3Encoder;
pub use job::RenderJob;
pub use mixer::{mix, MixOutcome};

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::AudioBuffer;
use crate::error::{MixdownError, Result};
use crate::timeline::TimelineSnapshot;

/// Phase of a render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderStage {
    #[default]
    Pending,
    Mixing,
    Encoding,
    Complete,
}

/// Progress of a render: units done out of units total for the current stage
///
/// Mixing counts clips, encoding counts samples.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RenderProgress {
    pub stage: RenderStage,
    pub processed: u64,
    pub total: u64,
}

impl RenderProgress {
    /// Completion of the current stage in percent
    pub fn percent(&self) -> f32 {
        match self.stage {
            RenderStage::Complete => 100.0,
            _ if self.total == 0 => 0.0,
            _ => (self.processed as f32 / self.total as f32) * 100.0,
        }
    }
}

/// Cancellation and progress plumbing shared by the render stages
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    cancel: CancellationToken,
    progress: Option<Arc<watch::Sender<RenderProgress>>>,
}

impl RenderContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            progress: None,
        }
    }

    /// Attach a channel that receives every progress update
    pub fn with_progress(mut self, progress: watch::Sender<RenderProgress>) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with `Cancelled` if cancellation was requested
    #[inline]
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(MixdownError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report(&self, stage: RenderStage, processed: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress.send_replace(RenderProgress {
                stage,
                processed,
                total,
            });
        }
    }
}

/// One finished render
///
/// Tied to the timeline revision it was produced from; a session discards it
/// once the timeline changes.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// The mixed, peak-normalized mono audio
    pub buffer: Arc<AudioBuffer>,
    /// Encoded file contents
    pub bytes: Bytes,
    pub format: OutputFormat,
    /// Peak of the raw sum before normalization
    pub peak: f64,
    /// Gain applied by peak normalization (1.0 when none was needed)
    pub gain: f64,
    /// Hex SHA-256 of `bytes`
    pub digest: String,
    pub revision: u64,
    pub rendered_at: DateTime<Utc>,
}

impl RenderResult {
    pub fn duration_secs(&self) -> f64 {
        self.buffer.duration_secs()
    }

    /// Write the encoded bytes to disk
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// Hex SHA-256 of encoded output
pub fn digest_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Mix and encode a snapshot on the current thread
pub fn render_snapshot(
    snapshot: &TimelineSnapshot,
    config: &EncoderConfig,
    ctx: &RenderContext,
) -> Result<RenderResult> {
    config.validate()?;
    let encoder = encoder_for(config.format)?;

    let outcome = mix(snapshot, ctx)?;
    let bytes = encoder.encode(&outcome.buffer, config, ctx)?;
    ctx.checkpoint()?;

    let total = outcome.buffer.len() as u64;
    ctx.report(RenderStage::Complete, total, total);

    let result = RenderResult {
        buffer: Arc::new(outcome.buffer),
        digest: digest_hex(&bytes),
        bytes,
        format: config.format,
        peak: outcome.peak,
        gain: outcome.gain,
        revision: snapshot.revision(),
        rendered_at: Utc::now(),
    };

    info!(
        revision = result.revision,
        format = %result.format,
        duration_secs = result.duration_secs(),
        bytes = result.bytes.len(),
        gain = result.gain,
        "render complete"
    );
    Ok(result)
}
