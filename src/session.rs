//! Editing session
//!
//! A `Session` owns one timeline and the collaborators that feed it. Edits
//! take `&mut self` and so are serialized; imports and speech generation
//! suspend on I/O, and renders run in the background against a snapshot.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::MixdownConfig;
use crate::engine::{normalize, AudioBuffer, Resampler};
use crate::error::{MixdownError, Result};
use crate::render::{EncoderConfig, RenderJob, RenderResult};
use crate::sources::{AudioDecoder, HttpSpeechSynthesizer, SpeechRequest, SpeechSynthesizer, WavDecoder};
use crate::timeline::{Clip, ClipId, ClipKind, Timeline, TrimHandle};

pub struct Session {
    config: MixdownConfig,
    timeline: Timeline,
    resampler: Resampler,
    decoder: Arc<dyn AudioDecoder>,
    speech: Arc<dyn SpeechSynthesizer>,
    last_render: Option<RenderResult>,
}

impl Session {
    /// Session with the WAV decoder and the HTTP speech service from `config`
    pub fn new(config: MixdownConfig) -> Result<Self> {
        config.validate()?;
        let speech = HttpSpeechSynthesizer::new(&config.speech)?;
        Ok(Self::with_collaborators(
            config,
            Arc::new(WavDecoder),
            Arc::new(speech),
        ))
    }

    /// Session with caller-supplied decoder and speech service
    pub fn with_collaborators(
        config: MixdownConfig,
        decoder: Arc<dyn AudioDecoder>,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        let rate = config.target_sample_rate;
        debug!(sample_rate = rate, decoder = decoder.name(), "session created");
        Self {
            timeline: Timeline::new(rate),
            resampler: Resampler::new(rate),
            config,
            decoder,
            speech,
            last_render: None,
        }
    }

    pub fn config(&self) -> &MixdownConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn sample_rate(&self) -> u32 {
        self.timeline.target_sample_rate()
    }

    /// Convert seconds to a position on this session's timeline
    pub fn secs_to_samples(&self, secs: f64) -> i64 {
        (secs * self.sample_rate() as f64).round() as i64
    }

    // ========================================================================
    // Adding audio
    // ========================================================================

    /// Normalize a decoded buffer and place it on the timeline
    ///
    /// `position` of `None` appends at the current end.
    pub fn add_buffer(&mut self, buffer: &AudioBuffer, kind: ClipKind, position: Option<i64>) -> Result<Clip> {
        let source = self.resampler.admit(buffer)?;
        let clip = match position {
            Some(position) => self.timeline.add_clip_at(source, kind, position)?,
            None => self.timeline.add_clip(source, kind)?,
        };
        self.invalidate();
        info!(
            id = %clip.id(),
            %kind,
            source_rate = buffer.sample_rate(),
            source_channels = buffer.channels(),
            len = clip.trimmed_len(),
            "clip admitted"
        );
        Ok(clip)
    }

    /// Decode imported file bytes off the async runtime, then admit them
    ///
    /// # Errors
    /// * `DecodeFailure` - the bytes are not a supported audio file
    /// * `InvalidChannelLayout` / `ResampleFailure` - the audio cannot be normalized
    pub async fn import_file(&mut self, bytes: Bytes, kind: ClipKind, position: Option<i64>) -> Result<Clip> {
        let decoder = Arc::clone(&self.decoder);
        let buffer = tokio::task::spawn_blocking(move || decoder.decode(&bytes)).await??;
        self.add_buffer(&buffer, kind, position)
    }

    /// Read a file from disk and import it
    pub async fn import_path(&mut self, path: &Path, kind: ClipKind, position: Option<i64>) -> Result<Clip> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MixdownError::FileNotFound {
                    path: path.display().to_string(),
                    source: Some(e),
                })
            }
            Err(e) => return Err(e.into()),
        };
        self.import_file(Bytes::from(bytes), kind, position).await
    }

    /// Ask the speech service for audio and place it on the timeline
    ///
    /// Text over the configured budget is either cut short or synthesized in
    /// pieces whose audio is joined into one clip.
    ///
    /// # Errors
    /// * `SpeechService` - the text is empty, or the service rejected the
    ///   request or was unreachable
    /// * `DecodeFailure` - the service answered with unreadable audio
    pub async fn generate_speech(&mut self, request: &SpeechRequest, position: Option<i64>) -> Result<Clip> {
        request.validate()?;
        let mut pieces = self.config.speech.budget.split(&request.text);
        if pieces.len() == 1 {
            let piece = SpeechRequest {
                text: pieces.remove(0),
                voice: request.voice.clone(),
            };
            let buffer = self.speech.synthesize(&piece).await?;
            return self.add_buffer(&buffer, ClipKind::GeneratedSpeech, position);
        }

        let rate = self.sample_rate();
        let count = pieces.len();
        let mut joined = Vec::new();
        for (i, text) in pieces.into_iter().enumerate() {
            debug!(piece = i + 1, of = count, chars = text.chars().count(), "synthesizing speech piece");
            let piece = SpeechRequest {
                text,
                voice: request.voice.clone(),
            };
            let buffer = self.speech.synthesize(&piece).await?;
            joined.extend_from_slice(normalize(&buffer, rate)?.channel(0));
        }
        self.add_buffer(&AudioBuffer::mono(joined, rate), ClipKind::GeneratedSpeech, position)
    }

    // ========================================================================
    // Editing
    // ========================================================================

    pub fn trim(&mut self, id: ClipId, handle: TrimHandle, offset: i64) -> Result<Clip> {
        let clip = self.timeline.trim(id, handle, offset)?.clone();
        self.invalidate();
        Ok(clip)
    }

    pub fn move_clip(&mut self, id: ClipId, position: i64) -> Result<Clip> {
        let clip = self.timeline.move_clip(id, position)?.clone();
        self.invalidate();
        Ok(clip)
    }

    pub fn remove(&mut self, id: ClipId) -> Result<Clip> {
        let clip = self.timeline.remove(id)?;
        self.invalidate();
        Ok(clip)
    }

    fn invalidate(&mut self) {
        if self.last_render.take().is_some() {
            debug!("discarded stale render");
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the current timeline in the background
    ///
    /// Must be called from within a tokio runtime. The returned job works on a
    /// snapshot, so the session stays editable while it runs.
    pub fn render(&self, config: EncoderConfig) -> RenderJob {
        RenderJob::spawn(self.timeline.snapshot(), config)
    }

    /// Render tied to an outside cancellation token
    pub fn render_with_token(&self, config: EncoderConfig, cancel: CancellationToken) -> RenderJob {
        RenderJob::spawn_with_token(self.timeline.snapshot(), config, cancel)
    }

    /// Keep a finished render as the session's current output
    ///
    /// Returns `false` and drops the result if the timeline has changed since
    /// the render's snapshot was taken.
    pub fn accept_render(&mut self, result: RenderResult) -> bool {
        if result.revision != self.timeline.revision() {
            debug!(
                render_revision = result.revision,
                timeline_revision = self.timeline.revision(),
                "ignoring stale render"
            );
            return false;
        }
        self.last_render = Some(result);
        true
    }

    /// Render with the session's encoder settings, wait, and keep the result
    pub async fn render_and_wait(&mut self) -> Result<RenderResult> {
        let result = self.render(self.config.encoder).wait().await?;
        self.accept_render(result.clone());
        Ok(result)
    }

    /// The latest render, if it still matches the timeline
    pub fn last_render(&self) -> Option<&RenderResult> {
        self.last_render
            .as_ref()
            .filter(|r| r.revision == self.timeline.revision())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("timeline", &self.timeline)
            .field("decoder", &self.decoder.name())
            .field("has_render", &self.last_render.is_some())
            .finish()
    }
}
