//! Speech generation
//!
//! The speech service is an opaque producer of audio: text and a voice go in,
//! a buffer at whatever rate and layout the service prefers comes out. The
//! session normalizes the result before it reaches the timeline.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SpeechServiceConfig;
use crate::engine::{decode_wav, AudioBuffer};
use crate::error::{MixdownError, Result};

/// Text to speak and the voice to speak it with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    /// Voice reference understood by the service (name, URL or path)
    pub voice: Option<String>,
}

impl SpeechRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Reject requests that cannot produce audio
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(MixdownError::SpeechService {
                reason: "speech text is empty".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

/// Produces speech audio for a request
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioBuffer>;
}

// ============================================================================
// HTTP service
// ============================================================================

#[derive(Debug, Serialize)]
struct TtsBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_url: Option<&'a str>,
}

/// Speech service reached over HTTP
///
/// Sends `POST {base_url}/tts` with a JSON body `{"text", "voice_url"}` and
/// expects a WAV file back.
#[derive(Debug, Clone)]
pub struct HttpSpeechSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    default_voice: Option<String>,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: &SpeechServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| MixdownError::SpeechService {
                reason: format!("failed to build HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/tts", config.base_url.trim_end_matches('/')),
            default_voice: config.default_voice.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn service_error(context: &str, e: reqwest::Error) -> MixdownError {
    let reason = if e.is_timeout() {
        format!("{}: request timed out", context)
    } else {
        format!("{}: {}", context, e)
    };
    MixdownError::SpeechService {
        reason,
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioBuffer> {
        request.validate()?;

        let body = TtsBody {
            text: &request.text,
            voice_url: request.voice.as_deref().or(self.default_voice.as_deref()),
        };
        debug!(endpoint = %self.endpoint, chars = request.text.len(), "requesting speech");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| service_error("request failed", e))?
            .error_for_status()
            .map_err(|e| service_error("service returned an error", e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| service_error("failed to read response", e))?;

        let buffer = decode_wav(&bytes)?;
        info!(
            sample_rate = buffer.sample_rate(),
            channels = buffer.channels(),
            duration_secs = buffer.duration_secs(),
            "speech generated"
        );
        Ok(buffer)
    }
}

// ============================================================================
// Mock
// ============================================================================

/// Deterministic stand-in for the speech service
///
/// Emits a sine tone whose length grows with the text, at a configurable
/// native rate and channel count, so tests can exercise normalization.
#[derive(Debug, Clone)]
pub struct MockSpeechSynthesizer {
    sample_rate: u32,
    channels: usize,
    secs_per_char: f32,
    fail: bool,
}

impl MockSpeechSynthesizer {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            secs_per_char: 0.05,
            fail: false,
        }
    }

    /// A synthesizer whose every request fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(24000, 1)
        }
    }

    /// Expected output length in samples for `text`
    pub fn expected_len(&self, text: &str) -> usize {
        (text.chars().count() as f32 * self.secs_per_char * self.sample_rate as f32).round() as usize
    }
}

impl Default for MockSpeechSynthesizer {
    fn default() -> Self {
        Self::new(24000, 1)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeechSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<AudioBuffer> {
        request.validate()?;
        if self.fail {
            return Err(MixdownError::SpeechService {
                reason: "mock service unavailable".to_string(),
                source: None,
            });
        }

        let len = self.expected_len(&request.text);
        let step = 2.0 * std::f32::consts::PI * 220.0 / self.sample_rate as f32;
        let mono: Vec<f32> = (0..len).map(|i| 0.4 * (step * i as f32).sin()).collect();
        AudioBuffer::from_channels(vec![mono; self.channels], self.sample_rate)
    }
}
