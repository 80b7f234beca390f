//! Encoders
//!
//! Turn a mixed mono buffer into file bytes. Every encoder is deterministic:
//! the same buffer and config always give the same bytes.
//!
//! - MP3 through LAME (`mp3` feature, on by default), constant bitrate
//! - 16-bit PCM WAV through hound
//!
//! Work is done in chunks; the [`RenderContext`] is polled between chunks so a
//! render can be cancelled mid-encode.

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use bytes::Bytes;
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::AudioBuffer;
use crate::error::{MixdownError, Result};
use crate::render::{RenderContext, RenderStage};

/// Samples per encode chunk (a whole number of MP3 frames)
const CHUNK_SAMPLES: usize = 1152 * 32;

/// Default MP3 bitrate in kbps
pub const DEFAULT_BITRATE_KBPS: u32 = 128;

// ============================================================================
// Configuration
// ============================================================================

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp3,
    Wav,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "audio/mpeg",
            OutputFormat::Wav => "audio/wav",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = MixdownError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "mp3" | "mpeg" => Ok(OutputFormat::Mp3),
            "wav" | "wave" => Ok(OutputFormat::Wav),
            other => Err(MixdownError::Config {
                reason: format!("unknown output format '{}'", other),
            }),
        }
    }
}

/// Encoder effort/quality trade-off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EncodeQuality {
    Draft,
    #[default]
    Standard,
    High,
}

/// Encoding parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub format: OutputFormat,
    /// Target bitrate in kbps (ignored by lossless formats but must be positive)
    pub bitrate_kbps: u32,
    pub quality: EncodeQuality,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Mp3,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            quality: EncodeQuality::Standard,
        }
    }
}

impl EncoderConfig {
    pub fn new(format: OutputFormat, bitrate_kbps: u32, quality: EncodeQuality) -> Self {
        Self {
            format,
            bitrate_kbps,
            quality,
        }
    }

    /// WAV output with default settings
    pub fn wav() -> Self {
        Self {
            format: OutputFormat::Wav,
            ..Self::default()
        }
    }

    /// Reject configurations no encoder accepts
    pub fn validate(&self) -> Result<()> {
        if self.bitrate_kbps == 0 {
            return Err(MixdownError::encode("bitrate must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// Encoder trait
// ============================================================================

/// A codec that turns mono float audio into file bytes
pub trait AudioEncoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Encode the whole buffer
    ///
    /// # Errors
    /// * `EncodeFailure` - empty buffer, invalid config or codec failure
    /// * `Cancelled` - cancellation was requested between chunks
    fn encode(&self, buffer: &AudioBuffer, config: &EncoderConfig, ctx: &RenderContext)
        -> Result<Bytes>;
}

/// The encoder for an output format
pub fn encoder_for(format: OutputFormat) -> Result<Box<dyn AudioEncoder>> {
    match format {
        #[cfg(feature = "mp3")]
        OutputFormat::Mp3 => Ok(Box::new(Mp3Encoder)),
        #[cfg(not(feature = "mp3"))]
        OutputFormat::Mp3 => Err(MixdownError::encode(
            "MP3 support was not compiled in (enable the `mp3` feature)",
        )),
        OutputFormat::Wav => Ok(Box::new(WavEncoder)),
    }
}

/// Encode a buffer without cancellation or progress reporting
pub fn encode(buffer: &AudioBuffer, config: &EncoderConfig) -> Result<Bytes> {
    encoder_for(config.format)?.encode(buffer, config, &RenderContext::default())
}

/// Checks shared by every encoder
fn check_input(buffer: &AudioBuffer, config: &EncoderConfig) -> Result<()> {
    config.validate()?;
    if buffer.is_empty() {
        return Err(MixdownError::encode("buffer has no samples"));
    }
    if buffer.channels() != 1 {
        return Err(MixdownError::encode(format!(
            "expected mono audio, got {} channels",
            buffer.channels()
        )));
    }
    if buffer.sample_rate() == 0 {
        return Err(MixdownError::encode("sample rate must be positive"));
    }
    Ok(())
}

#[inline]
fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

// ============================================================================
// WAV
// ============================================================================

/// 16-bit PCM WAV
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Wav
    }

    fn encode(
        &self,
        buffer: &AudioBuffer,
        config: &EncoderConfig,
        ctx: &RenderContext,
    ) -> Result<Bytes> {
        check_input(buffer, config)?;

        let spec = WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let wav_err = |e: hound::Error| MixdownError::encode(format!("WAV write failed: {}", e));

        let samples = buffer.channel(0);
        let total = samples.len() as u64;
        let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
        {
            let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).map_err(wav_err)?;
            let mut written = 0u64;
            for chunk in samples.chunks(CHUNK_SAMPLES) {
                ctx.checkpoint()?;
                for &sample in chunk {
                    writer.write_sample(to_i16(sample)).map_err(wav_err)?;
                }

                written += chunk.len() as u64;
                ctx.report(RenderStage::Encoding, written, total);
            }
            writer.finalize().map_err(wav_err)?;
        }

        debug!(samples = total, bytes = bytes.len(), "encoded wav");
        Ok(Bytes::from(bytes))
    }
}

// ============================================================================
// MP3
// ============================================================================

#[cfg(feature = "mp3")]
pub use mp3::Mp3Encoder;

#[cfg(feature = "mp3")]
mod mp3 {
    use std::mem::MaybeUninit;

    use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, Quality};

    use super::*;

    /// Sample rates LAME can encode
    const SUPPORTED_RATES: [u32; 9] = [8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000];

    /// Constant-bitrate mono MP3 through LAME
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Mp3Encoder;

    /// Snap a requested bitrate up to the nearest LAME bitrate (320 max)
    pub(super) fn lame_bitrate(kbps: u32) -> Bitrate {
        match kbps {
            0..=8 => Bitrate::Kbps8,
            9..=16 => Bitrate::Kbps16,
            17..=24 => Bitrate::Kbps24,
            25..=32 => Bitrate::Kbps32,
            33..=40 => Bitrate::Kbps40,
            41..=48 => Bitrate::Kbps48,
            49..=64 => Bitrate::Kbps64,
            65..=80 => Bitrate::Kbps80,
            81..=96 => Bitrate::Kbps96,
            97..=112 => Bitrate::Kbps112,
            113..=128 => Bitrate::Kbps128,
            129..=160 => Bitrate::Kbps160,
            161..=192 => Bitrate::Kbps192,
            193..=224 => Bitrate::Kbps224,
            225..=256 => Bitrate::Kbps256,
            _ => Bitrate::Kbps320,
        }
    }

    fn lame_quality(quality: EncodeQuality) -> Quality {
        match quality {
            EncodeQuality::Draft => Quality::Good,
            EncodeQuality::Standard => Quality::NearBest,
            EncodeQuality::High => Quality::Best,
        }
    }

    /// Worst-case MP3 output for `samples` input samples
    fn max_output_size(samples: usize) -> usize {
        (samples as f64 * 1.25) as usize + 7200
    }

    fn lame_err(stage: &'static str) -> impl Fn(mp3lame_encoder::BuildError) -> MixdownError {
        move |e| MixdownError::encode(format!("LAME {}: {:?}", stage, e))
    }

    /// Append the initialized prefix of a LAME output buffer
    fn extend_initialized(out: &mut Vec<u8>, scratch: &[MaybeUninit<u8>], len: usize) {
        // SAFETY: LAME reports how many leading bytes of `scratch` it wrote.
        out.extend(scratch[..len].iter().map(|b| unsafe { b.assume_init() }));
    }

    impl AudioEncoder for Mp3Encoder {
        fn format(&self) -> OutputFormat {
            OutputFormat::Mp3
        }

        fn encode(
            &self,
            buffer: &AudioBuffer,
            config: &EncoderConfig,
            ctx: &RenderContext,
        ) -> Result<Bytes> {
            check_input(buffer, config)?;
            if !SUPPORTED_RATES.contains(&buffer.sample_rate()) {
                return Err(MixdownError::encode(format!(
                    "MP3 does not support a {} Hz sample rate",
                    buffer.sample_rate()
                )));
            }

            let mut builder = Builder::new()
                .ok_or_else(|| MixdownError::encode("failed to allocate LAME encoder"))?;
            builder.set_num_channels(1).map_err(lame_err("channels"))?;
            builder
                .set_sample_rate(buffer.sample_rate())
                .map_err(lame_err("sample rate"))?;
            builder
                .set_brate(lame_bitrate(config.bitrate_kbps))
                .map_err(lame_err("bitrate"))?;
            builder
                .set_quality(lame_quality(config.quality))
                .map_err(lame_err("quality"))?;
            let mut encoder = builder.build().map_err(lame_err("build"))?;

            let samples = buffer.channel(0);
            let total = samples.len() as u64;
            let mut out = Vec::with_capacity(max_output_size(samples.len()));
            let mut scratch = vec![MaybeUninit::<u8>::uninit(); max_output_size(CHUNK_SAMPLES)];
            let mut pcm = Vec::with_capacity(CHUNK_SAMPLES);
            let mut encoded = 0u64;

            for chunk in samples.chunks(CHUNK_SAMPLES) {
                ctx.checkpoint()?;

                pcm.clear();
                pcm.extend(chunk.iter().map(|&s| to_i16(s)));
                // In mono mode LAME reads only the left channel
                let input = DualPcm {
                    left: &pcm,
                    right: &pcm,
                };
                let written = encoder
                    .encode(input, &mut scratch)
                    .map_err(|e| MixdownError::encode(format!("MP3 encoding failed: {:?}", e)))?;
                extend_initialized(&mut out, &scratch, written);

                encoded += chunk.len() as u64;
                ctx.report(RenderStage::Encoding, encoded, total);
            }

            ctx.checkpoint()?;
            let flushed = encoder
                .flush::<FlushNoGap>(&mut scratch)
                .map_err(|e| MixdownError::encode(format!("MP3 flush failed: {:?}", e)))?;
            extend_initialized(&mut out, &scratch, flushed);

            debug!(
                samples = total,
                bytes = out.len(),
                bitrate_kbps = config.bitrate_kbps,
                "encoded mp3"
            );
            Ok(Bytes::from(out))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
