//! Resampling and Downmixing
//!
//! Converts any incoming buffer to the mix format: one channel at the
//! timeline's target rate. This is the only way audio enters a timeline.
//!
//! Sample rate conversion uses linear interpolation between the two nearest
//! source samples, with positions computed in integer arithmetic so exact
//! rate ratios map output samples exactly onto source samples.

use std::sync::Arc;

use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::{MixdownError, Result};

/// Normalize a buffer to mono at `target_rate`
///
/// Downmixes by equal-weight channel averaging, then resamples.
///
/// # Errors
/// * `InvalidChannelLayout` - the buffer has no channels
/// * `ResampleFailure` - empty buffer, non-finite samples, or a source/target rate of zero
pub fn normalize(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if buffer.channels() == 0 {
        return Err(MixdownError::InvalidChannelLayout { channels: 0 });
    }
    if buffer.is_empty() {
        return Err(MixdownError::resample("source buffer has no samples"));
    }
    if buffer.sample_rate() == 0 {
        return Err(MixdownError::resample("source sample rate must be positive"));
    }
    if target_rate == 0 {
        return Err(MixdownError::resample("target sample rate must be positive"));
    }
    if !buffer.is_finite() {
        return Err(MixdownError::resample("source contains NaN or infinite samples"));
    }

    let mono = downmix(buffer);
    let samples = if buffer.sample_rate() == target_rate {
        mono
    } else {
        resample_linear(&mono, buffer.sample_rate(), target_rate)
    };

    debug!(
        source_rate = buffer.sample_rate(),
        source_channels = buffer.channels(),
        source_len = buffer.len(),
        target_rate,
        output_len = samples.len(),
        "normalized buffer"
    );

    Ok(AudioBuffer::mono(samples, target_rate))
}

/// Average all channels into one
fn downmix(buffer: &AudioBuffer) -> Vec<f32> {
    let channels = buffer.channels();
    if channels == 1 {
        return buffer.channel(0).to_vec();
    }

    let scale = 1.0 / channels as f32;
    (0..buffer.len())
        .map(|i| {
            let sum: f32 = (0..channels).map(|ch| buffer.channel(ch)[i]).sum();
            sum * scale
        })
        .collect()
}

/// Number of output samples covering the same real-world duration
fn resampled_len(source_len: usize, source_rate: u32, target_rate: u32) -> usize {
    let numerator = source_len as u64 * target_rate as u64;
    numerator.div_ceil(source_rate as u64) as usize
}

/// Linear interpolation resampling
///
/// Output sample `i` sits at time `i / target_rate`, which is source position
/// `j = i * source_rate / target_rate`. Neighbours past the end are clamped to
/// the last sample.
fn resample_linear(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let last = samples.len() - 1;
    let target_len = resampled_len(samples.len(), source_rate, target_rate);
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let position = i as u64 * source_rate as u64;
        let idx = (position / target_rate as u64) as usize;
        let frac = (position % target_rate as u64) as f64 / target_rate as f64;

        let a = samples[idx.min(last)] as f64;
        let b = samples[(idx + 1).min(last)] as f64;
        output.push((a + (b - a) * frac) as f32);
    }

    output
}

// ============================================================================
// Admission
// ============================================================================

/// A buffer already in the mix format of some timeline
///
/// Only a [`Resampler`] can produce one, so a timeline never holds audio that
/// skipped normalization. Cloning shares the underlying samples.
#[derive(Debug, Clone)]
pub struct MixSource {
    buffer: Arc<AudioBuffer>,
}

impl MixSource {
    /// The normalized samples
    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    /// Sample rate of the normalized audio
    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    /// Length in samples
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Converts producer output into [`MixSource`]s for one target rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resampler {
    target_rate: u32,
}

impl Resampler {
    pub fn new(target_rate: u32) -> Self {
        Self { target_rate }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Normalize a buffer and wrap it for admission
    pub fn admit(&self, buffer: &AudioBuffer) -> Result<MixSource> {
        let normalized = normalize(buffer, self.target_rate)?;
        Ok(MixSource {
            buffer: Arc::new(normalized),
        })
    }

    /// Admit a shared buffer, reusing it untouched when it is already mono at
    /// the target rate
    pub fn admit_shared(&self, buffer: Arc<AudioBuffer>) -> Result<MixSource> {
        if buffer.channels() == 1
            && buffer.sample_rate() == self.target_rate
            && !buffer.is_empty()
            && buffer.is_finite()
        {
            return Ok(MixSource { buffer });
        }
        self.admit(&buffer)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    #[test]
    fn test_downmix_averages_channels() {
        let buffer = AudioBuffer::from_interleaved(&[1.0, 0.0, 0.5, -0.5, -1.0, 0.2], 2, 8000).unwrap();
        let mono = normalize(&buffer, 8000).unwrap();

        assert_eq!(mono.channels(), 1);
        assert_eq!(mono.len(), 3);
        assert_abs_diff_eq!(mono.channel(0)[0], 0.5);
        assert_abs_diff_eq!(mono.channel(0)[1], 0.0);
        assert_abs_diff_eq!(mono.channel(0)[2], -0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_mono_same_rate_is_identity() {
        let buffer = AudioBuffer::mono(vec![0.1, -0.2, 0.3], 16000);
        let out = normalize(&buffer, 16000).unwrap();
        assert_eq!(out, buffer);
    }

    #[test]
    fn test_upsample_interpolates() {
        let buffer = AudioBuffer::mono(vec![0.0, 1.0, 0.0], 8000);
        let out = normalize(&buffer, 16000).unwrap();

        assert_eq!(out.len(), 6);
        let s = out.channel(0);
        assert_abs_diff_eq!(s[0], 0.0);
        assert_abs_diff_eq!(s[1], 0.5);
        assert_abs_diff_eq!(s[2], 1.0);
        assert_abs_diff_eq!(s[3], 0.5);
        assert_abs_diff_eq!(s[4], 0.0);
        // Past the last source sample the neighbour is clamped
        assert_abs_diff_eq!(s[5], 0.0);
    }

    #[test]
    fn test_downsample_halves_length() {
        let samples: Vec<f32> = (0..8).map(|i| i as f32 / 10.0).collect();
        let buffer = AudioBuffer::mono(samples, 44100);
        let out = normalize(&buffer, 22050).unwrap();

        assert_eq!(out.len(), 4);
        for (i, &s) in out.channel(0).iter().enumerate() {
            assert_abs_diff_eq!(s, (2 * i) as f32 / 10.0, epsilon = 1e-6);
        }
    }

    #[test_case(48000, 16000, 48000 => 16000 ; "3x down")]
    #[test_case(16000, 48000, 16000 => 48000 ; "3x up")]
    #[test_case(44100, 48000, 44100 => 48000 ; "cd to dat")]
    #[test_case(7, 3, 10 => 5 ; "rounds partial sample up")]
    fn test_resampled_len(source_rate: u32, target_rate: u32, len: usize) -> usize {
        resampled_len(len, source_rate, target_rate)
    }

    #[test]
    fn test_duration_preserved() {
        let buffer = AudioBuffer::mono(vec![0.25; 44100], 44100);
        let out = normalize(&buffer, 24000).unwrap();
        assert_abs_diff_eq!(out.duration_secs(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_degenerate_inputs() {
        let empty = AudioBuffer::mono(Vec::new(), 16000);
        assert!(matches!(
            normalize(&empty, 16000),
            Err(MixdownError::ResampleFailure { .. })
        ));

        let zero_rate = AudioBuffer::mono(vec![0.1; 4], 0);
        assert!(matches!(
            normalize(&zero_rate, 16000),
            Err(MixdownError::ResampleFailure { .. })
        ));

        let ok = AudioBuffer::mono(vec![0.1; 4], 16000);
        assert!(matches!(
            normalize(&ok, 0),
            Err(MixdownError::ResampleFailure { .. })
        ));

        let no_channels = AudioBuffer::from_channels(Vec::new(), 16000).unwrap();
        assert!(matches!(
            normalize(&no_channels, 16000),
            Err(MixdownError::InvalidChannelLayout { channels: 0 })
        ));
    }

    #[test]
    fn test_admit_shared_reuses_normalized_buffer() {
        let resampler = Resampler::new(16000);
        let shared = Arc::new(AudioBuffer::mono(vec![0.1; 100], 16000));
        let source = resampler.admit_shared(Arc::clone(&shared)).unwrap();
        assert!(Arc::ptr_eq(source.buffer(), &shared));

        let stereo = Arc::new(AudioBuffer::from_interleaved(&[0.1; 200], 2, 16000).unwrap());
        let source = resampler.admit_shared(Arc::clone(&stereo)).unwrap();
        assert!(!Arc::ptr_eq(source.buffer(), &stereo));
        assert_eq!(source.buffer().channels(), 1);
        assert_eq!(source.len(), 100);
    }

    #[test_case(f32::NAN ; "nan")]
    #[test_case(f32::INFINITY ; "positive infinity")]
    #[test_case(f32::NEG_INFINITY ; "negative infinity")]
    fn test_admit_rejects_non_finite(bad: f32) {
        let resampler = Resampler::new(16000);
        let mono = AudioBuffer::mono(vec![0.5, bad, 0.25], 16000);
        assert!(matches!(
            resampler.admit(&mono),
            Err(MixdownError::ResampleFailure { .. })
        ));
        assert!(matches!(
            resampler.admit_shared(Arc::new(mono)),
            Err(MixdownError::ResampleFailure { .. })
        ));

        let stereo = AudioBuffer::from_channels(vec![vec![0.1, 0.2], vec![bad, 0.2]], 44100).unwrap();
        assert!(matches!(
            resampler.admit(&stereo),
            Err(MixdownError::ResampleFailure { .. })
        ));
    }
}
