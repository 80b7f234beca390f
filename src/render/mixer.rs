//! Mixer
//!
//! Additive summation of every clip into one mono buffer, followed by global
//! peak normalization. Overlaps are summed, never hard-clipped: when the sum
//! peaks above full scale the whole mix is scaled down by `1 / peak`, which
//! keeps the balance between clips intact.

use tracing::debug;

use crate::engine::AudioBuffer;
use crate::error::{MixdownError, Result};
use crate::render::{RenderContext, RenderStage};
use crate::timeline::TimelineSnapshot;

/// Full-scale amplitude
const FULL_SCALE: f64 = 1.0;

/// Mixed audio plus what normalization did to it
#[derive(Debug, Clone)]
pub struct MixOutcome {
    pub buffer: AudioBuffer,
    /// Largest absolute value of the raw sum
    pub peak: f64,
    /// Applied scale factor, 1.0 when the sum already fit
    pub gain: f64,
}

/// Flatten a snapshot into a mono buffer at the snapshot's rate
///
/// The output is exactly as long as the furthest clip end. Clips are summed
/// in f64 and in position order, so the result does not depend on the order
/// clips were added.
///
/// # Errors
/// * `EmptyTimeline` - the snapshot has no clips
/// * `EncodeFailure` - the mix is too long to allocate
/// * `Cancelled` - cancellation was requested between clips
pub fn mix(snapshot: &TimelineSnapshot, ctx: &RenderContext) -> Result<MixOutcome> {
    if snapshot.is_empty() {
        return Err(MixdownError::EmptyTimeline);
    }

    let clips = snapshot.clips();
    let total_clips = clips.len() as u64;
    let length = snapshot.duration_samples();
    let mut sum: Vec<f64> = Vec::new();
    sum.try_reserve_exact(length).map_err(|e| {
        MixdownError::encode(format!("cannot allocate a {} sample mix: {}", length, e))
    })?;
    sum.resize(length, 0.0);

    ctx.report(RenderStage::Mixing, 0, total_clips);
    for (done, clip) in clips.iter().enumerate() {
        ctx.checkpoint()?;

        let samples = clip.trimmed_samples();
        let start = clip.position();
        for (out, &sample) in sum[start..start + samples.len()].iter_mut().zip(samples) {
            *out += sample as f64;
        }

        ctx.report(RenderStage::Mixing, done as u64 + 1, total_clips);
    }

    let peak = sum.iter().fold(0.0_f64, |peak, s| peak.max(s.abs()));
    let (samples, gain): (Vec<f32>, f64) = if peak > FULL_SCALE {
        (sum.iter().map(|&s| (s / peak) as f32).collect(), FULL_SCALE / peak)
    } else {
        (sum.iter().map(|&s| s as f32).collect(), 1.0)
    };

    debug!(
        clips = clips.len(),
        length,
        peak,
        gain,
        "mixed timeline"
    );

    Ok(MixOutcome {
        buffer: AudioBuffer::mono(samples, snapshot.sample_rate()),
        peak,
        gain,
    })
}
