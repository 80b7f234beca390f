//! Integration Tests
//!
//! End-to-end tests for the import -> timeline -> mix -> encode pipeline.

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use mixdown::engine::{decode_wav, generate_test_tone, normalize, AudioBuffer, Resampler};
use mixdown::render::{mix, render_snapshot, EncoderConfig, RenderContext};
use mixdown::timeline::{ClipKind, Timeline, TrimHandle};
use mixdown::MixdownError;

/// Mono ramp that never repeats, so misplaced samples are caught
fn ramp(len: usize, scale: f32, rate: u32) -> AudioBuffer {
    let samples = (0..len).map(|i| scale * ((i % 97) as f32 / 97.0)).collect();
    AudioBuffer::mono(samples, rate)
}

// === Timeline Scenarios ===

#[test]
fn test_overlapping_clips_sum() {
    let rate = 16000;
    let resampler = Resampler::new(rate);
    let a = generate_test_tone(220.0, 0.4, 2.0, rate);
    let b = generate_test_tone(330.0, 0.4, 2.0, rate);

    let mut timeline = Timeline::new(rate);
    timeline
        .add_clip_at(resampler.admit(&a).unwrap(), ClipKind::GeneratedSpeech, 0)
        .unwrap();
    timeline
        .add_clip_at(resampler.admit(&b).unwrap(), ClipKind::ImportedMusic, 16000)
        .unwrap();

    let outcome = mix(&timeline.snapshot(), &RenderContext::default()).unwrap();
    assert_eq!(outcome.buffer.len(), 48000);
    assert_abs_diff_eq!(outcome.buffer.duration_secs(), 3.0, epsilon = 1e-9);
    assert_eq!(outcome.gain, 1.0);

    let mixed = outcome.buffer.channel(0);
    for i in 16000..32000 {
        let expected = a.channel(0)[i] + b.channel(0)[i - 16000];
        assert_abs_diff_eq!(mixed[i], expected, epsilon = 1e-6);
    }
    // Outside the overlap only one clip sounds
    for i in 0..16000 {
        assert_abs_diff_eq!(mixed[i], a.channel(0)[i], epsilon = 1e-6);
    }
    for i in 32000..48000 {
        assert_abs_diff_eq!(mixed[i], b.channel(0)[i - 16000], epsilon = 1e-6);
    }
}

#[test]
fn test_downmix_and_halve_rate() {
    let left = vec![0.2, 0.4, -0.6, 0.8, 1.0, -1.0];
    let right = vec![0.0, 0.2, -0.2, 0.0, 0.0, 1.0];
    let stereo = AudioBuffer::from_channels(vec![left, right], 44100).unwrap();

    let mono = normalize(&stereo, 22050).unwrap();
    assert_eq!(mono.channels(), 1);
    assert_eq!(mono.sample_rate(), 22050);
    assert_eq!(mono.len(), 3);

    // Every second frame of the channel average
    let expected = [0.1f32, -0.4, 0.5];
    for (got, want) in mono.channel(0).iter().zip(expected) {
        assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
    }
}

#[test]
fn test_trim_end_before_start_clamps() {
    let rate = 8000;
    let mut timeline = Timeline::new(rate);
    let source = Resampler::new(rate).admit(&ramp(800, 0.5, rate)).unwrap();
    let clip = timeline.add_clip(source, ClipKind::ImportedMusic).unwrap();

    timeline.trim(clip.id(), TrimHandle::Start, 300).unwrap();
    let trimmed = timeline.trim(clip.id(), TrimHandle::End, 100).unwrap();
    assert_eq!(trimmed.trim_start(), 300);
    assert_eq!(trimmed.trim_end(), 301);
    assert_eq!(trimmed.trimmed_len(), 1);

    let outcome = mix(&timeline.snapshot(), &RenderContext::default()).unwrap();
    assert_eq!(outcome.buffer.len(), 1);
    assert_abs_diff_eq!(outcome.buffer.channel(0)[0], 0.5 * (300 % 97) as f32 / 97.0, epsilon = 1e-6);
}

// === Mixer Properties ===

#[test]
fn test_mix_is_order_independent() {
    let rate = 16000;
    let resampler = Resampler::new(rate);
    let buffers = [
        (ramp(4000, 0.9, rate), 0),
        (generate_test_tone(440.0, 0.8, 0.5, rate), 1500),
        (ramp(3000, -0.7, rate), 2500),
    ];

    let mut forward = Timeline::new(rate);
    for (buffer, at) in buffers.iter() {
        forward
            .add_clip_at(resampler.admit(buffer).unwrap(), ClipKind::ImportedMusic, *at)
            .unwrap();
    }
    let mut backward = Timeline::new(rate);
    for (buffer, at) in buffers.iter().rev() {
        backward
            .add_clip_at(resampler.admit(buffer).unwrap(), ClipKind::ImportedMusic, *at)
            .unwrap();
    }

    let a = mix(&forward.snapshot(), &RenderContext::default()).unwrap();
    let b = mix(&backward.snapshot(), &RenderContext::default()).unwrap();
    assert_eq!(a.buffer.len(), b.buffer.len());
    for (x, y) in a.buffer.channel(0).iter().zip(b.buffer.channel(0)) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
    }
}

#[test]
fn test_loud_overlap_is_normalized() {
    let rate = 16000;
    let resampler = Resampler::new(rate);
    let loud = AudioBuffer::mono(vec![0.9; 1000], rate);

    let mut timeline = Timeline::new(rate);
    for at in [0, 200, 400] {
        timeline
            .add_clip_at(resampler.admit(&loud).unwrap(), ClipKind::ImportedMusic, at)
            .unwrap();
    }

    let outcome = mix(&timeline.snapshot(), &RenderContext::default()).unwrap();
    assert_abs_diff_eq!(outcome.peak, 2.7, epsilon = 1e-5);
    assert!(outcome.buffer.peak() <= 1.0);
    assert_abs_diff_eq!(outcome.buffer.peak(), 1.0, epsilon = 1e-6);
    // Balance is kept: a single-clip region sits at a third of full scale
    assert_abs_diff_eq!(outcome.buffer.channel(0)[100], 1.0 / 3.0, epsilon = 1e-5);
}

#[test]
fn test_single_clip_renders_trimmed_length() {
    let rate = 24000;
    let mut timeline = Timeline::new(rate);
    let source = Resampler::new(rate).admit(&ramp(2400, 0.5, rate)).unwrap();
    let clip = timeline.add_clip(source, ClipKind::GeneratedSpeech).unwrap();
    timeline.trim(clip.id(), TrimHandle::Start, 400).unwrap();
    timeline.trim(clip.id(), TrimHandle::End, 2000).unwrap();
    timeline.move_clip(clip.id(), 0).unwrap();

    let result = render_snapshot(&timeline.snapshot(), &EncoderConfig::wav(), &RenderContext::default()).unwrap();
    assert_eq!(result.buffer.len(), 1600);

    let decoded = decode_wav(&result.bytes).unwrap();
    assert_eq!(decoded.len(), 1600);
    assert_eq!(decoded.sample_rate(), rate);
}

#[test]
fn test_empty_timeline_fails() {
    let timeline = Timeline::new(16000);
    let result = render_snapshot(&timeline.snapshot(), &EncoderConfig::wav(), &RenderContext::default());
    assert!(matches!(result, Err(MixdownError::EmptyTimeline)));
}

// === Rendering ===

#[test]
fn test_render_is_byte_identical() {
    let rate = 16000;
    let resampler = Resampler::new(rate);
    let mut timeline = Timeline::new(rate);
    timeline
        .add_clip(resampler.admit(&generate_test_tone(300.0, 0.7, 0.5, rate)).unwrap(), ClipKind::GeneratedSpeech)
        .unwrap();
    timeline
        .add_clip_at(resampler.admit(&ramp(5000, 0.6, rate)).unwrap(), ClipKind::ImportedMusic, 2000)
        .unwrap();

    let snapshot = timeline.snapshot();
    for config in [EncoderConfig::wav(), EncoderConfig::default()] {
        let first = render_snapshot(&snapshot, &config, &RenderContext::default()).unwrap();
        let second = render_snapshot(&snapshot, &config, &RenderContext::default()).unwrap();
        assert_eq!(first.digest, second.digest);
        assert!(first.bytes == second.bytes);
    }
}

#[test]
fn test_cancelled_render_yields_nothing() {
    let rate = 16000;
    let mut timeline = Timeline::new(rate);
    let source = Resampler::new(rate).admit(&ramp(16000, 0.5, rate)).unwrap();
    timeline.add_clip(source, ClipKind::ImportedMusic).unwrap();

    let token = CancellationToken::new();
    token.cancel();
    let result = render_snapshot(&timeline.snapshot(), &EncoderConfig::wav(), &RenderContext::new(token));
    assert!(matches!(result, Err(MixdownError::Cancelled)));
}

#[test]
fn test_snapshot_unaffected_by_later_edits() {
    let rate = 16000;
    let mut timeline = Timeline::new(rate);
    let source = Resampler::new(rate).admit(&ramp(1000, 0.5, rate)).unwrap();
    let clip = timeline.add_clip(source, ClipKind::ImportedMusic).unwrap();

    let snapshot = timeline.snapshot();
    timeline.move_clip(clip.id(), 5000).unwrap();
    timeline.remove(clip.id()).unwrap();

    let outcome = mix(&snapshot, &RenderContext::default()).unwrap();
    assert_eq!(outcome.buffer.len(), 1000);
}
