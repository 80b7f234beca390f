//! Mix Benchmarks
//!
//! Performance benchmarks for normalization, mixing and encoding.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mixdown::engine::{generate_stereo_test_tone, generate_test_tone, normalize, Resampler};
use mixdown::render::{encode, mix, EncoderConfig, RenderContext};
use mixdown::timeline::{ClipKind, Timeline};

fn benchmark_normalize(c: &mut Criterion) {
    let stereo = generate_stereo_test_tone(220.0, 330.0, 10.0, 44100).unwrap();

    c.bench_function("normalize_10s_stereo_44k_to_24k", |b| {
        b.iter(|| normalize(black_box(&stereo), 24000).unwrap())
    });
}

fn benchmark_mix(c: &mut Criterion) {
    let rate = 24000;
    let resampler = Resampler::new(rate);
    let mut timeline = Timeline::new(rate);
    for i in 0..8 {
        let tone = generate_test_tone(200.0 + 50.0 * i as f32, 0.3, 5.0, rate);
        timeline
            .add_clip_at(resampler.admit(&tone).unwrap(), ClipKind::ImportedMusic, i * 12000)
            .unwrap();
    }
    let snapshot = timeline.snapshot();

    c.bench_function("mix_8_overlapping_clips", |b| {
        b.iter(|| mix(black_box(&snapshot), &RenderContext::default()).unwrap())
    });
}

fn benchmark_encode_wav(c: &mut Criterion) {
    let tone = generate_test_tone(440.0, 0.5, 10.0, 24000);

    c.bench_function("encode_wav_10s", |b| {
        b.iter(|| encode(black_box(&tone), &EncoderConfig::wav()).unwrap())
    });
}

criterion_group!(benches, benchmark_normalize, benchmark_mix, benchmark_encode_wav);
criterion_main!(benches);
