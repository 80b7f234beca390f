//! WAV reading and test signal generation
//!
//! Decodes WAV data of any common bit depth into float samples at the file's
//! native rate and channel count. Conversion to the mix format is left to
//! [`crate::engine::resample`].

use std::io::{Cursor, Read};
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::AudioBuffer;
use crate::error::{MixdownError, Result};

/// Decode an in-memory WAV file
///
/// # Errors
/// * `DecodeFailure` - malformed header, truncated data, unsupported bit depth
///   or a file with no samples
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| MixdownError::DecodeFailure {
        reason: format!("Failed to parse WAV header: {}", e),
        source: Some(Box::new(e)),
    })?;
    decode_reader(reader)
}

/// Decode a WAV file from disk
///
/// # Errors
/// * `FileNotFound` - the path does not exist
/// * `DecodeFailure` - the file is not valid WAV audio
pub fn read_wav_file(path: &Path) -> Result<AudioBuffer> {
    if !path.exists() {
        return Err(MixdownError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| MixdownError::DecodeFailure {
        reason: format!("Failed to open WAV file {}: {}", path.display(), e),
        source: Some(Box::new(e)),
    })?;
    decode_reader(reader)
}

fn decode_reader<R: Read>(reader: WavReader<R>) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(MixdownError::InvalidChannelLayout { channels });
    }

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    if interleaved.is_empty() {
        return Err(MixdownError::decode("WAV file contains no samples"));
    }

    // Truncated final frame: drop the partial samples
    let whole = interleaved.len() - interleaved.len() % channels;
    let buffer = AudioBuffer::from_interleaved(&interleaved[..whole], channels, spec.sample_rate)?;
    if !buffer.is_finite() {
        return Err(MixdownError::decode("WAV file contains NaN or infinite samples"));
    }
    Ok(buffer)
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let failed = |bits: u16| {
        move |e: hound::Error| MixdownError::DecodeFailure {
            reason: format!("Failed to read {}-bit samples: {}", bits, e),
            source: Some(Box::new(e)),
        }
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(failed(bits_per_sample)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                _ => {
                    return Err(MixdownError::decode(format!(
                        "{}-bit integer audio is not supported",
                        bits_per_sample
                    )))
                }
            };
            // hound widens every integer depth into i32
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f64 / scale) as f32))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(failed(bits_per_sample))
        }
    }
}

/// Generate a mono sine wave
pub fn generate_test_tone(
    frequency: f32,
    amplitude: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> AudioBuffer {
    let num_samples = (duration_secs * sample_rate as f32).round() as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;

    let samples = (0..num_samples)
        .map(|i| amplitude * (angular_freq * i as f32).sin())
        .collect();
    AudioBuffer::mono(samples, sample_rate)
}

/// Generate a stereo buffer with a different sine wave per channel
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    let left = generate_test_tone(freq_left, 0.5, duration_secs, sample_rate);
    let right = generate_test_tone(freq_right, 0.5, duration_secs, sample_rate);
    let channels = vec![left.into_channels().remove(0), right.into_channels().remove(0)];
    AudioBuffer::from_channels(channels, sample_rate)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn wav_bytes(spec: WavSpec, write: impl FnOnce(&mut WavWriter<Cursor<&mut Vec<u8>>>)) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        bytes
    }

    #[test]
    fn test_decode_16bit_stereo() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| {
            for s in [16384i16, -16384, 0, 32767] {
                w.write_sample(s).unwrap();
            }
        });

        let buffer = decode_wav(&bytes).unwrap();
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 2);
        assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-6);
        assert!((buffer.channel(1)[0] + 0.5).abs() < 1e-6);
        assert!((buffer.channel(1)[1] - 0.99997).abs() < 1e-4);
    }

    #[test]
    fn test_decode_float() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let bytes = wav_bytes(spec, |w| {
            for s in [0.25f32, -0.75, 1.0] {
                w.write_sample(s).unwrap();
            }
        });

        let buffer = decode_wav(&bytes).unwrap();
        assert_eq!(buffer.channel(0), &[0.25f32, -0.75, 1.0][..]);
    }

    #[test]
    fn test_decode_float_rejects_non_finite() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 24000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let bytes = wav_bytes(spec, |w| {
            for s in [0.5f32, f32::NAN, 0.25, f32::INFINITY, 0.1] {
                w.write_sample(s).unwrap();
            }
        });

        match decode_wav(&bytes) {
            Err(MixdownError::DecodeFailure { reason, .. }) => assert!(reason.contains("infinite")),
            other => panic!("Expected DecodeFailure, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result = decode_wav(b"definitely not a riff file");
        assert!(matches!(result, Err(MixdownError::DecodeFailure { .. })));
    }

    #[test]
    fn test_decode_empty_data_fails() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |_| {});
        assert!(matches!(
            decode_wav(&bytes),
            Err(MixdownError::DecodeFailure { .. })
        ));
    }

    #[test]
    fn test_read_wav_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..160 {
            writer.write_sample(4194304i32).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = read_wav_file(&path).unwrap();
        assert_eq!(buffer.len(), 160);
        assert!((buffer.channel(0)[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_read_nonexistent_file() {
        match read_wav_file(Path::new("/nonexistent/path/audio.wav")) {
            Err(MixdownError::FileNotFound { path, .. }) => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound error, got: {:?}", other),
        }
    }

    #[test]
    fn test_generate_test_tone() {
        let buffer = generate_test_tone(440.0, 0.5, 1.0, 16000);
        assert_eq!(buffer.len(), 16000);
        assert_eq!(buffer.channels(), 1);
        assert!(buffer.peak() <= 0.5 + 1e-6);
    }

    #[test]
    fn test_generate_stereo_test_tone() {
        let buffer = generate_stereo_test_tone(440.0, 880.0, 0.5, 16000).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.len(), 8000);
        assert!((buffer.channel(0)[100] - buffer.channel(1)[100]).abs() > 0.01);
    }
}
