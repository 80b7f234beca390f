//! File import decoding
//!
//! The decode step of importing a music file. Decoders return audio at the
//! file's native rate and layout; normalization happens afterwards.

use std::path::Path;

use crate::engine::{decode_wav, read_wav_file, AudioBuffer};
use crate::error::Result;

/// Turns raw file bytes into audio
pub trait AudioDecoder: Send + Sync {
    /// Short name of the container this decoder reads
    fn name(&self) -> &'static str;

    /// Decode a complete file
    ///
    /// # Errors
    /// * `DecodeFailure` - the bytes are not valid audio; nothing partial is returned
    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer>;
}

/// RIFF/WAVE decoder (8/16/24/32-bit integer, 32-bit float)
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl AudioDecoder for WavDecoder {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn decode(&self, bytes: &[u8]) -> Result<AudioBuffer> {
        decode_wav(bytes)
    }
}

/// Decode a file from disk with the WAV decoder
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    read_wav_file(path)
}
