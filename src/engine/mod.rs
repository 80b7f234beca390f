//! Audio Engine Module
//!
//! Core audio primitives:
//! - Audio buffer type
//! - Resampling and downmixing into the mix format
//! - WAV decoding and test signal generation

pub mod buffer;
pub mod io;
pub mod resample;

pub use buffer::{calculate_peak, calculate_rms, linear_to_db, AudioBuffer};
pub use io::{decode_wav, generate_stereo_test_tone, generate_test_tone, read_wav_file};
pub use resample::{normalize, MixSource, Resampler};
