//! Audio producers
//!
//! The collaborators that hand audio to a session: the file import decoder
//! and the speech service, plus the text budget applied to speech requests.

pub mod budget;
pub mod decode;
pub mod speech;

pub use budget::{chunk_text, truncate_text, OverflowPolicy, TextBudget};
pub use decode::{decode_file, AudioDecoder, WavDecoder};
pub use speech::{HttpSpeechSynthesizer, MockSpeechSynthesizer, SpeechRequest, SpeechSynthesizer};
