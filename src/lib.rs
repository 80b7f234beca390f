//! Mixdown - Timeline Audio Mixing Engine
//!
//! Mixdown places generated speech and imported music on a single mono
//! timeline and flattens it into one encoded file.
//!
//! # Architecture
//!
//! Audio flows one way:
//! - Sources: speech service and file import produce buffers in any format
//! - Resampler: every buffer is downmixed to mono at the session rate
//! - Timeline: clips reference normalized buffers with trim and position
//! - Render: snapshot, sum, peak-normalize, encode (in the background)

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod render;
pub mod session;
pub mod sources;
pub mod timeline;

pub use config::{MixdownConfig, SpeechServiceConfig};
pub use engine::{AudioBuffer, MixSource, Resampler};
pub use error::{MixdownError, Result};
pub use render::{EncodeQuality, EncoderConfig, OutputFormat, RenderJob, RenderProgress, RenderResult, RenderStage};
pub use session::Session;
pub use sources::{AudioDecoder, OverflowPolicy, SpeechRequest, SpeechSynthesizer, TextBudget};
pub use timeline::{Clip, ClipId, ClipKind, Timeline, TimelineSnapshot, TrimHandle};
