//! Error handling for Mixdown
//!
//! Every error carries a stable code and, where it makes sense, recovery
//! suggestions for the user.

use thiserror::Error;

/// Result type alias for Mixdown operations
pub type Result<T> = std::result::Result<T, MixdownError>;

/// Main error type for Mixdown operations
#[derive(Error, Debug)]
pub enum MixdownError {
    // Normalization Errors
    #[error("Invalid channel layout: {channels} channels")]
    InvalidChannelLayout { channels: usize },

    #[error("Resample failed: {reason}")]
    ResampleFailure { reason: String },

    #[error("Source format mismatch: expected mono at {expected_rate} Hz, got {channels} channel(s) at {actual_rate} Hz")]
    FormatMismatch {
        expected_rate: u32,
        actual_rate: u32,
        channels: usize,
    },

    // Timeline Errors
    #[error("Clip not found: {id}")]
    ClipNotFound { id: String },

    #[error("Timeline has no clips to render")]
    EmptyTimeline,

    // Collaborator Errors
    #[error("File not found: {path}")]
    FileNotFound {
        path: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Decode failed: {reason}")]
    DecodeFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Speech service error: {reason}")]
    SpeechService {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Render Errors
    #[error("Encode failed: {reason}")]
    EncodeFailure { reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MixdownError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            MixdownError::InvalidChannelLayout { .. } => "INVALID_CHANNEL_LAYOUT",
            MixdownError::ResampleFailure { .. } => "RESAMPLE_FAILURE",
            MixdownError::FormatMismatch { .. } => "FORMAT_MISMATCH",
            MixdownError::ClipNotFound { .. } => "CLIP_NOT_FOUND",
            MixdownError::EmptyTimeline => "EMPTY_TIMELINE",
            MixdownError::FileNotFound { .. } => "FILE_NOT_FOUND",
            MixdownError::DecodeFailure { .. } => "DECODE_FAILURE",
            MixdownError::SpeechService { .. } => "SPEECH_SERVICE",
            MixdownError::EncodeFailure { .. } => "ENCODE_FAILURE",
            MixdownError::Cancelled => "CANCELLED_OPERATION",
            MixdownError::TaskFailed { .. } => "TASK_FAILED",
            MixdownError::Config { .. } => "CONFIG_ERROR",
            MixdownError::Io(_) => "IO_ERROR",
            MixdownError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Cancellation is a terminal outcome requested by the user, not a fault.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, MixdownError::Cancelled)
    }

    /// Check if the user can retry after addressing the cause
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MixdownError::ClipNotFound { .. }
                | MixdownError::EmptyTimeline
                | MixdownError::FileNotFound { .. }
                | MixdownError::DecodeFailure { .. }
                | MixdownError::SpeechService { .. }
                | MixdownError::EncodeFailure { .. }
                | MixdownError::Cancelled
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            MixdownError::EmptyTimeline => vec![
                "Import a music file or generate a speech segment first",
            ],
            MixdownError::FileNotFound { .. } => vec![
                "Check the file path is correct",
                "Verify the file hasn't been moved or deleted",
            ],
            MixdownError::DecodeFailure { .. } => vec![
                "Convert the file to WAV format first",
                "The file may be corrupted - try re-exporting from source",
            ],
            MixdownError::SpeechService { .. } => vec![
                "Check that the speech service is running",
                "Verify the configured service URL",
                "Try a shorter text segment",
            ],
            MixdownError::EncodeFailure { .. } => vec![
                "Use a positive bitrate",
                "Try WAV output if MP3 encoding is unavailable",
            ],
            MixdownError::Config { .. } => vec![
                "Check the configuration file and MIXDOWN_* environment variables",
            ],
            _ => vec![],
        }
    }

    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        MixdownError::DecodeFailure {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn encode(reason: impl Into<String>) -> Self {
        MixdownError::EncodeFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn resample(reason: impl Into<String>) -> Self {
        MixdownError::ResampleFailure {
            reason: reason.into(),
        }
    }
}

impl From<tokio::task::JoinError> for MixdownError {
    fn from(err: tokio::task::JoinError) -> Self {
        MixdownError::TaskFailed {
            reason: err.to_string(),
        }
    }
}
