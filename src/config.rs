//! Configuration
//!
//! Settings come from an optional JSON file, then `MIXDOWN_*` environment
//! variables, then command-line flags (applied by the CLI).

use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MixdownError, Result};
use crate::render::EncoderConfig;
use crate::sources::TextBudget;

/// Default mix rate: what typical speech services produce natively
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Where and how to reach the speech service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechServiceConfig {
    pub base_url: String,
    /// Voice used when a request names none
    pub default_voice: Option<String>,
    pub timeout_ms: u64,
    /// Per-request text limit and what to do with longer text
    pub budget: TextBudget,
}

impl Default for SpeechServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            default_voice: None,
            timeout_ms: 60_000,
            budget: TextBudget::default(),
        }
    }
}

/// Top-level settings for a mixing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixdownConfig {
    pub target_sample_rate: u32,
    pub encoder: EncoderConfig,
    pub speech: SpeechServiceConfig,
}

impl Default for MixdownConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: DEFAULT_SAMPLE_RATE,
            encoder: EncoderConfig::default(),
            speech: SpeechServiceConfig::default(),
        }
    }
}

impl MixdownConfig {
    /// Read a JSON config file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MixdownError::FileNotFound {
                path: path.display().to_string(),
                source: None,
            });
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MIXDOWN_*` environment overrides
    pub fn apply_env(mut self) -> Result<Self> {
        if let Some(rate) = env_parse::<u32>("MIXDOWN_SAMPLE_RATE")? {
            self.target_sample_rate = rate;
        }
        if let Ok(url) = env::var("MIXDOWN_SPEECH_URL") {
            self.speech.base_url = url;
        }
        if let Some(timeout) = env_parse::<u64>("MIXDOWN_SPEECH_TIMEOUT_MS")? {
            self.speech.timeout_ms = timeout;
        }
        if let Some(limit) = env_parse::<usize>("MIXDOWN_SPEECH_CHAR_LIMIT")? {
            self.speech.budget.char_limit = limit;
        }
        if let Some(bitrate) = env_parse::<u32>("MIXDOWN_BITRATE_KBPS")? {
            self.encoder.bitrate_kbps = bitrate;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_sample_rate == 0 {
            return Err(MixdownError::Config {
                reason: "target_sample_rate must be positive".to_string(),
            });
        }
        if self.encoder.bitrate_kbps == 0 {
            return Err(MixdownError::Config {
                reason: "encoder.bitrate_kbps must be positive".to_string(),
            });
        }
        if self.speech.timeout_ms == 0 {
            return Err(MixdownError::Config {
                reason: "speech.timeout_ms must be positive".to_string(),
            });
        }
        self.speech.budget.validate()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| MixdownError::Config {
            reason: format!("{} has an invalid value '{}'", key, value),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::OutputFormat;
    use crate::sources::OverflowPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = MixdownConfig::default();
        assert_eq!(config.target_sample_rate, 24000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"target_sample_rate": 16000, "encoder": {{"format": "wav"}}}}"#
        )
        .unwrap();

        let config = MixdownConfig::load(file.path()).unwrap();
        assert_eq!(config.target_sample_rate, 16000);
        assert_eq!(config.encoder.format, OutputFormat::Wav);
        assert_eq!(config.encoder.bitrate_kbps, 128);
        assert_eq!(config.speech, SpeechServiceConfig::default());
    }

    #[test]
    fn test_load_rejects_zero_rate() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"target_sample_rate": 0}}"#).unwrap();
        assert!(matches!(
            MixdownConfig::load(file.path()),
            Err(MixdownError::Config { .. })
        ));
    }

    #[test]
    fn test_load_speech_budget() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"speech": {{"budget": {{"char_limit": 400, "overflow": "truncate"}}}}}}"#
        )
        .unwrap();

        let config = MixdownConfig::load(file.path()).unwrap();
        assert_eq!(config.speech.budget.char_limit, 400);
        assert_eq!(config.speech.budget.overflow, OverflowPolicy::Truncate);
        assert_eq!(config.speech.budget.max_input(), 348);
        assert_eq!(config.speech.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_load_rejects_empty_budget() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"speech": {{"budget": {{"char_limit": 0}}}}}}"#).unwrap();
        assert!(matches!(
            MixdownConfig::load(file.path()),
            Err(MixdownError::Config { .. })
        ));
    }

    #[test]
    fn test_load_malformed_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            MixdownConfig::load(file.path()),
            Err(MixdownError::Serialization(_))
        ));
    }
}
