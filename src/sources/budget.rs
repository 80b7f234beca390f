//! Speech text budget
//!
//! Speech services cap how much text one request may carry. A `TextBudget`
//! keeps headroom below the advertised limit and decides what happens to text
//! that does not fit: split it into several requests, or cut it short.

use serde::{Deserialize, Serialize};

use crate::error::{MixdownError, Result};

/// Marks text that was cut short
pub const TRUNCATION_MARK: &str = "…";

/// What to do with text longer than the budget allows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Synthesize the text in several pieces and join the audio
    #[default]
    Chunk,
    /// Keep the head of the text and end it with `TRUNCATION_MARK`
    Truncate,
}

/// Character budget for one speech request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBudget {
    /// Characters the service accepts per request
    pub char_limit: usize,
    /// Share of `char_limit` actually used; the rest is headroom
    pub safety_ratio: f64,
    /// Characters reserved for anything the service adds on its side
    pub extra_overhead: usize,
    pub overflow: OverflowPolicy,
}

impl Default for TextBudget {
    fn default() -> Self {
        Self {
            char_limit: 1000,
            safety_ratio: 0.87,
            extra_overhead: 0,
            overflow: OverflowPolicy::Chunk,
        }
    }
}

impl TextBudget {
    /// Most characters a single request may carry
    pub fn max_input(&self) -> usize {
        let usable = (self.char_limit as f64 * self.safety_ratio).floor() as usize;
        usable.saturating_sub(self.extra_overhead)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.safety_ratio > 0.0 && self.safety_ratio <= 1.0) {
            return Err(MixdownError::Config {
                reason: format!(
                    "speech.budget.safety_ratio must be in (0, 1], got {}",
                    self.safety_ratio
                ),
            });
        }
        if self.max_input() == 0 {
            return Err(MixdownError::Config {
                reason: format!(
                    "speech.budget leaves no room for text (char_limit {}, overhead {})",
                    self.char_limit, self.extra_overhead
                ),
            });
        }
        Ok(())
    }

    /// Texts to send, in order, so that each fits the budget
    pub fn split(&self, text: &str) -> Vec<String> {
        let max = self.max_input();
        if text.chars().count() <= max {
            return vec![text.to_string()];
        }
        match self.overflow {
            OverflowPolicy::Truncate => vec![truncate_text(text, max)],
            OverflowPolicy::Chunk => chunk_text(text, max),
        }
    }
}

// ============================================================================
// Text helpers
// ============================================================================

/// Shorten `text` to at most `max_chars` characters
///
/// When there is room, the last character is replaced by `TRUNCATION_MARK`.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mark_len = TRUNCATION_MARK.chars().count();
    if max_chars > mark_len {
        let mut out: String = text.chars().take(max_chars - mark_len).collect();
        out.push_str(TRUNCATION_MARK);
        out
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Split `text` into pieces of at most `chunk_size` characters
///
/// Pieces end at the last whitespace inside the window when there is one, so
/// words stay whole. Pieces are trimmed and blank ones dropped.
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());
        if end < chars.len() {
            if let Some(space) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if space > 0 {
                    end = start + space;
                }
            }
        }
        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = end;
    }
    pieces
}
