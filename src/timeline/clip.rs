//! Clips
//!
//! A clip is a window `[trim_start, trim_end)` into a shared source buffer,
//! placed at `position` samples on the output timeline.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{AudioBuffer, MixSource};

/// Stable unique clip identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClipId(Uuid);

impl ClipId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a clip's audio came from. Mixing treats both kinds the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    GeneratedSpeech,
    ImportedMusic,
}

impl fmt::Display for ClipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipKind::GeneratedSpeech => write!(f, "speech"),
            ClipKind::ImportedMusic => write!(f, "music"),
        }
    }
}

/// Which edge of a clip a trim moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrimHandle {
    Start,
    End,
}

/// A trimmed, positioned reference to normalized audio
///
/// Invariant: `0 <= trim_start < trim_end <= source.len()`. Every setter
/// clamps into that range instead of failing.
#[derive(Debug, Clone)]
pub struct Clip {
    id: ClipId,
    source: Arc<AudioBuffer>,
    trim_start: usize,
    trim_end: usize,
    position: usize,
    kind: ClipKind,
}

impl Clip {
    /// Create a clip spanning the whole source
    pub(crate) fn new(source: MixSource, kind: ClipKind, position: usize) -> Self {
        let source = Arc::clone(source.buffer());
        let trim_end = source.len();
        Self {
            id: ClipId::new(),
            source,
            trim_start: 0,
            trim_end,
            position,
            kind,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    pub fn kind(&self) -> ClipKind {
        self.kind
    }

    /// Shared source samples
    pub fn source(&self) -> &Arc<AudioBuffer> {
        &self.source
    }

    /// Length of the source in samples
    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn trim_start(&self) -> usize {
        self.trim_start
    }

    pub fn trim_end(&self) -> usize {
        self.trim_end
    }

    /// Timeline offset in samples where the trimmed region begins
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of samples this clip contributes
    pub fn trimmed_len(&self) -> usize {
        self.trim_end.saturating_sub(self.trim_start)
    }

    /// First timeline sample after this clip, saturating at `usize::MAX`
    pub fn end_position(&self) -> usize {
        self.position.saturating_add(self.trimmed_len())
    }

    /// The samples this clip contributes, in order
    pub fn trimmed_samples(&self) -> &[f32] {
        let channel = self.source.channel(0);
        let end = self.trim_end.min(channel.len());
        let start = self.trim_start.min(end);
        &channel[start..end]
    }

    /// Move one trim handle, clamping so at least one sample remains
    ///
    /// Returns the value the handle actually landed on.
    pub(crate) fn set_trim(&mut self, handle: TrimHandle, offset: i64) -> usize {
        let offset = offset.max(0) as u64;
        match handle {
            TrimHandle::Start => {
                let max = self.trim_end.saturating_sub(1) as u64;
                self.trim_start = offset.min(max) as usize;
                self.trim_start
            }
            TrimHandle::End => {
                let min = self.trim_start as u64 + 1;
                let max = self.source.len() as u64;
                self.trim_end = offset.clamp(min, max) as usize;
                self.trim_end
            }
        }
    }

    /// Set the timeline position, clamping negatives to zero
    pub(crate) fn set_position(&mut self, position: i64) -> usize {
        self.position = usize::try_from(position.max(0)).unwrap_or(usize::MAX);
        self.position
    }
}
