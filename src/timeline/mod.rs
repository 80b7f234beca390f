//! Timeline
//!
//! The editable set of clips for one session. Clip order on the timeline is
//! defined by position alone; insertion order is never observable in a render.
//!
//! Every successful mutation bumps [`Timeline::revision`], which is how stale
//! render results are recognized.

mod clip;

pub use clip::{Clip, ClipId, ClipKind, TrimHandle};

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::engine::MixSource;
use crate::error::{MixdownError, Result};

/// Editable clip registry with a fixed mono mix format
#[derive(Debug, Clone)]
pub struct Timeline {
    target_sample_rate: u32,
    clips: HashMap<ClipId, Clip>,
    revision: u64,
}

impl Timeline {
    /// Create an empty timeline mixing at `target_sample_rate`
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            target_sample_rate,
            clips: HashMap::new(),
            revision: 0,
        }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Output channel count; the mix is always mono
    pub fn target_channels(&self) -> usize {
        1
    }

    /// Counter bumped by every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(&id)
    }

    /// Clips ordered by position (ties broken by id for a stable order)
    pub fn clips_by_position(&self) -> Vec<&Clip> {
        let mut clips: Vec<&Clip> = self.clips.values().collect();
        clips.sort_by_key(|c| (c.position(), c.id()));
        clips
    }

    /// Total length in samples: the furthest clip end
    pub fn duration_samples(&self) -> usize {
        self.clips
            .values()
            .map(Clip::end_position)
            .max()
            .unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_samples() as f64 / self.target_sample_rate as f64
    }

    /// Append a clip at the current end of the timeline
    pub fn add_clip(&mut self, source: MixSource, kind: ClipKind) -> Result<Clip> {
        let position = i64::try_from(self.duration_samples()).unwrap_or(i64::MAX);
        self.add_clip_at(source, kind, position)
    }

    /// Add a clip at an explicit position (negative positions clamp to 0)
    ///
    /// # Errors
    /// * `FormatMismatch` - the source was normalized for a different rate
    pub fn add_clip_at(&mut self, source: MixSource, kind: ClipKind, position: i64) -> Result<Clip> {
        let buffer = source.buffer();
        if buffer.sample_rate() != self.target_sample_rate || buffer.channels() != 1 {
            return Err(MixdownError::FormatMismatch {
                expected_rate: self.target_sample_rate,
                actual_rate: buffer.sample_rate(),
                channels: buffer.channels(),
            });
        }

        let clip = Clip::new(source, kind, position.max(0) as usize);
        debug!(
            id = %clip.id(),
            %kind,
            position = clip.position(),
            len = clip.trimmed_len(),
            "added clip"
        );
        self.clips.insert(clip.id(), clip.clone());
        self.revision += 1;
        Ok(clip)
    }

    /// Move a trim handle, clamping to keep at least one sample
    ///
    /// Returns the updated clip.
    pub fn trim(&mut self, id: ClipId, handle: TrimHandle, offset: i64) -> Result<&Clip> {
        let clip = self.clips.get_mut(&id).ok_or_else(|| not_found(id))?;
        let landed = clip.set_trim(handle, offset);
        if landed as i64 != offset {
            warn!(%id, ?handle, requested = offset, landed, "trim clamped");
        }
        self.revision += 1;
        Ok(&*clip)
    }

    /// Move a clip; negative positions clamp to 0 and there is no upper bound
    pub fn move_clip(&mut self, id: ClipId, position: i64) -> Result<&Clip> {
        let clip = self.clips.get_mut(&id).ok_or_else(|| not_found(id))?;
        let landed = clip.set_position(position);
        if landed as i64 != position {
            warn!(%id, requested = position, landed, "move clamped");
        }
        self.revision += 1;
        Ok(&*clip)
    }

    /// Remove a clip and return it
    pub fn remove(&mut self, id: ClipId) -> Result<Clip> {
        let clip = self.clips.remove(&id).ok_or_else(|| not_found(id))?;
        debug!(%id, "removed clip");
        self.revision += 1;
        Ok(clip)
    }

    /// Immutable copy for rendering
    ///
    /// Clip records are copied and source buffers are shared, so later edits
    /// never reach a snapshot and the timeline is never locked.
    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            sample_rate: self.target_sample_rate,
            revision: self.revision,
            clips: self.clips_by_position().into_iter().cloned().collect(),
        }
    }
}

fn not_found(id: ClipId) -> MixdownError {
    MixdownError::ClipNotFound { id: id.to_string() }
}

/// Frozen view of a timeline at one revision
#[derive(Debug, Clone)]
pub struct TimelineSnapshot {
    sample_rate: u32,
    revision: u64,
    clips: Vec<Clip>,
}

impl TimelineSnapshot {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clips in position order
    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn duration_samples(&self) -> usize {
        self.clips.iter().map(Clip::end_position).max().unwrap_or(0)
    }
}
