use std::collections::BTreeSet;
use std::fmt::Debug;

/// Index of a buffer in the pool.
pub type FrameId = usize;

pub trait Replacer: Send + Sync + Debug {
    /// Select a frame to reassign and stop tracking it. Returns None if every frame is pinned.
    fn evict(&mut self) -> Option<FrameId>;

    /// Mark a frame as pinned (not evictable).
    fn pin(&mut self, frame_id: FrameId);

    /// Mark a frame as unpinned (evictable).
    fn unpin(&mut self, frame_id: FrameId);

    /// Get the number of evictable frames.
    fn size(&self) -> usize;
}

/// Picks the unpinned frame with the lowest index, with no regard for recency.
#[derive(Debug, Default)]
pub struct FirstFitReplacer {
    unpinned: BTreeSet<FrameId>,
}

impl FirstFitReplacer {
    /// A replacer over `frames` frames, all of them initially evictable.
    pub fn new(frames: usize) -> Self {
        Self {
            unpinned: (0..frames).collect(),
        }
    }
}

impl Replacer for FirstFitReplacer {
    fn evict(&mut self) -> Option<FrameId> {
        self.unpinned.pop_first()
    }

    fn pin(&mut self, frame_id: FrameId) {
        self.unpinned.remove(&frame_id);
    }

    fn unpin(&mut self, frame_id: FrameId) {
        self.unpinned.insert(frame_id);
    }

    fn size(&self) -> usize {
        self.unpinned.len()
    }
}
