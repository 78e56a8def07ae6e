//! The ordered image collection and the cursor that walks it.
//!
//! `ImageSet` is the single owner of the image order. Changing the traversal
//! mode reorders the whole list but always keeps the image under the cursor
//! the same; only the positions of the other images move.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, ViewerError};

/// Swap window of the locality-preserving shuffle.
const SHUFFLE_WINDOW: usize = 20;

// ---------------------------------------------------------------------------
// Image references
// ---------------------------------------------------------------------------

/// Handle to one image on disk. Two refs are the same image when their paths
/// are equal.
#[derive(Debug, Clone)]
pub struct ImageRef {
    path: PathBuf,
    created: i64,
}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            created: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creation timestamp placeholder, always 0 for now.
    #[allow(dead_code)]
    pub fn created(&self) -> i64 {
        self.created
    }
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ImageRef {}

/// Plain byte-wise comparison of the path text, not component-wise.
pub fn by_path(a: &ImageRef, b: &ImageRef) -> Ordering {
    a.path.as_os_str().cmp(b.path.as_os_str())
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    Ordered,
    Shuffled,
    Random,
}

impl TraversalMode {
    pub fn label(self) -> &'static str {
        match self {
            TraversalMode::Ordered => "ordered",
            TraversalMode::Shuffled => "shuffled",
            TraversalMode::Random => "random",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

// ---------------------------------------------------------------------------
// Image set
// ---------------------------------------------------------------------------

pub struct ImageSet {
    images: Vec<ImageRef>,
    pos: usize,
    mode: TraversalMode,
    rng: StdRng,
}

impl ImageSet {
    pub fn new(images: Vec<ImageRef>) -> Self {
        Self::with_rng(images, StdRng::from_os_rng())
    }

    /// Build a set with a caller-supplied random source, used for
    /// reproducible shuffles.
    pub fn with_rng(images: Vec<ImageRef>, rng: StdRng) -> Self {
        Self {
            images,
            pos: 0,
            mode: TraversalMode::Ordered,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }

    #[cfg(test)]
    pub fn images(&self) -> &[ImageRef] {
        &self.images
    }

    /// The image under the cursor.
    pub fn current(&self) -> Result<&ImageRef> {
        self.images.get(self.pos).ok_or(ViewerError::EmptyCollection)
    }

    /// The image next to the cursor in the given direction, wrapping the same
    /// way `advance`/`retreat` do. `None` when there is no distinct neighbour.
    pub fn neighbor(&self, direction: Direction) -> Option<&ImageRef> {
        let len = self.images.len();
        if len < 2 {
            return None;
        }
        let idx = match direction {
            Direction::Forward => {
                if self.pos + 1 >= len {
                    0
                } else {
                    self.pos + 1
                }
            }
            Direction::Backward => {
                if self.pos == 0 {
                    len - 1
                } else {
                    self.pos - 1
                }
            }
        };
        self.images.get(idx)
    }

    /// Switch traversal mode, reordering the list. No-op when `mode` is
    /// already active.
    pub fn set_mode(&mut self, mode: TraversalMode) {
        if mode == self.mode {
            return;
        }
        log::debug!("Flipping from {} to {}", self.mode.label(), mode.label());

        let anchor = self.images.get(self.pos).cloned();

        match mode {
            TraversalMode::Ordered => self.images.sort_by(by_path),
            TraversalMode::Shuffled => {
                if self.mode != TraversalMode::Ordered {
                    self.images.sort_by(by_path);
                }
                local_shuffle(&mut self.images, &mut self.rng);
            }
            TraversalMode::Random => {
                let rng = &mut self.rng;
                self.images.sort_by_cached_key(|_| rng.random::<u64>());
            }
        }

        self.mode = mode;
        if let Some(anchor) = anchor {
            self.pos = self
                .images
                .iter()
                .position(|img| *img == anchor)
                .unwrap_or(0);
        }
    }

    /// Move forward `count` images in `mode`. Past the end wraps to the first
    /// image.
    pub fn advance(&mut self, mode: TraversalMode, count: usize) {
        if self.images.is_empty() {
            return;
        }
        self.set_mode(mode);
        let next = self.pos.saturating_add(count);
        self.pos = if next >= self.images.len() { 0 } else { next };
    }

    /// Move back `count` images in `mode`. Before the start wraps to the last
    /// image.
    pub fn retreat(&mut self, mode: TraversalMode, count: usize) {
        if self.images.is_empty() {
            return;
        }
        self.set_mode(mode);
        self.pos = match self.pos.checked_sub(count) {
            Some(p) => p,
            None => self.images.len() - 1,
        };
    }

    /// Put the cursor on `index`. Out-of-range indices are rejected.
    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        if index >= self.images.len() {
            return Err(ViewerError::IndexOutOfRange {
                index,
                len: self.images.len(),
            });
        }
        self.pos = index;
        Ok(())
    }

    pub fn last_index(&self) -> Option<usize> {
        self.images.len().checked_sub(1)
    }

    /// Drop the image under the cursor. The cursor keeps its index, so it now
    /// points at the following image; if it falls off the end it resets to 0.
    pub fn remove_current(&mut self) -> Option<ImageRef> {
        if self.pos >= self.images.len() {
            return None;
        }
        let removed = self.images.remove(self.pos);
        if self.pos >= self.images.len() {
            self.pos = 0;
        }
        Some(removed)
    }
}

/// Riffle each element with a partner from the next `SHUFFLE_WINDOW`
/// elements. Near the tail the partner comes from `0..len - i` instead.
/// Keeps rough locality, not a uniform permutation.
fn local_shuffle<T, R: Rng>(items: &mut [T], rng: &mut R) {
    let len = items.len();
    for i in 0..len.saturating_sub(1) {
        let swap_idx = if i + SHUFFLE_WINDOW < len {
            rng.random_range(i + 1..=i + SHUFFLE_WINDOW)
        } else {
            rng.random_range(0..len - i)
        };
        items.swap(i, swap_idx);
    }
}
