// THEORY:
// A `Window` is a square sample region ("patch") anchored at its top-left pixel.
// Windows are plain values: they are copied freely, compared by anchor, and carry
// no reference back to the mask they were found on.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A square region `[x, x + size) x [y, y + size)`.
///
/// Two windows are equal when their anchors match. Every window produced by a
/// single scan shares the same `size`, so the anchor alone identifies it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Window {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl Window {
    pub fn new(x: u32, y: u32, size: u32) -> Self {
        Self { x, y, size }
    }

    /// One past the last column covered by the window, saturating at `u32::MAX`.
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.size)
    }

    /// One past the last row covered by the window, saturating at `u32::MAX`.
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.size)
    }

    // Exact far edges. A window near `u32::MAX` reaches past the `u32` range.
    fn right_edge(&self) -> u64 {
        u64::from(self.x) + u64::from(self.size)
    }

    fn bottom_edge(&self) -> u64 {
        u64::from(self.y) + u64::from(self.size)
    }

    /// Whether the two axis-aligned rectangles share at least one pixel.
    /// Windows that merely touch along an edge do not intersect.
    pub fn intersects(&self, other: &Window) -> bool {
        u64::from(self.x) < other.right_edge()
            && u64::from(other.x) < self.right_edge()
            && u64::from(self.y) < other.bottom_edge()
            && u64::from(other.y) < self.bottom_edge()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x
            && u64::from(x) < self.right_edge()
            && y >= self.y
            && u64::from(y) < self.bottom_edge()
    }

    /// Whether the window lies entirely inside a `width x height` buffer.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right_edge() <= u64::from(width) && self.bottom_edge() <= u64::from(height)
    }
}

impl PartialEq for Window {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y
    }
}

impl Eq for Window {}

impl Hash for Window {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
    }
}
