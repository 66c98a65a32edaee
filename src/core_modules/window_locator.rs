// THEORY:
// The `WindowLocator` turns a binary mask into a list of non-overlapping square
// sample windows that sit on foreground. It is a greedy, single-pass sampler
// built for throughput rather than an optimal packing.
//
// Algorithm steps:
// 1.  **Row Decimation**: Only every `row_stride`-th row is scanned. Windows are
//     anchored on scanned rows, so vertically they tile at multiples of the stride.
// 2.  **Sparse Column Probing**: Inside a row the scan probes one column every
//     `window_size` pixels. A probe that lands on background is skipped.
// 3.  **Left-Edge Alignment**: A probe that lands on foreground walks back towards
//     the start of its foreground run, at most `window_size` pixels and never into
//     a window already accepted on this row. The leftmost foreground pixel reached
//     becomes the candidate anchor.
// 4.  **Fit Check**: The candidate must stay inside the mask, must not intersect
//     any accepted window, and its top, right and bottom edges must be foreground.
//     In `FitMode::Sparse` the edges are sampled every `sample_stride` pixels; in
//     `FitMode::Exhaustive` every pixel of the region is checked instead.
// 5.  **No Backtracking**: Accepted or not, the scan moves on. Later placements
//     depend on earlier ones, so the output is order dependent by construction.
//
// The locator is a stateless utility: it reads the mask, returns windows in
// discovery order (top to bottom, left to right) and keeps nothing.

use crate::core_modules::mask::Mask;
use crate::core_modules::window::Window;
use crate::error::{PatchError, Result};
use serde::{Deserialize, Serialize};

/// Default spacing of the boundary samples taken by the sparse fit check.
pub const DEFAULT_SAMPLE_STRIDE: u32 = 10;

/// How thoroughly a candidate window is verified against the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitMode {
    /// Sample the top, right and bottom edges every `sample_stride` pixels.
    #[default]
    Sparse,
    /// Require every pixel of the candidate region to be foreground.
    Exhaustive,
}

/// Tunables for a single locator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorParams {
    /// Edge length of every window, in pixels.
    pub window_size: u32,
    /// Only rows `0, row_stride, 2 * row_stride, ...` are scanned.
    pub row_stride: u32,
    pub fit_mode: FitMode,
    /// Spacing of boundary samples in `FitMode::Sparse`.
    pub sample_stride: u32,
}

impl LocatorParams {
    pub fn new(window_size: u32, row_stride: u32) -> Self {
        Self {
            window_size,
            row_stride,
            fit_mode: FitMode::Sparse,
            sample_stride: DEFAULT_SAMPLE_STRIDE,
        }
    }

    pub fn with_fit_mode(mut self, fit_mode: FitMode) -> Self {
        self.fit_mode = fit_mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(PatchError::parameter("window_size", "must be positive"));
        }
        if self.row_stride == 0 {
            return Err(PatchError::parameter("row_stride", "must be positive"));
        }
        if self.sample_stride == 0 {
            return Err(PatchError::parameter("sample_stride", "must be positive"));
        }
        Ok(())
    }
}

pub mod window_locator {
    use super::*;

    /// Scans `mask` and returns the accepted windows in discovery order.
    ///
    /// A window larger than the mask, or a mask with no foreground, yields an
    /// empty list. Zero-valued parameters are rejected before scanning.
    pub fn locate(mask: &Mask, params: &LocatorParams) -> Result<Vec<Window>> {
        params.validate()?;

        let (width, height) = (mask.width(), mask.height());
        let size = params.window_size;
        if size > width || size > height {
            log::debug!(
                "window size {} exceeds {}x{} mask, nothing to place",
                size,
                width,
                height
            );
            return Ok(Vec::new());
        }

        let mut accepted: Vec<Window> = Vec::new();

        for row in (0..height).step_by(params.row_stride as usize) {
            let mut col = 0u32;
            // First column not yet claimed by a window accepted on this row.
            let mut floor = 0u32;

            while col < width {
                if !mask.is_foreground(col, row) {
                    col = col.saturating_add(size);
                    continue;
                }

                // --- Left-Edge Alignment ---
                let lower = floor.max(col.saturating_sub(size));
                let mut anchor = col;
                while anchor > lower && mask.is_foreground(anchor - 1, row) {
                    anchor -= 1;
                }

                // --- Fit Check ---
                if can_place(anchor, row, mask, &accepted, params) {
                    log::trace!("accepted window at ({}, {})", anchor, row);
                    accepted.push(Window::new(anchor, row, size));
                    col = anchor.saturating_add(size);
                    floor = col;
                } else {
                    col = col.saturating_add(size);
                }
            }
        }

        log::debug!(
            "located {} windows of size {} on {}x{} mask",
            accepted.len(),
            size,
            width,
            height
        );
        Ok(accepted)
    }

    /// Decides whether a `params.window_size` window anchored at `(x, y)` can
    /// join `accepted`. Invalid `params` never place anything.
    pub fn can_place(
        x: u32,
        y: u32,
        mask: &Mask,
        accepted: &[Window],
        params: &LocatorParams,
    ) -> bool {
        if let Err(e) = params.validate() {
            log::debug!("rejecting ({}, {}): {}", x, y, e);
            return false;
        }
        let candidate = Window::new(x, y, params.window_size);

        // 1. The window must not leave the mask.
        if !candidate.fits_within(mask.width(), mask.height()) {
            return false;
        }

        // 2. No overlap with anything placed so far.
        if accepted.iter().any(|w| w.intersects(&candidate)) {
            return false;
        }

        // 3. Foreground coverage.
        match params.fit_mode {
            FitMode::Sparse => edges_on_foreground(&candidate, mask, params.sample_stride),
            FitMode::Exhaustive => region_on_foreground(&candidate, mask),
        }
    }

    /// Samples the top, right and bottom edges. The left edge is where the
    /// candidate was detected, so it is not sampled again.
    fn edges_on_foreground(window: &Window, mask: &Mask, stride: u32) -> bool {
        let stride = stride as usize;
        let last_col = window.right() - 1;
        let last_row = window.bottom() - 1;

        let top = (window.x..window.right())
            .step_by(stride)
            .all(|cx| mask.is_foreground(cx, window.y));
        if !top {
            return false;
        }

        let right = (window.y..window.bottom())
            .step_by(stride)
            .all(|cy| mask.is_foreground(last_col, cy));
        if !right {
            return false;
        }

        // Walk the bottom edge back from the far corner.
        (window.x..window.right())
            .rev()
            .step_by(stride)
            .all(|cx| mask.is_foreground(cx, last_row))
    }

    fn region_on_foreground(window: &Window, mask: &Mask) -> bool {
        (window.y..window.bottom())
            .all(|cy| (window.x..window.right()).all(|cx| mask.is_foreground(cx, cy)))
    }
}
