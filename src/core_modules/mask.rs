// THEORY:
// The `Mask` is the binary view of a frame that every later stage reads. It is a
// "dumb" data container: a fixed width, a fixed height and one foreground or
// background label per pixel, stored row-major.
//
// Key architectural principles:
// 1.  **Immutability**: Nothing in the crate writes into a `Mask` after it has been
//     built. Transforms such as inversion or morphology return a brand new `Mask`,
//     which keeps every stage side-effect free and lets independent frames be
//     processed on different threads without coordination.
// 2.  **Codec Independence**: A `Mask` can be built from a closure, a label vector
//     or an 8-bit luma buffer. It never touches files.
// 3.  **Cheap Queries**: `is_foreground` is a bounds-checked index into a flat
//     vector, which is what the window locator hammers on in its inner loops.

use crate::error::{PatchError, Result};
use image::{GrayImage, Luma};

/// A binary foreground/background grid of fixed dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    /// Row-major labels, `true` meaning foreground.
    labels: Vec<bool>,
}

impl Mask {
    /// Builds a mask from row-major labels. The vector must hold exactly
    /// `width * height` entries.
    pub fn new(width: u32, height: u32, labels: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(PatchError::dimensions(
                format!("{expected} labels for a {width}x{height} mask"),
                format!("{} labels", labels.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            labels,
        })
    }

    /// Builds a mask by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut labels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                labels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            labels,
        }
    }

    /// A mask where every pixel carries the same label.
    pub fn filled(width: u32, height: u32, foreground: bool) -> Self {
        Self {
            width,
            height,
            labels: vec![foreground; width as usize * height as usize],
        }
    }

    /// Interprets any non-zero luma value as foreground.
    pub fn from_luma(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            labels: image.pixels().map(|p| p.0[0] != 0).collect(),
        }
    }

    /// Renders the mask as a 0/255 luma buffer.
    pub fn to_luma(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.labels[self.index(x, y)] {
                Luma([u8::MAX])
            } else {
                Luma([0])
            }
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `false` for coordinates outside the mask.
    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.labels[self.index(x, y)]
    }

    pub fn foreground_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    pub fn is_all_background(&self) -> bool {
        !self.labels.iter().any(|&l| l)
    }

    /// Swaps foreground and background, leaving `self` untouched.
    pub fn inverted(&self) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            labels: self.labels.iter().map(|&l| !l).collect(),
        }
    }

    /// Row-major label slice.
    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_wrong_label_count() {
        let err = Mask::new(4, 4, vec![true; 15]).unwrap_err();
        assert!(matches!(err, PatchError::InvalidDimensions { .. }));
        assert!(Mask::new(4, 4, vec![true; 16]).is_ok());
    }

    #[test]
    fn from_fn_is_row_major() {
        let mask = Mask::from_fn(3, 2, |x, y| x == 2 && y == 1);
        assert_eq!(mask.labels(), &[false, false, false, false, false, true]);
        assert!(mask.is_foreground(2, 1));
        assert!(!mask.is_foreground(1, 2));
    }

    #[test]
    fn out_of_bounds_reads_as_background() {
        let mask = Mask::filled(5, 5, true);
        assert!(mask.is_foreground(4, 4));
        assert!(!mask.is_foreground(5, 0));
        assert!(!mask.is_foreground(0, 5));
    }

    #[test]
    fn inversion_returns_a_new_mask() {
        let mask = Mask::from_fn(10, 10, |x, _| x < 3);
        let inverted = mask.inverted();

        assert_eq!(mask.foreground_count(), 30);
        assert_eq!(inverted.foreground_count(), 70);
        assert!(mask.is_foreground(0, 0));
        assert!(!inverted.is_foreground(0, 0));
        assert_eq!(inverted.inverted(), mask);
    }

    #[test]
    fn luma_round_trip_uses_full_scale() {
        let mask = Mask::from_fn(6, 4, |x, y| (x + y) % 2 == 0);
        let luma = mask.to_luma();
        assert_eq!(luma.get_pixel(0, 0).0[0], 255);
        assert_eq!(luma.get_pixel(1, 0).0[0], 0);
        assert_eq!(Mask::from_luma(&luma), mask);
    }

    #[test]
    fn empty_mask_detection() {
        assert!(Mask::filled(8, 8, false).is_all_background());
        assert!(!Mask::from_fn(8, 8, |x, y| x == 7 && y == 7).is_all_background());
    }
}
