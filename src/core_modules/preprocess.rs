// THEORY:
// The `preprocess` module turns a color frame into the binary `Mask` the locator
// scans. The core only depends on the `MaskPreprocessor` trait: any
// implementation that returns a mask with the frame's dimensions can be plugged
// into the pipeline. The crate ships one implementation,
// `ChannelDifferencePreprocessor`, which isolates vegetation by how strongly one
// color channel dominates another.
//
// Key architectural principles:
// 1.  **Channel Difference Thresholding**: `minuend - subtrahend` per pixel,
//     saturating at zero, strictly above `level` is foreground. With the default
//     green-minus-red setup, green foliage lights up and soil, sky and shadow
//     stay dark.
// 2.  **Morphological Cleanup**: An opening (erode then dilate) removes speckles
//     smaller than the structuring element, and a closing (dilate then erode)
//     fills pinholes inside the foliage. The element is a square with its anchor
//     at the centre; neighbours outside the frame are ignored rather than
//     treated as foreground or background.
// 3.  **Separable Filtering**: A square min/max filter is a row pass followed by
//     a column pass, which keeps the cost linear in the element size.

use crate::core_modules::mask::Mask;
use crate::error::{PatchError, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};

pub const DEFAULT_THRESHOLD_LEVEL: u8 = 17;
pub const DEFAULT_STRUCTURING_ELEMENT: u32 = 15;

/// Anything that can turn a color frame into a cleaned binary mask.
pub trait MaskPreprocessor {
    /// Binarises the frame.
    fn threshold(&self, image: &RgbImage) -> Result<Mask>;

    /// Removes noise from a binary mask.
    fn cleanup(&self, mask: &Mask) -> Result<Mask>;

    /// Threshold followed by cleanup, checking that the frame size survived.
    fn preprocess(&self, image: &RgbImage) -> Result<Mask> {
        let raw = self.threshold(image)?;
        let cleaned = self.cleanup(&raw)?;
        ensure_frame_size(image, &cleaned)?;
        Ok(cleaned)
    }
}

/// Fails unless `mask` has exactly the dimensions of `image`.
pub(crate) fn ensure_frame_size(image: &RgbImage, mask: &Mask) -> Result<()> {
    if mask.width() != image.width() || mask.height() != image.height() {
        return Err(PatchError::dimensions(
            format!("{}x{} mask", image.width(), image.height()),
            format!("{}x{} mask", mask.width(), mask.height()),
        ));
    }
    Ok(())
}

/// A single color channel of an RGB frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

/// Settings for `ChannelDifferencePreprocessor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub minuend: Channel,
    pub subtrahend: Channel,
    /// Differences strictly greater than this are foreground.
    pub level: u8,
    /// Edge length of the square structuring element. Zero disables cleanup.
    pub structuring_element: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            minuend: Channel::Green,
            subtrahend: Channel::Red,
            level: DEFAULT_THRESHOLD_LEVEL,
            structuring_element: DEFAULT_STRUCTURING_ELEMENT,
        }
    }
}

/// Channel-difference threshold plus open/close cleanup.
#[derive(Debug, Clone, Default)]
pub struct ChannelDifferencePreprocessor {
    pub config: ThresholdConfig,
}

impl ChannelDifferencePreprocessor {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }
}

impl MaskPreprocessor for ChannelDifferencePreprocessor {
    fn threshold(&self, image: &RgbImage) -> Result<Mask> {
        let (a, b) = (self.config.minuend.index(), self.config.subtrahend.index());
        let level = self.config.level;
        let labels = image
            .pixels()
            .map(|p| p.0[a].saturating_sub(p.0[b]) > level)
            .collect();
        Mask::new(image.width(), image.height(), labels)
    }

    fn cleanup(&self, mask: &Mask) -> Result<Mask> {
        let size = self.config.structuring_element;
        if size == 0 {
            return Ok(mask.clone());
        }
        Ok(close(&open(mask, size), size))
    }
}

/// Which extreme a morphological pass keeps.
#[derive(Clone, Copy)]
enum Extreme {
    /// Erosion: foreground only where the whole neighbourhood is foreground.
    Min,
    /// Dilation: foreground where any neighbour is foreground.
    Max,
}

impl Extreme {
    fn reduce(self, mut values: impl Iterator<Item = bool>) -> bool {
        match self {
            Extreme::Min => values.all(|v| v),
            Extreme::Max => values.any(|v| v),
        }
    }
}

/// Erodes `mask` with a `size x size` square element.
pub fn erode(mask: &Mask, size: u32) -> Mask {
    rank_filter(mask, size, Extreme::Min)
}

/// Dilates `mask` with a `size x size` square element.
pub fn dilate(mask: &Mask, size: u32) -> Mask {
    rank_filter(mask, size, Extreme::Max)
}

/// Erosion followed by dilation.
pub fn open(mask: &Mask, size: u32) -> Mask {
    dilate(&erode(mask, size), size)
}

/// Dilation followed by erosion.
pub fn close(mask: &Mask, size: u32) -> Mask {
    erode(&dilate(mask, size), size)
}

fn rank_filter(mask: &Mask, size: u32, extreme: Extreme) -> Mask {
    let (width, height) = (mask.width(), mask.height());
    if size <= 1 || width == 0 || height == 0 {
        return mask.clone();
    }
    // Anchor at the centre: offsets run from -before to +after.
    let before = (size / 2) as i64;
    let after = (size - 1) as i64 - before;

    // --- Row pass ---
    let horizontal = Mask::from_fn(width, height, |x, y| {
        let lo = (x as i64 - before).max(0) as u32;
        let hi = (x as i64 + after).min(width as i64 - 1) as u32;
        extreme.reduce((lo..=hi).map(|cx| mask.is_foreground(cx, y)))
    });

    // --- Column pass ---
    Mask::from_fn(width, height, |x, y| {
        let lo = (y as i64 - before).max(0) as u32;
        let hi = (y as i64 + after).min(height as i64 - 1) as u32;
        extreme.reduce((lo..=hi).map(|cy| horizontal.is_foreground(x, cy)))
    })
}
