// THEORY:
// The `histogram` module is the descriptor layer. Given one grayscale patch, it
// summarises the local texture as a histogram of gradient directions weighted by
// gradient strength, then rotates the histogram so its strongest direction sits
// at index 0. Two patches of the same texture photographed at different angles
// therefore produce similar descriptors.
//
// Algorithm steps:
// 1.  **Gradients**: 3x3 Sobel derivatives `dx` and `dy` with reflect-101 borders
//     (the border pixel is mirrored without being repeated).
// 2.  **Polar Form**: `orientation = atan2(dy, dx)` in degrees shifted by +180
//     into `[0, 360]`, and `magnitude = hypot(dx, dy)`.
// 3.  **Binning**: Each pixel adds its magnitude to bin `floor(orientation / bin)`.
//     An orientation of exactly 360 wraps into bin 0.
// 4.  **Normalisation**: Every bin is divided by the total magnitude, so the
//     intensities of a textured patch sum to 1.
// 5.  **Rotation**: The bins are circularly shifted so the first largest bin
//     lands at index 0. Orientation labels are NOT shifted; label `i` is always
//     `i * bin_size`.
//
// A flat patch has zero total magnitude. That is ordinary data, not an error,
// and it yields an all-zero intensity vector instead of NaN.

use crate::error::{PatchError, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Default angular width of a histogram bin, in degrees.
pub const DEFAULT_BIN_SIZE: u32 = 30;

/// A rotation-normalised gradient orientation histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientationHistogram {
    /// Bin labels in degrees: `orientation[i] == i * bin_size`.
    pub orientation: Vec<f64>,
    /// Normalised magnitude per bin, peak first.
    pub intensity: Vec<f64>,
    /// Index of the peak bin before the circular shift.
    pub peak_bin: usize,
    /// Sum of all gradient magnitudes in the patch.
    pub total_magnitude: f64,
}

impl OrientationHistogram {
    pub fn bin_count(&self) -> usize {
        self.intensity.len()
    }

    /// `true` when the patch had no gradient at all.
    pub fn is_flat(&self) -> bool {
        self.total_magnitude == 0.0
    }
}

/// Checks that `bin_size` is a positive divisor of 360.
pub fn validate_bin_size(bin_size: u32) -> Result<()> {
    if bin_size == 0 || 360 % bin_size != 0 {
        return Err(PatchError::parameter(
            "bin_size",
            format!("must be a positive divisor of 360, got {bin_size}"),
        ));
    }
    Ok(())
}

/// Computes the orientation histogram of `patch`.
pub fn compute_orientation_histogram(
    patch: &GrayImage,
    bin_size: u32,
) -> Result<OrientationHistogram> {
    validate_bin_size(bin_size)?;
    if patch.width() == 0 || patch.height() == 0 {
        return Err(PatchError::DegenerateInput(format!(
            "{}x{} patch has no pixels",
            patch.width(),
            patch.height()
        )));
    }

    let bin_count = (360 / bin_size) as usize;
    let bin_width = bin_size as f64;
    let mut accumulated = vec![0.0f64; bin_count];
    let mut total_magnitude = 0.0f64;

    let (dx, dy) = sobel_gradients(patch);
    for (&gx, &gy) in dx.iter().zip(dy.iter()) {
        let orientation = gy.atan2(gx).to_degrees() + 180.0;
        let magnitude = (gx * gx + gy * gy).sqrt();

        let bin = (orientation / bin_width).floor() as usize % bin_count;
        accumulated[bin] += magnitude;
        total_magnitude += magnitude;
    }

    let peak_bin = first_max_index(&accumulated);
    let orientation = (0..bin_count).map(|i| (i as u32 * bin_size) as f64).collect();
    let intensity = if total_magnitude > 0.0 {
        (0..bin_count)
            .map(|i| accumulated[(peak_bin + i) % bin_count] / total_magnitude)
            .collect()
    } else {
        log::trace!(
            "flat {}x{} patch, returning zero histogram",
            patch.width(),
            patch.height()
        );
        vec![0.0; bin_count]
    };

    Ok(OrientationHistogram {
        orientation,
        intensity,
        peak_bin,
        total_magnitude,
    })
}

fn first_max_index(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Reflect-101 border: index -1 maps to 1, index `len` maps to `len - 2`.
fn reflect_101(index: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let mut i = index;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * (len - 1) - i;
    }
    i as u32
}

/// Row-major 3x3 Sobel derivatives of `image`.
fn sobel_gradients(image: &GrayImage) -> (Vec<f64>, Vec<f64>) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let at = |x: i64, y: i64| -> f64 {
        image
            .get_pixel(reflect_101(x, width), reflect_101(y, height))
            .0[0] as f64
    };

    let len = (width * height) as usize;
    let mut dx = Vec::with_capacity(len);
    let mut dy = Vec::with_capacity(len);
    for y in 0..height {
        for x in 0..width {
            let (tl, tc, tr) = (at(x - 1, y - 1), at(x, y - 1), at(x + 1, y - 1));
            let (ml, mr) = (at(x - 1, y), at(x + 1, y));
            let (bl, bc, br) = (at(x - 1, y + 1), at(x, y + 1), at(x + 1, y + 1));

            dx.push((tr + 2.0 * mr + br) - (tl + 2.0 * ml + bl));
            dy.push((bl + 2.0 * bc + br) - (tl + 2.0 * tc + tr));
        }
    }
    (dx, dy)
}
