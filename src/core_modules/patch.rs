// THEORY:
// A located `Window` is only coordinates. The `patch` module cuts the matching
// pixels out of a frame so they can be described or handed to a classifier.
// It works with any `image` buffer (luma for the histogram engine, RGB for
// callers that want the color sample) and always returns an owned copy; the
// frame is only borrowed for the duration of the call.

use crate::core_modules::window::Window;
use crate::error::{PatchError, Result};
use image::{GenericImageView, ImageBuffer, Pixel};

/// Copies the pixels under `window` out of `image`.
pub fn extract_patch<I, P>(image: &I, window: &Window) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel + 'static,
{
    if window.size == 0 {
        return Err(PatchError::parameter("window.size", "must be positive"));
    }
    let (width, height) = image.dimensions();
    if !window.fits_within(width, height) {
        return Err(PatchError::dimensions(
            format!("window inside {width}x{height} image"),
            format!(
                "{0}x{0} window at ({1}, {2})",
                window.size, window.x, window.y
            ),
        ));
    }
    Ok(ImageBuffer::from_fn(window.size, window.size, |px, py| {
        image.get_pixel(window.x + px, window.y + py)
    }))
}

/// Cuts one patch per window, in window order.
pub fn extract_patches<I, P>(
    image: &I,
    windows: &[Window],
) -> Result<Vec<ImageBuffer<P, Vec<P::Subpixel>>>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel + 'static,
{
    windows.iter().map(|w| extract_patch(image, w)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn patch_copies_the_window_region() {
        let image = GrayImage::from_fn(20, 20, |x, y| Luma([(y * 20 + x) as u8]));
        let patch = extract_patch(&image, &Window::new(5, 7, 4)).unwrap();

        assert_eq!(patch.dimensions(), (4, 4));
        assert_eq!(patch.get_pixel(0, 0).0[0], (7 * 20 + 5) as u8);
        assert_eq!(patch.get_pixel(3, 3).0[0], (10 * 20 + 8) as u8);
    }

    #[test]
    fn color_patches_keep_their_channels() {
        let image = RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8, y as u8, 9]));
        let patch = extract_patch(&image, &Window::new(4, 4, 4)).unwrap();
        assert_eq!(patch.get_pixel(1, 2), &Rgb([5, 6, 9]));
    }

    #[test]
    fn window_leaving_the_image_is_rejected() {
        let image = GrayImage::new(10, 10);
        let err = extract_patch(&image, &Window::new(5, 5, 6)).unwrap_err();
        assert!(matches!(err, PatchError::InvalidDimensions { .. }));
        assert!(extract_patch(&image, &Window::new(5, 5, 5)).is_ok());
    }

    #[test]
    fn far_anchors_are_rejected_without_wrapping() {
        let image = GrayImage::new(10, 10);
        for window in [Window::new(u32::MAX, 0, 5), Window::new(0, u32::MAX - 2, 5)] {
            let err = extract_patch(&image, &window).unwrap_err();
            assert!(matches!(err, PatchError::InvalidDimensions { .. }));
        }
    }

    #[test]
    fn extract_patches_fails_as_a_whole() {
        let image = GrayImage::new(10, 10);
        let windows = [Window::new(0, 0, 5), Window::new(8, 8, 5)];
        assert!(extract_patches(&image, &windows).is_err());
        assert_eq!(extract_patches(&image, &windows[..1]).unwrap().len(), 1);
    }
}
