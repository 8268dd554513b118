//! Gaussian blur for noise reduction before thresholding.
//!
//! Micrographs are smoothed with a small odd-sized kernel before Otsu
//! thresholding so that polishing scratches and sensor noise do not
//! fragment grains. The kernel size is converted to a standard deviation
//! with the usual `0.3 * ((k - 1) / 2 - 1) + 0.8` rule, so a 5×5 kernel
//! blurs with sigma 1.1.

use image::GrayImage;

/// Standard deviation matching an odd `kernel_size`.
///
/// Returns `None` for kernel sizes that disable blurring (0 and 1).
#[must_use]
pub fn sigma_for_kernel(kernel_size: u32) -> Option<f32> {
    if kernel_size <= 1 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let k = kernel_size as f32;
    Some(0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8))
}

/// Apply Gaussian blur sized by `kernel_size`.
///
/// Kernel sizes 0 and 1 return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &GrayImage, kernel_size: u32) -> GrayImage {
    match sigma_for_kernel(kernel_size) {
        Some(sigma) if sigma > 0.0 => imageproc::filter::gaussian_blur_f32(image, sigma),
        _ => image.clone(),
    }
}
