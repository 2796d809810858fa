//! The classical lane-detection pipeline, one module per stage, run in a
//! fixed order by [`crate::classical::ClassicalDetector`].

pub mod classify;
pub mod fit;
pub mod hough;
pub mod roi;
pub mod smoothing;

use image::{GrayImage, RgbImage};

/// Gaussian blur kernel size used ahead of edge detection (step 2). The
/// sigma follows OpenCV's `getGaussianKernel` auto-sigma formula so a
/// caller only has to reason about kernel size, not sigma directly.
const BLUR_KERNEL_SIZE: f32 = 5.0;

/// Step 1: RGB -> grayscale.
pub fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    image::DynamicImage::ImageRgb8(rgb.clone()).to_luma8()
}

/// Step 2: Gaussian blur with an auto-derived sigma for a 5x5 kernel.
pub fn blur(gray: &GrayImage) -> GrayImage {
    let sigma = 0.3 * ((BLUR_KERNEL_SIZE - 1.0) * 0.5 - 1.0) + 0.8;
    image::imageops::blur(gray, sigma)
}

/// Step 3: Canny edge detection.
pub fn canny_edges(blurred: &GrayImage, low: f64, high: f64) -> GrayImage {
    imageproc::edges::canny(blurred, low as f32, high as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_collapses_a_uniform_color_to_one_luma_value() {
        let rgb = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let gray = to_grayscale(&rgb);
        let first = gray.get_pixel(0, 0).0[0];
        assert!(gray.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn blur_preserves_image_dimensions() {
        let gray = GrayImage::from_pixel(16, 16, image::Luma([128]));
        let blurred = blur(&gray);
        assert_eq!(blurred.dimensions(), (16, 16));
    }
}
