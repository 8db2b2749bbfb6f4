//! Sparse feature detection and tracking on grayscale frames.
//!
//! - [`good_features_to_track`]: minimum-eigenvalue (Shi–Tomasi) corners with
//!   a quality threshold and a minimum spacing.
//! - [`PyramidalLkTracker`]: coarse-to-fine Lucas–Kanade point tracking.

mod klt;
mod pyramid;
mod shi_tomasi;

pub use klt::{KltConfig, PyramidalLkTracker, TrackResult, MAX_WINDOW_RADIUS};
pub use pyramid::{Pyramid, MAX_PYRAMID_LEVELS};
pub use shi_tomasi::{
    good_features_to_track, min_eigen_response, Corner, GoodFeaturesConfig, MAX_BLOCK_SIZE,
};

use image::{GrayImage, ImageBuffer, Luma};

/// Single-channel `f32` image, intensities in the 0–255 range.
pub type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Widen an 8-bit grayscale image to `f32`.
pub fn gray_to_f32(gray: &GrayImage) -> GrayF32 {
    let (w, h) = gray.dimensions();
    let data = gray.as_raw().iter().map(|&v| v as f32).collect();
    // Buffer length is w * h by construction.
    ImageBuffer::from_raw(w, h, data).unwrap_or_else(|| ImageBuffer::new(w, h))
}

/// Bilinear sample with clamp-to-edge addressing.
#[inline]
pub(crate) fn sample_bilinear(img: &GrayF32, x: f32, y: f32) -> f32 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let stride = w as usize;
    let raw = img.as_raw();
    let p00 = raw[y0 as usize * stride + x0 as usize];
    let p10 = raw[y0 as usize * stride + x1 as usize];
    let p01 = raw[y1 as usize * stride + x0 as usize];
    let p11 = raw[y1 as usize * stride + x1 as usize];

    let top = p00 + fx * (p10 - p00);
    let bottom = p01 + fx * (p11 - p01);
    top + fy * (bottom - top)
}
