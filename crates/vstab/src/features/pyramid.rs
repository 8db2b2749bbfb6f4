//! Gaussian image pyramid for coarse-to-fine tracking.

use image::{GrayImage, ImageBuffer};

use super::{gray_to_f32, GrayF32};

/// Smallest side length kept in a pyramid level.
const MIN_LEVEL_SIDE: u32 = 8;

/// Most levels a pyramid is built with, above full resolution.
pub const MAX_PYRAMID_LEVELS: usize = 16;

/// Pre-smoothing applied before each 2× decimation.
const DECIMATION_SIGMA: f32 = 1.0;

/// Level 0 is full resolution; level `k` is downsampled by `2^k`.
#[derive(Debug, Clone)]
pub struct Pyramid {
    pub levels: Vec<GrayF32>,
}

impl Pyramid {
    /// Build up to `max_level + 1` levels, stopping early once a level would
    /// drop below a few pixels on a side.
    pub fn build(gray: &GrayImage, max_level: usize) -> Self {
        let max_level = max_level.min(MAX_PYRAMID_LEVELS);
        let mut levels = Vec::with_capacity(max_level + 1);
        levels.push(gray_to_f32(gray));

        for _ in 0..max_level {
            let Some(prev) = levels.last() else {
                break;
            };
            let (w, h) = prev.dimensions();
            let (nw, nh) = (w.div_ceil(2), h.div_ceil(2));
            if nw < MIN_LEVEL_SIDE || nh < MIN_LEVEL_SIDE {
                break;
            }
            let next = downsample(prev, nw, nh);
            levels.push(next);
        }

        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

fn downsample(src: &GrayF32, nw: u32, nh: u32) -> GrayF32 {
    let blurred = imageproc::filter::gaussian_blur_f32(src, DECIMATION_SIGMA);
    let (w, h) = blurred.dimensions();
    ImageBuffer::from_fn(nw, nh, |x, y| {
        *blurred.get_pixel((2 * x).min(w - 1), (2 * y).min(h - 1))
    })
}
