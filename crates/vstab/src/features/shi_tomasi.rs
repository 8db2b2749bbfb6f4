//! Minimum-eigenvalue corner detection ("good features to track").
//!
//! Sobel gradients feed a box-summed structure tensor; the response at each
//! pixel is the smaller tensor eigenvalue. Candidates must be 3×3 local
//! maxima above `quality_level × max_response`, and are accepted strongest
//! first while keeping `min_distance` pixels apart.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::filter::separable_filter_equal;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::GrayF32;

/// Largest accepted structure-tensor block side (pixels).
pub const MAX_BLOCK_SIZE: usize = 31;

/// Corner detection configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GoodFeaturesConfig {
    /// Upper bound on returned corners; `0` means unbounded.
    pub max_corners: usize,
    /// Fraction of the strongest response a corner must reach.
    pub quality_level: f32,
    /// Minimum Euclidean spacing between accepted corners (pixels).
    pub min_distance: f32,
    /// Side of the square neighborhood summed into the structure tensor.
    pub block_size: usize,
}

impl Default for GoodFeaturesConfig {
    fn default() -> Self {
        Self {
            max_corners: 400,
            quality_level: 0.1,
            min_distance: 30.0,
            block_size: 3,
        }
    }
}

/// A detected corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corner {
    pub x: f32,
    pub y: f32,
    /// Minimum-eigenvalue response.
    pub response: f32,
}

impl Corner {
    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }
}

/// Per-pixel minimum eigenvalue of the block-summed structure tensor.
pub fn min_eigen_response(gray: &GrayImage, block_size: usize) -> GrayF32 {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return ImageBuffer::new(w, h);
    }
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);

    // Sobel taps sum to 8 on each side.
    let dx = |x: u32, y: u32| gx.get_pixel(x, y)[0] as f32 / 8.0;
    let dy = |x: u32, y: u32| gy.get_pixel(x, y)[0] as f32 / 8.0;
    let ixx: GrayF32 = ImageBuffer::from_fn(w, h, |x, y| Luma([dx(x, y) * dx(x, y)]));
    let iyy: GrayF32 = ImageBuffer::from_fn(w, h, |x, y| Luma([dy(x, y) * dy(x, y)]));
    let ixy: GrayF32 = ImageBuffer::from_fn(w, h, |x, y| Luma([dx(x, y) * dy(x, y)]));

    // Unit taps over the block; the filter clamps at the borders.
    let taps = vec![1.0f32; 2 * (block_size.max(1) / 2) + 1];
    let sxx: GrayF32 = separable_filter_equal(&ixx, &taps);
    let syy: GrayF32 = separable_filter_equal(&iyy, &taps);
    let sxy: GrayF32 = separable_filter_equal(&ixy, &taps);

    ImageBuffer::from_fn(w, h, |x, y| {
        let a = sxx.get_pixel(x, y)[0];
        let c = syy.get_pixel(x, y)[0];
        let b = sxy.get_pixel(x, y)[0];
        let half_diff = 0.5 * (a - c);
        Luma([(0.5 * (a + c) - (half_diff * half_diff + b * b).sqrt()).max(0.0)])
    })
}

/// Detect corners ordered by decreasing response.
pub fn good_features_to_track(gray: &GrayImage, config: &GoodFeaturesConfig) -> Vec<Corner> {
    let (w, h) = gray.dimensions();
    let border = (config.block_size.max(1) / 2 + 1) as u32;
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let response = min_eigen_response(gray, config.block_size);
    let max_response = response.as_raw().iter().copied().fold(0.0f32, f32::max);
    if max_response <= 0.0 {
        return Vec::new();
    }
    let threshold = max_response * config.quality_level.max(0.0);

    let mut candidates = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let r = response.get_pixel(x, y)[0];
            if r <= 0.0 || r < threshold || !is_local_max(&response, x, y) {
                continue;
            }
            candidates.push(Corner {
                x: x as f32,
                y: y as f32,
                response: r,
            });
        }
    }
    // Stable sort keeps raster order among equal responses.
    candidates.sort_by(|a, b| b.response.total_cmp(&a.response));

    select_with_min_distance(candidates, config, w, h)
}

fn is_local_max(response: &GrayF32, x: u32, y: u32) -> bool {
    let center = response.get_pixel(x, y)[0];
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            if (nx, ny) != (x, y) && response.get_pixel(nx, ny)[0] > center {
                return false;
            }
        }
    }
    true
}

/// Greedy spacing filter backed by a coarse grid of accepted corners.
fn select_with_min_distance(
    candidates: Vec<Corner>,
    config: &GoodFeaturesConfig,
    w: u32,
    h: u32,
) -> Vec<Corner> {
    let limit = if config.max_corners == 0 {
        usize::MAX
    } else {
        config.max_corners
    };
    let min_dist = config.min_distance;
    if min_dist <= 0.0 {
        return candidates.into_iter().take(limit).collect();
    }

    let cell = min_dist.max(1.0);
    let gw = (w as f32 / cell).ceil() as usize + 1;
    let gh = (h as f32 / cell).ceil() as usize + 1;
    let mut grid: Vec<Vec<[f32; 2]>> = vec![Vec::new(); gw * gh];
    let min_dist2 = min_dist * min_dist;

    let mut accepted = Vec::new();
    for c in candidates {
        if accepted.len() >= limit {
            break;
        }
        let cx = (c.x / cell) as usize;
        let cy = (c.y / cell) as usize;
        let mut too_close = false;
        'search: for gy in cy.saturating_sub(1)..=(cy + 1).min(gh - 1) {
            for gx in cx.saturating_sub(1)..=(cx + 1).min(gw - 1) {
                for p in &grid[gy * gw + gx] {
                    let dx = p[0] - c.x;
                    let dy = p[1] - c.y;
                    if dx * dx + dy * dy < min_dist2 {
                        too_close = true;
                        break 'search;
                    }
                }
            }
        }
        if too_close {
            continue;
        }
        grid[cy * gw + cx].push([c.x, c.y]);
        accepted.push(c);
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::textured_scene;

    fn square_image() -> GrayImage {
        let mut img = GrayImage::from_pixel(64, 64, Luma([20]));
        for y in 20..44 {
            for x in 20..44 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        img
    }

    #[test]
    fn flat_image_has_no_corners() {
        let img = GrayImage::from_pixel(50, 40, Luma([128]));
        assert!(good_features_to_track(&img, &GoodFeaturesConfig::default()).is_empty());
    }

    #[test]
    fn square_yields_its_four_corners() {
        let config = GoodFeaturesConfig {
            min_distance: 10.0,
            ..Default::default()
        };
        let corners = good_features_to_track(&square_image(), &config);
        assert_eq!(corners.len(), 4, "{corners:?}");
        for target in [[20.0, 20.0], [43.0, 20.0], [20.0, 43.0], [43.0, 43.0]] {
            let near = corners.iter().any(|c| {
                (c.x - target[0]).abs() <= 2.0 && (c.y - target[1]).abs() <= 2.0
            });
            assert!(near, "no corner near {target:?}: {corners:?}");
        }
    }

    #[test]
    fn corners_respect_spacing_limit_and_order() {
        let img = textured_scene(160, 120, 0, 0);
        let config = GoodFeaturesConfig {
            max_corners: 12,
            min_distance: 15.0,
            ..Default::default()
        };
        let corners = good_features_to_track(&img, &config);
        assert!(!corners.is_empty());
        assert!(corners.len() <= 12);
        for pair in corners.windows(2) {
            assert!(pair[0].response >= pair[1].response);
        }
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                let d = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();
                assert!(d >= 15.0, "{a:?} and {b:?} are {d} px apart");
            }
        }
    }

    #[test]
    fn response_sums_gradients_over_the_block() {
        // A vertical step: only horizontal gradients, so the smaller
        // eigenvalue vanishes everywhere.
        let mut img = GrayImage::from_pixel(16, 16, Luma([10]));
        for y in 0..16 {
            for x in 8..16 {
                img.put_pixel(x, y, Luma([200]));
            }
        }
        let response = min_eigen_response(&img, 3);
        assert!(response.pixels().all(|p| p[0].abs() < 1e-3));

        let corners = min_eigen_response(&square_image(), 3);
        assert!(corners.get_pixel(20, 20)[0] > 100.0);
        assert_eq!(corners.get_pixel(5, 5)[0], 0.0);
    }
}
