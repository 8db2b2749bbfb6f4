//! Pyramidal Lucas–Kanade point tracking.
//!
//! Each point is tracked coarse to fine. At every level the template patch
//! and its gradients are sampled once around the point in the previous
//! frame, so the 2×2 normal matrix is fixed and only the residual is
//! re-sampled from the next frame per iteration.

use image::GrayImage;

use super::{sample_bilinear, GrayF32, Pyramid};

/// Largest accepted search-window radius (pixels).
pub const MAX_WINDOW_RADIUS: usize = 128;

/// Tracker configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KltConfig {
    /// Half-size of the square search window; the window is `2r + 1` wide.
    pub window_radius: usize,
    /// Number of pyramid levels above full resolution.
    pub max_levels: usize,
    /// Iteration cap per pyramid level.
    pub max_iterations: usize,
    /// Stop iterating once the update is shorter than this (pixels).
    pub epsilon: f32,
    /// Points whose normalized minimum eigenvalue falls below this are lost.
    pub min_eigen_threshold: f32,
}

impl Default for KltConfig {
    fn default() -> Self {
        Self {
            window_radius: 10,
            max_levels: 3,
            max_iterations: 30,
            epsilon: 0.01,
            min_eigen_threshold: 1e-4,
        }
    }
}

/// Per-point tracking outcome, index-aligned with the input points.
#[derive(Debug, Clone, Default)]
pub struct TrackResult {
    /// Tracked positions; meaningful only where `status` is `true`.
    pub points: Vec<[f32; 2]>,
    pub status: Vec<bool>,
    /// Mean absolute intensity difference over the final window.
    pub error: Vec<f32>,
}

impl TrackResult {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_tracked(&self) -> usize {
        self.status.iter().filter(|&&s| s).count()
    }
}

/// Pyramidal Lucas–Kanade tracker.
#[derive(Debug, Clone, Default)]
pub struct PyramidalLkTracker {
    pub config: KltConfig,
}

impl PyramidalLkTracker {
    pub fn new(config: KltConfig) -> Self {
        Self { config }
    }

    /// Track `points` from `prev` into `next`.
    pub fn track(&self, prev: &GrayImage, next: &GrayImage, points: &[[f32; 2]]) -> TrackResult {
        let prev_pyr = Pyramid::build(prev, self.config.max_levels);
        let next_pyr = Pyramid::build(next, self.config.max_levels);
        self.track_pyramids(&prev_pyr, &next_pyr, points)
    }

    /// Track `points` between two prebuilt pyramids.
    pub fn track_pyramids(
        &self,
        prev: &Pyramid,
        next: &Pyramid,
        points: &[[f32; 2]],
    ) -> TrackResult {
        let num_levels = (self.config.max_levels + 1)
            .min(prev.num_levels())
            .min(next.num_levels());

        let mut out = TrackResult {
            points: Vec::with_capacity(points.len()),
            status: Vec::with_capacity(points.len()),
            error: Vec::with_capacity(points.len()),
        };
        for &p in points {
            let (pos, ok, err) = match self.track_point(prev, next, p, num_levels) {
                Some((pos, err)) => (pos, true, err),
                None => (p, false, f32::INFINITY),
            };
            out.points.push(pos);
            out.status.push(ok);
            out.error.push(err);
        }
        out
    }

    fn track_point(
        &self,
        prev: &Pyramid,
        next: &Pyramid,
        point: [f32; 2],
        num_levels: usize,
    ) -> Option<([f32; 2], f32)> {
        if num_levels == 0 || !point[0].is_finite() || !point[1].is_finite() {
            return None;
        }
        let base = &prev.levels[0];
        if !in_bounds(base, point[0], point[1]) {
            return None;
        }

        // Displacement estimate at the current level's scale.
        let mut d = [0.0f32; 2];
        for level in (0..num_levels).rev() {
            let scale = 1.0 / (1u32 << level) as f32;
            let px = point[0] * scale;
            let py = point[1] * scale;
            match self.refine_level(&prev.levels[level], &next.levels[level], px, py, d) {
                Some(refined) => d = refined,
                None if level == 0 => return None,
                // Coarse levels may be too small or flat; keep the current guess.
                None => {}
            }
            if level > 0 {
                d = [d[0] * 2.0, d[1] * 2.0];
            }
        }

        let nx = point[0] + d[0];
        let ny = point[1] + d[1];
        if !in_bounds(&next.levels[0], nx, ny) {
            return None;
        }
        let err = self.window_error(base, &next.levels[0], point[0], point[1], nx, ny);
        Some(([nx, ny], err))
    }

    /// Iterative LK at one level starting from displacement `d`.
    fn refine_level(
        &self,
        prev: &GrayF32,
        next: &GrayF32,
        px: f32,
        py: f32,
        mut d: [f32; 2],
    ) -> Option<[f32; 2]> {
        let r = self.config.window_radius as i32;
        let side = (2 * r + 1) as usize;
        let area = (side * side) as f32;

        let mut template = Vec::with_capacity(side * side);
        let mut grad = Vec::with_capacity(side * side);
        let (mut a11, mut a12, mut a22) = (0.0f32, 0.0f32, 0.0f32);
        for wy in -r..=r {
            for wx in -r..=r {
                let x = px + wx as f32;
                let y = py + wy as f32;
                let ix = 0.5 * (sample_bilinear(prev, x + 1.0, y) - sample_bilinear(prev, x - 1.0, y));
                let iy = 0.5 * (sample_bilinear(prev, x, y + 1.0) - sample_bilinear(prev, x, y - 1.0));
                template.push(sample_bilinear(prev, x, y));
                grad.push([ix, iy]);
                a11 += ix * ix;
                a12 += ix * iy;
                a22 += iy * iy;
            }
        }

        // Eigenvalue in unit-intensity terms, averaged over the window.
        let min_eig = (a11 + a22 - ((a11 - a22) * (a11 - a22) + 4.0 * a12 * a12).sqrt())
            / (2.0 * area * 255.0 * 255.0);
        let det = a11 * a22 - a12 * a12;
        if min_eig < self.config.min_eigen_threshold || det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let eps2 = self.config.epsilon * self.config.epsilon;
        let mut prev_delta = [0.0f32; 2];
        for iter in 0..self.config.max_iterations {
            let cx = px + d[0];
            let cy = py + d[1];
            if !in_bounds(next, cx, cy) {
                return None;
            }
            let (mut b1, mut b2) = (0.0f32, 0.0f32);
            let mut k = 0;
            for wy in -r..=r {
                for wx in -r..=r {
                    let j = sample_bilinear(next, cx + wx as f32, cy + wy as f32);
                    let e = template[k] - j;
                    b1 += e * grad[k][0];
                    b2 += e * grad[k][1];
                    k += 1;
                }
            }
            let delta = [
                inv_det * (a22 * b1 - a12 * b2),
                inv_det * (a11 * b2 - a12 * b1),
            ];
            if !delta[0].is_finite() || !delta[1].is_finite() {
                return None;
            }
            d = [d[0] + delta[0], d[1] + delta[1]];

            if delta[0] * delta[0] + delta[1] * delta[1] <= eps2 {
                break;
            }
            // Oscillating between two positions: settle halfway.
            if iter > 0
                && (delta[0] + prev_delta[0]).abs() < 0.01
                && (delta[1] + prev_delta[1]).abs() < 0.01
            {
                d = [d[0] - 0.5 * delta[0], d[1] - 0.5 * delta[1]];
                break;
            }
            prev_delta = delta;
        }
        Some(d)
    }

    fn window_error(&self, prev: &GrayF32, next: &GrayF32, px: f32, py: f32, nx: f32, ny: f32) -> f32 {
        let r = self.config.window_radius as i32;
        let mut sum = 0.0f32;
        let mut n = 0usize;
        for wy in -r..=r {
            for wx in -r..=r {
                let i = sample_bilinear(prev, px + wx as f32, py + wy as f32);
                let j = sample_bilinear(next, nx + wx as f32, ny + wy as f32);
                sum += (i - j).abs();
                n += 1;
            }
        }
        sum / n.max(1) as f32
    }
}

fn in_bounds(img: &GrayF32, x: f32, y: f32) -> bool {
    let (w, h) = img.dimensions();
    x >= 0.0 && y >= 0.0 && x <= (w as f32 - 1.0) && y <= (h as f32 - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{good_features_to_track, GoodFeaturesConfig};
    use crate::test_utils::textured_scene;

    fn corners(img: &GrayImage) -> Vec<[f32; 2]> {
        let config = GoodFeaturesConfig {
            min_distance: 12.0,
            ..Default::default()
        };
        good_features_to_track(img, &config)
            .iter()
            .map(|c| c.position())
            // Keep away from the border so the shifted point stays visible.
            .filter(|p| p[0] > 20.0 && p[0] < 140.0 && p[1] > 20.0 && p[1] < 100.0)
            .collect()
    }

    #[test]
    fn identical_frames_track_in_place() {
        let img = textured_scene(160, 120, 0, 0);
        let pts = corners(&img);
        assert!(pts.len() >= 4);
        let result = PyramidalLkTracker::default().track(&img, &img, &pts);
        assert_eq!(result.len(), pts.len());
        assert_eq!(result.num_tracked(), pts.len());
        for (p, q) in pts.iter().zip(&result.points) {
            assert!((p[0] - q[0]).abs() < 1e-3 && (p[1] - q[1]).abs() < 1e-3);
        }
        assert!(result.error.iter().all(|&e| e < 1e-3));
    }

    #[test]
    fn recovers_integer_shift() {
        let prev = textured_scene(160, 120, 0, 0);
        let next = textured_scene(160, 120, 5, -3);
        let pts = corners(&prev);
        assert!(pts.len() >= 4);
        let result = PyramidalLkTracker::default().track(&prev, &next, &pts);

        let mut good = 0;
        for ((p, q), &ok) in pts.iter().zip(&result.points).zip(&result.status) {
            if ok && (q[0] - p[0] - 5.0).abs() < 0.5 && (q[1] - p[1] + 3.0).abs() < 0.5 {
                good += 1;
            }
        }
        assert!(
            good * 4 >= pts.len() * 3,
            "only {good} of {} points tracked the shift",
            pts.len()
        );
    }

    #[test]
    fn flat_region_is_lost() {
        let flat = GrayImage::from_pixel(80, 80, image::Luma([100]));
        let result = PyramidalLkTracker::default().track(&flat, &flat, &[[40.0, 40.0]]);
        assert_eq!(result.status, vec![false]);
    }

    #[test]
    fn out_of_image_point_is_lost() {
        let img = textured_scene(64, 64, 0, 0);
        let result = PyramidalLkTracker::default().track(&img, &img, &[[-5.0, 10.0]]);
        assert_eq!(result.status, vec![false]);
    }
}
