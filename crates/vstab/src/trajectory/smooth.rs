//! Gaussian low-pass filtering of a trajectory along the time axis.
//!
//! Each of the nine matrix components is filtered independently as a 1-D
//! series. The kernel anchor sits at `window / 2`, so
//! `out[t] = Σ_k K[k] · in[t + k − anchor]`, and samples outside the series
//! are supplied by the configured [`BoundaryMode`].

use super::{Trajectory, TrajectoryEntry};
use crate::transform::Transform;

/// How taps that fall outside the series are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Mirror without repeating the edge sample: `… c b | a b c … | b a …`.
    #[default]
    Reflect101,
    /// Repeat the edge sample.
    Replicate,
    /// Drop out-of-range taps and renormalize by the remaining weights.
    Shrink,
}

/// Longest accepted smoothing window, in frames.
pub const MAX_SMOOTHING_WINDOW: usize = 10_000;

/// Trajectory smoothing configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Kernel length in frames.
    pub window: usize,
    /// Gaussian sigma in frames; derived from `window` when absent or ≤ 0.
    pub sigma: Option<f64>,
    pub boundary: BoundaryMode,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 30,
            sigma: None,
            boundary: BoundaryMode::Reflect101,
        }
    }
}

/// Normalized Gaussian kernel of length `window`.
///
/// Without a positive `sigma` it is derived as
/// `0.3 × ((window − 1) × 0.5 − 1) + 0.8`. An empty window yields an empty
/// kernel.
pub fn gaussian_kernel(window: usize, sigma: Option<f64>) -> Vec<f64> {
    if window == 0 {
        return Vec::new();
    }
    let sigma = match sigma {
        Some(s) if s > 0.0 => s,
        _ => 0.3 * ((window as f64 - 1.0) * 0.5 - 1.0) + 0.8,
    };
    let center = (window as f64 - 1.0) * 0.5;
    let scale = -0.5 / (sigma * sigma);
    let mut kernel: Vec<f64> = (0..window)
        .map(|i| {
            let x = i as f64 - center;
            (scale * x * x).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Filter every component of `trajectory` with a Gaussian kernel.
///
/// The result has the same length and frame indices as the input.
pub fn smooth_trajectory(trajectory: &Trajectory, config: &SmoothingConfig) -> Trajectory {
    let kernel = gaussian_kernel(config.window, config.sigma);
    if kernel.is_empty() || trajectory.is_empty() {
        return trajectory.clone();
    }

    let mut columns: [Vec<f64>; 9] = Default::default();
    for entry in trajectory {
        for (column, c) in columns.iter_mut().zip(entry.transform.components()) {
            column.push(c);
        }
    }
    let series: Vec<Vec<f64>> = columns
        .iter()
        .map(|column| convolve(column, &kernel, config.boundary))
        .collect();

    let entries = trajectory
        .iter()
        .enumerate()
        .map(|(t, e)| {
            let mut c = [0.0; 9];
            for (k, s) in series.iter().enumerate() {
                c[k] = s[t];
            }
            TrajectoryEntry {
                frame_index: e.frame_index,
                transform: Transform::from_components(c),
            }
        })
        .collect();
    Trajectory::from_entries(entries)
}

fn convolve(input: &[f64], kernel: &[f64], boundary: BoundaryMode) -> Vec<f64> {
    let n = input.len() as isize;
    let anchor = (kernel.len() / 2) as isize;
    (0..n)
        .map(|t| {
            let mut acc = 0.0;
            let mut weight = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let i = t + k as isize - anchor;
                let idx = match boundary {
                    BoundaryMode::Reflect101 => Some(reflect101(i, n)),
                    BoundaryMode::Replicate => Some(i.clamp(0, n - 1) as usize),
                    BoundaryMode::Shrink => (0..n).contains(&i).then_some(i as usize),
                };
                if let Some(idx) = idx {
                    acc += w * input[idx];
                    weight += w;
                }
            }
            match boundary {
                BoundaryMode::Shrink if weight > 0.0 => acc / weight,
                _ => acc,
            }
        })
        .collect()
}

fn reflect101(i: isize, n: isize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let j = i.rem_euclid(period);
    (if j >= n { period - j } else { j }) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::accumulate;
    use approx::assert_relative_eq;

    const MODES: [BoundaryMode; 3] = [
        BoundaryMode::Reflect101,
        BoundaryMode::Replicate,
        BoundaryMode::Shrink,
    ];

    #[test]
    fn kernel_is_normalized_with_derived_sigma() {
        let k = gaussian_kernel(30, None);
        assert_eq!(k.len(), 30);
        assert_relative_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        // Symmetric about (n - 1) / 2.
        for i in 0..15 {
            assert_relative_eq!(k[i], k[29 - i], epsilon = 1e-15);
        }
        // sigma = 4.85 for a 30-tap window.
        let ratio = k[14] / k[0];
        let expected = (0.5 * (14.5f64.powi(2) - 0.25) / 4.85f64.powi(2)).exp();
        assert_relative_eq!(ratio, expected, max_relative = 1e-9);
    }

    #[test]
    fn kernel_edge_cases() {
        assert!(gaussian_kernel(0, None).is_empty());
        assert_eq!(gaussian_kernel(1, None), vec![1.0]);
        let k = gaussian_kernel(5, Some(-1.0));
        assert_relative_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn reflect101_mirrors_without_edge_repeat() {
        let idx: Vec<usize> = (-3..8).map(|i| reflect101(i, 5)).collect();
        assert_eq!(idx, vec![3, 2, 1, 0, 1, 2, 3, 4, 3, 2, 1]);
        assert_eq!(reflect101(-7, 1), 0);
    }

    #[test]
    fn constant_series_is_preserved_in_every_mode() {
        let input = vec![3.25; 12];
        let kernel = gaussian_kernel(30, None);
        for mode in MODES {
            for v in convolve(&input, &kernel, mode) {
                assert_relative_eq!(v, 3.25, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn constant_trajectory_is_unchanged() {
        let h = Transform::from_rows([[1.01, 0.02, 4.0], [-0.01, 0.99, -2.0], [1e-4, 0.0, 1.0]]);
        let traj = Trajectory::from_entries(
            (1..=8)
                .map(|i| TrajectoryEntry {
                    frame_index: i,
                    transform: h,
                })
                .collect(),
        );
        for boundary in MODES {
            let config = SmoothingConfig {
                boundary,
                ..Default::default()
            };
            let smoothed = smooth_trajectory(&traj, &config);
            assert_eq!(smoothed.len(), traj.len());
            for (a, b) in traj.iter().zip(&smoothed) {
                assert_eq!(a.frame_index, b.frame_index);
                assert!(a.transform.max_abs_diff(&b.transform) < 1e-12);
            }
        }
    }

    #[test]
    fn anchor_reaches_further_back_for_even_windows() {
        // 4-tap kernel anchored at 2: out[t] = Σ K[k] in[t + k - 2], so an
        // impulse at 5 reaches outputs 4 ..= 7.
        let mut input = vec![0.0; 10];
        input[5] = 1.0;
        let kernel = gaussian_kernel(4, None);
        let out = convolve(&input, &kernel, BoundaryMode::Shrink);
        for (t, &v) in out.iter().enumerate() {
            if (4..=7).contains(&t) {
                assert!(v > 0.0, "t = {t}");
            } else {
                assert_eq!(v, 0.0, "t = {t}");
            }
        }
        assert_relative_eq!(out[4], kernel[3], epsilon = 1e-12);
        assert_relative_eq!(out[7], kernel[0], epsilon = 1e-12);
    }

    #[test]
    fn constant_pan_is_tracked_by_smoothed_path() {
        let traj = accumulate((1..=40).map(|i| (i, Transform::translation(1.5, 0.0)))).unwrap();
        let config = SmoothingConfig {
            boundary: BoundaryMode::Replicate,
            ..Default::default()
        };
        let smoothed = smooth_trajectory(&traj, &config);
        let xs = smoothed.component_series(2).unwrap();
        // Away from the ends the filtered ramp reproduces the ramp.
        for t in 15..25 {
            let actual = traj.entries()[t].transform.translation_part()[0];
            // Even window: the anchor lags the kernel centre by half a frame.
            assert!((xs[t] - actual).abs() < 1.0, "t = {t}: {} vs {actual}", xs[t]);
        }
        for pair in xs.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-9);
        }
    }
}
