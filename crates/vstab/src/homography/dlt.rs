//! Planar homography fitting: normalized DLT and an adaptive RANSAC loop.
//!
//! The DLT accumulates the 9×9 normal matrix directly from the two
//! constraint rows of every correspondence and takes its eigenvector of
//! smallest eigenvalue, in Hartley-normalized coordinates.

use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::transform::Transform;

type Normal9 = SMatrix<f64, 9, 9>;
type Row9 = SVector<f64, 9>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HomographyError {
    #[error("too few points: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("point sets differ in length: {src} source vs {dst} destination")]
    LengthMismatch { src: usize, dst: usize },
    #[error("numerical failure: {0}")]
    NumericalFailure(String),
    #[error("insufficient inliers: need {needed}, found {found}")]
    InsufficientInliers { needed: usize, found: usize },
}

/// Minimum number of correspondences that determine a homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Euclidean distance between `H · src` and `dst`.
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
    let [x, y] = Transform::from_matrix(*h).project(src[0], src[1]);
    (x - dst[0]).hypot(y - dst[1])
}

fn check_inputs(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<(), HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    if src.len() < MIN_CORRESPONDENCES {
        return Err(HomographyError::TooFewPoints {
            needed: MIN_CORRESPONDENCES,
            got: src.len(),
        });
    }
    Ok(())
}

/// Similarity moving the centroid to the origin with mean radius √2.
fn hartley_similarity(pts: &[[f64; 2]]) -> Matrix3<f64> {
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), p| (ax + p[0], ay + p[1]));
    let (cx, cy) = (sx / n, sy / n);
    let mean_radius = pts.iter().map(|p| (p[0] - cx).hypot(p[1] - cy)).sum::<f64>() / n;
    let s = if mean_radius > 1e-15 {
        std::f64::consts::SQRT_2 / mean_radius
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn apply(t: &Matrix3<f64>, p: &[f64; 2]) -> [f64; 2] {
    // Similarities keep w = 1.
    [
        t[(0, 0)] * p[0] + t[(0, 2)],
        t[(1, 1)] * p[1] + t[(1, 2)],
    ]
}

/// Least-squares homography with `dst ≈ H · src`, normalized so H(2,2) = 1.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    check_inputs(src, dst)?;

    let t_src = hartley_similarity(src);
    let t_dst = hartley_similarity(dst);

    let mut ata = Normal9::zeros();
    for (s, d) in src.iter().zip(dst) {
        let [x, y] = apply(&t_src, s);
        let [u, v] = apply(&t_dst, d);
        let rx = Row9::from_column_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
        let ry = Row9::from_column_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v]);
        ata += rx * rx.transpose() + ry * ry.transpose();
    }

    let eig = SymmetricEigen::new(ata);
    let (smallest, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| HomographyError::NumericalFailure("empty eigen decomposition".into()))?;
    let h = eig.eigenvectors.column(smallest);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("destination normalization is singular".into()))?;
    let h = t_dst_inv * h_norm * t_src;

    Transform::from_matrix(h)
        .normalized()
        .map(|t| *t.matrix())
        .map_err(|e| HomographyError::NumericalFailure(e.to_string()))
}

// ── RANSAC ───────────────────────────────────────────────────────────────

/// RANSAC configuration for homography fitting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RansacHomographyConfig {
    /// Upper bound on sampled hypotheses.
    pub max_iters: usize,
    /// Inlier threshold (reprojection error in pixels).
    pub inlier_threshold: f64,
    /// Minimum number of inliers for a valid model.
    pub min_inliers: usize,
    /// Probability of drawing at least one outlier-free sample; the
    /// iteration budget shrinks as the best inlier ratio grows.
    pub confidence: f64,
    /// Random seed.
    pub seed: u64,
}

impl Default for RansacHomographyConfig {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            inlier_threshold: 3.0,
            min_inliers: MIN_CORRESPONDENCES,
            confidence: 0.995,
            seed: 0,
        }
    }
}

/// Result of RANSAC homography fitting.
#[derive(Debug, Clone)]
pub struct RansacHomographyResult {
    /// The refitted homography, normalized.
    pub h: Matrix3<f64>,
    /// `true` for inliers.
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
    /// Reprojection error of every correspondence under `h`.
    pub errors: Vec<f64>,
}

/// Hypotheses needed to hit an all-inlier 4-sample with `confidence`.
fn required_iterations(inlier_ratio: f64, confidence: f64, cap: usize) -> usize {
    let p_good = inlier_ratio.powi(MIN_CORRESPONDENCES as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return 0;
    }
    if p_good <= f64::EPSILON {
        return cap;
    }
    let needed = (1.0 - confidence).max(f64::EPSILON).ln() / (1.0 - p_good).ln();
    if needed.is_finite() {
        (needed.ceil() as usize).min(cap)
    } else {
        cap
    }
}

/// Twice the signed area of triangle `abc`.
fn cross(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// A 4-sample with three (nearly) collinear points cannot fix a homography.
fn is_degenerate_sample(pts: &[[f64; 2]; 4]) -> bool {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES
        .iter()
        .any(|t| cross(&pts[t[0]], &pts[t[1]], &pts[t[2]]).abs() < 1e-6)
}

fn count_inliers(h: &Matrix3<f64>, src: &[[f64; 2]], dst: &[[f64; 2]], threshold: f64) -> usize {
    src.iter()
        .zip(dst)
        .filter(|(s, d)| reprojection_error(h, s, d) < threshold)
        .count()
}

/// Fit `src → dst` by scoring minimal-sample hypotheses, then refit the
/// best consensus set with the DLT.
pub fn fit_homography_ransac(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &RansacHomographyConfig,
) -> Result<RansacHomographyResult, HomographyError> {
    check_inputs(src, dst)?;
    let n = src.len();
    let threshold = config.inlier_threshold;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut best: Option<(usize, Matrix3<f64>)> = None;
    let mut budget = config.max_iters;
    let mut iter = 0;
    while iter < budget {
        iter += 1;
        let idx = rand::seq::index::sample(&mut rng, n, MIN_CORRESPONDENCES);
        let s4 = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
        let d4 = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
        if is_degenerate_sample(&s4) || is_degenerate_sample(&d4) {
            continue;
        }
        let Ok(h) = estimate_homography_dlt(&s4, &d4) else {
            continue;
        };

        let count = count_inliers(&h, src, dst, threshold);
        if best.as_ref().map_or(true, |(c, _)| count > *c) {
            best = Some((count, h));
            budget = required_iterations(count as f64 / n as f64, config.confidence, config.max_iters);
        }
    }

    let needed = config.min_inliers.max(MIN_CORRESPONDENCES);
    let found = best.as_ref().map_or(0, |(c, _)| *c);
    let Some((_, best_h)) = best.filter(|(c, _)| *c >= needed) else {
        return Err(HomographyError::InsufficientInliers { needed, found });
    };

    let (in_src, in_dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = src
        .iter()
        .zip(dst)
        .filter(|(s, d)| reprojection_error(&best_h, s, d) < threshold)
        .map(|(s, d)| (*s, *d))
        .unzip();
    let h = estimate_homography_dlt(&in_src, &in_dst).unwrap_or(best_h);

    let errors: Vec<f64> = src
        .iter()
        .zip(dst)
        .map(|(s, d)| reprojection_error(&h, s, d))
        .collect();
    let inlier_mask: Vec<bool> = errors.iter().map(|&e| e < threshold).collect();
    let n_inliers = inlier_mask.iter().filter(|&&m| m).count();
    tracing::trace!(iterations = iter, n_inliers, n, "ransac homography");

    Ok(RansacHomographyResult {
        h,
        inlier_mask,
        n_inliers,
        errors,
    })
}
