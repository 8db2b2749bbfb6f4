//! Inter-frame motion estimation.
//!
//! Motion between two grayscale frames is found in four steps: detect
//! corners in the previous frame, track them into the next frame, drop the
//! points that failed to track, then fit a homography previous → next.
//! Each capability sits behind a trait so it can be swapped.

mod estimator;

pub use estimator::{MotionConfig, MotionEstimate, MotionEstimator};

use image::GrayImage;

use crate::features::{
    good_features_to_track, GoodFeaturesConfig, PyramidalLkTracker, TrackResult,
};
use crate::homography::{
    fit_homography, HomographyConfig, HomographyError, HomographyFit, MIN_CORRESPONDENCES,
};
use crate::transform::TransformError;

// ── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MotionError {
    #[error("no features detected in the previous frame")]
    NoFeatures,
    #[error("too few tracked correspondences: need {needed}, got {got}")]
    TooFewCorrespondences { needed: usize, got: usize },
    #[error("homography fit failed: {0}")]
    Homography(#[from] HomographyError),
    #[error(transparent)]
    Degenerate(#[from] TransformError),
}

// ── Capabilities ───────────────────────────────────────────────────────────

/// Finds trackable points in a grayscale frame.
pub trait FeatureDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<[f32; 2]>;
}

/// Follows points from one frame into the next.
pub trait FeatureTracker {
    /// The result is index-aligned with `points`.
    fn track(&self, prev: &GrayImage, next: &GrayImage, points: &[[f32; 2]]) -> TrackResult;
}

/// Fits a planar homography mapping `src` onto `dst`.
pub trait HomographyFitter {
    fn fit(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<HomographyFit, HomographyError>;
}

/// Minimum-eigenvalue corner detector.
#[derive(Debug, Clone, Default)]
pub struct ShiTomasiDetector {
    pub config: GoodFeaturesConfig,
}

impl ShiTomasiDetector {
    pub fn new(config: GoodFeaturesConfig) -> Self {
        Self { config }
    }
}

impl FeatureDetector for ShiTomasiDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<[f32; 2]> {
        good_features_to_track(gray, &self.config)
            .iter()
            .map(|c| c.position())
            .collect()
    }
}

impl FeatureTracker for PyramidalLkTracker {
    fn track(&self, prev: &GrayImage, next: &GrayImage, points: &[[f32; 2]]) -> TrackResult {
        PyramidalLkTracker::track(self, prev, next, points)
    }
}

/// Least-squares or RANSAC DLT homography fitter.
#[derive(Debug, Clone, Default)]
pub struct DltHomographyFitter {
    pub config: HomographyConfig,
}

impl DltHomographyFitter {
    pub fn new(config: HomographyConfig) -> Self {
        Self { config }
    }
}

impl HomographyFitter for DltHomographyFitter {
    fn fit(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Result<HomographyFit, HomographyError> {
        fit_homography(src, dst, &self.config)
    }
}

// ── Correspondences ────────────────────────────────────────────────────────

/// Index-aligned point pairs: `prev[i]` and `next[i]` are the same feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Correspondences {
    pub prev: Vec<[f32; 2]>,
    pub next: Vec<[f32; 2]>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.prev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prev.is_empty()
    }

    /// Widened copies for the homography fitter.
    pub fn to_f64(&self) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
        let widen = |pts: &[[f32; 2]]| -> Vec<[f64; 2]> {
            pts.iter().map(|p| [p[0] as f64, p[1] as f64]).collect()
        };
        (widen(&self.prev), widen(&self.next))
    }

    /// Error unless at least four pairs remain.
    pub fn require_minimum(&self) -> Result<(), MotionError> {
        if self.len() < MIN_CORRESPONDENCES {
            return Err(MotionError::TooFewCorrespondences {
                needed: MIN_CORRESPONDENCES,
                got: self.len(),
            });
        }
        Ok(())
    }
}

/// Keep the pairs whose tracking status is `true`, in input order.
///
/// Pairs with a non-finite tracked position are dropped as well.
pub fn clean_correspondences(prev: &[[f32; 2]], track: &TrackResult) -> Correspondences {
    let mut out = Correspondences::default();
    for ((p, q), &ok) in prev.iter().zip(&track.points).zip(&track.status) {
        if ok && q[0].is_finite() && q[1].is_finite() {
            out.prev.push(*p);
            out.next.push(*q);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_keeps_tracked_pairs_in_order() {
        let prev = [[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let track = TrackResult {
            points: vec![[1.5, 1.0], [f32::NAN, 0.0], [3.5, 3.0], [4.5, 4.0]],
            status: vec![true, true, false, true],
            error: vec![0.1, 0.2, 0.3, 0.4],
        };
        let c = clean_correspondences(&prev, &track);
        assert_eq!(c.prev, vec![[1.0, 1.0], [4.0, 4.0]]);
        assert_eq!(c.next, vec![[1.5, 1.0], [4.5, 4.0]]);
    }

    #[test]
    fn fewer_than_four_pairs_is_rejected() {
        let c = Correspondences {
            prev: vec![[0.0, 0.0]; 3],
            next: vec![[1.0, 0.0]; 3],
        };
        assert_eq!(
            c.require_minimum(),
            Err(MotionError::TooFewCorrespondences { needed: 4, got: 3 })
        );
    }
}
