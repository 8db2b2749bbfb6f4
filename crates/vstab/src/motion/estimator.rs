use image::GrayImage;

use super::{
    clean_correspondences, DltHomographyFitter, FeatureDetector, FeatureTracker,
    HomographyFitter, MotionError, ShiTomasiDetector,
};
use crate::features::{GoodFeaturesConfig, KltConfig, PyramidalLkTracker};
use crate::homography::{FitStats, HomographyConfig};
use crate::transform::Transform;

/// Configuration of the default detector, tracker and fitter.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub features: GoodFeaturesConfig,
    pub tracking: KltConfig,
    pub homography: HomographyConfig,
}

/// Pairwise motion between two frames.
#[derive(Debug, Clone)]
pub struct MotionEstimate {
    /// Normalized homography mapping previous-frame pixels to next-frame pixels.
    pub transform: Transform,
    pub n_features: usize,
    pub n_tracked: usize,
    pub fit: FitStats,
}

/// Detect → track → clean → fit.
pub struct MotionEstimator {
    detector: Box<dyn FeatureDetector>,
    tracker: Box<dyn FeatureTracker>,
    fitter: Box<dyn HomographyFitter>,
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new(&MotionConfig::default())
    }
}

impl std::fmt::Debug for MotionEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionEstimator").finish_non_exhaustive()
    }
}

impl MotionEstimator {
    /// Estimator backed by the built-in implementations.
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            detector: Box::new(ShiTomasiDetector::new(config.features.clone())),
            tracker: Box::new(PyramidalLkTracker::new(config.tracking.clone())),
            fitter: Box::new(DltHomographyFitter::new(config.homography.clone())),
        }
    }

    /// Estimator over caller-supplied capabilities.
    pub fn with_components(
        detector: Box<dyn FeatureDetector>,
        tracker: Box<dyn FeatureTracker>,
        fitter: Box<dyn HomographyFitter>,
    ) -> Self {
        Self {
            detector,
            tracker,
            fitter,
        }
    }

    /// Estimate the homography carrying `prev` onto `next`.
    pub fn estimate(&self, prev: &GrayImage, next: &GrayImage) -> Result<MotionEstimate, MotionError> {
        let features = self.detector.detect(prev);
        if features.is_empty() {
            return Err(MotionError::NoFeatures);
        }

        let track = self.tracker.track(prev, next, &features);
        let pairs = clean_correspondences(&features, &track);
        tracing::debug!(
            n_features = features.len(),
            n_tracked = pairs.len(),
            "tracked features"
        );
        pairs.require_minimum()?;

        let (src, dst) = pairs.to_f64();
        let fit = self.fitter.fit(&src, &dst)?;
        let transform = fit.transform.normalized()?;

        Ok(MotionEstimate {
            transform,
            n_features: features.len(),
            n_tracked: pairs.len(),
            fit: fit.stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TrackResult;
    use crate::test_utils::textured_scene;

    struct FixedDetector(Vec<[f32; 2]>);

    impl FeatureDetector for FixedDetector {
        fn detect(&self, _gray: &GrayImage) -> Vec<[f32; 2]> {
            self.0.clone()
        }
    }

    /// Reports every point as lost except the first `keep`.
    struct LossyTracker {
        keep: usize,
    }

    impl FeatureTracker for LossyTracker {
        fn track(&self, _prev: &GrayImage, _next: &GrayImage, points: &[[f32; 2]]) -> TrackResult {
            TrackResult {
                points: points.to_vec(),
                status: (0..points.len()).map(|i| i < self.keep).collect(),
                error: vec![0.0; points.len()],
            }
        }
    }

    fn grid_points() -> Vec<[f32; 2]> {
        (0..10)
            .map(|i| [10.0 + 13.0 * i as f32, 10.0 + 7.0 * (i % 4) as f32])
            .collect()
    }

    #[test]
    fn identical_frames_give_identity() {
        let img = textured_scene(160, 120, 0, 0);
        let est = MotionEstimator::default().estimate(&img, &img).unwrap();
        assert!(est.n_tracked >= 4);
        assert!(
            est.transform.max_abs_diff(&Transform::identity()) < 1e-3,
            "{:?}",
            est.transform
        );
    }

    #[test]
    fn shifted_frames_give_translation() {
        let prev = textured_scene(160, 120, 0, 0);
        let next = textured_scene(160, 120, 4, 2);
        let est = MotionEstimator::default().estimate(&prev, &next).unwrap();
        let [tx, ty] = est.transform.translation_part();
        assert!((tx - 4.0).abs() < 0.5, "tx = {tx}");
        assert!((ty - 2.0).abs() < 0.5, "ty = {ty}");
    }

    #[test]
    fn flat_frame_has_no_features() {
        let flat = GrayImage::from_pixel(64, 48, image::Luma([50]));
        let err = MotionEstimator::default().estimate(&flat, &flat).unwrap_err();
        assert_eq!(err, MotionError::NoFeatures);
    }

    #[test]
    fn three_tracked_points_is_an_error() {
        let estimator = MotionEstimator::with_components(
            Box::new(FixedDetector(grid_points())),
            Box::new(LossyTracker { keep: 3 }),
            Box::new(DltHomographyFitter::default()),
        );
        let img = GrayImage::new(160, 60);
        let err = estimator.estimate(&img, &img).unwrap_err();
        assert_eq!(err, MotionError::TooFewCorrespondences { needed: 4, got: 3 });
    }

    #[test]
    fn substituted_capabilities_are_used() {
        let estimator = MotionEstimator::with_components(
            Box::new(FixedDetector(grid_points())),
            Box::new(LossyTracker { keep: 10 }),
            Box::new(DltHomographyFitter::default()),
        );
        let img = GrayImage::new(160, 60);
        let est = estimator.estimate(&img, &img).unwrap();
        assert_eq!(est.n_features, 10);
        assert_eq!(est.n_tracked, 10);
        assert!(est.transform.max_abs_diff(&Transform::identity()) < 1e-9);
    }
}
