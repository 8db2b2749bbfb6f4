//! Homography estimation between two point sets.

mod dlt;
mod stats;

pub use dlt::{
    estimate_homography_dlt, fit_homography_ransac, reprojection_error, HomographyError,
    RansacHomographyConfig, RansacHomographyResult, MIN_CORRESPONDENCES,
};
pub use stats::FitStats;

use crate::transform::Transform;

/// How the homography is fitted over the cleaned correspondences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomographyMethod {
    /// Plain least-squares DLT over every correspondence.
    LeastSquares,
    /// RANSAC over minimal samples, then a DLT refit on the inliers.
    #[default]
    Ransac,
}

/// Homography fitting configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HomographyConfig {
    pub method: HomographyMethod,
    /// Used only by [`HomographyMethod::Ransac`].
    pub ransac: RansacHomographyConfig,
}

/// A fitted, normalized homography together with its fit statistics.
#[derive(Debug, Clone)]
pub struct HomographyFit {
    pub transform: Transform,
    pub stats: FitStats,
}

/// Fit `src → dst` according to `config`.
pub fn fit_homography(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
    config: &HomographyConfig,
) -> Result<HomographyFit, HomographyError> {
    match config.method {
        HomographyMethod::LeastSquares => {
            let h = estimate_homography_dlt(src, dst)?;
            let errors: Vec<f64> = src
                .iter()
                .zip(dst)
                .map(|(s, d)| reprojection_error(&h, s, d))
                .collect();
            let threshold = config.ransac.inlier_threshold;
            let mask: Vec<bool> = errors.iter().map(|&e| e < threshold).collect();
            Ok(HomographyFit {
                transform: Transform::from_matrix(h),
                stats: FitStats::from_errors(&errors, &mask, threshold),
            })
        }
        HomographyMethod::Ransac => {
            let result = fit_homography_ransac(src, dst, &config.ransac)?;
            Ok(HomographyFit {
                transform: Transform::from_matrix(result.h),
                stats: FitStats::from_errors(
                    &result.errors,
                    &result.inlier_mask,
                    config.ransac.inlier_threshold,
                ),
            })
        }
    }
}
