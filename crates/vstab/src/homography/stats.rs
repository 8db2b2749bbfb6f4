//! Reprojection-error summaries for fitted homographies.

/// Fit statistics for one homography estimate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FitStats {
    /// Correspondences fed to the fitter.
    pub n_candidates: usize,
    /// Correspondences within the inlier threshold.
    pub n_inliers: usize,
    pub threshold_px: f64,
    /// Mean inlier reprojection error (pixels).
    pub mean_err_px: f64,
    /// 95th percentile inlier reprojection error (pixels).
    pub p95_err_px: f64,
}

impl FitStats {
    /// Summarize the finite errors selected by `inlier_mask`.
    pub(crate) fn from_errors(errors: &[f64], inlier_mask: &[bool], threshold_px: f64) -> Self {
        let mut inliers: Vec<f64> = errors
            .iter()
            .zip(inlier_mask)
            .filter(|&(e, &keep)| keep && e.is_finite())
            .map(|(&e, _)| e)
            .collect();
        inliers.sort_by(f64::total_cmp);

        let (mean_err_px, p95_err_px) = match inliers.last() {
            None => (0.0, 0.0),
            Some(_) => {
                let n = inliers.len();
                let rank = ((n as f64 * 0.95) as usize).min(n - 1);
                (inliers.iter().sum::<f64>() / n as f64, inliers[rank])
            }
        };

        Self {
            n_candidates: errors.len(),
            n_inliers: inliers.len(),
            threshold_px,
            mean_err_px,
            p95_err_px,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn nothing_selected_gives_zero_summary() {
        let stats = FitStats::from_errors(&[4.0, 5.0], &[false, false], 3.0);
        assert_eq!(stats.n_candidates, 2);
        assert_eq!(stats.n_inliers, 0);
        assert_eq!((stats.mean_err_px, stats.p95_err_px), (0.0, 0.0));
    }

    #[test]
    fn outliers_and_nan_are_left_out() {
        let errors = [0.5, f64::NAN, 0.25, 2.0, 0.75];
        let mask = [true, true, true, false, true];
        let stats = FitStats::from_errors(&errors, &mask, 1.0);
        assert_eq!(stats.n_inliers, 3);
        assert_relative_eq!(stats.mean_err_px, 0.5, epsilon = 1e-12);
        assert_relative_eq!(stats.p95_err_px, 0.75);
    }

    #[test]
    fn p95_picks_the_tail_of_many_samples() {
        let errors: Vec<f64> = (0..100).rev().map(|i| i as f64 / 100.0).collect();
        let stats = FitStats::from_errors(&errors, &vec![true; 100], 3.0);
        assert_relative_eq!(stats.p95_err_px, 0.95);
        assert_relative_eq!(stats.mean_err_px, 0.495, epsilon = 1e-12);
    }
}
