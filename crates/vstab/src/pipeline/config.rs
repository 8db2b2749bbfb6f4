use std::path::Path;

use crate::error::{StabilizeError, StabilizeResult};
use crate::features::{MAX_BLOCK_SIZE, MAX_PYRAMID_LEVELS, MAX_WINDOW_RADIUS};
use crate::motion::MotionConfig;
use crate::trajectory::{SmoothingConfig, MAX_SMOOTHING_WINDOW};

/// What to do when motion between two frames cannot be estimated, or when
/// folding it into the trajectory is degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionFailurePolicy {
    /// Assume no motion for the transition and continue.
    #[default]
    Identity,
    /// Drop the frame; the previous frame stays the motion reference.
    SkipFrame,
    /// Stop the run with an error.
    Abort,
}

/// Stabilization configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StabilizeConfig {
    pub motion: MotionConfig,
    pub smoothing: SmoothingConfig,
    pub on_motion_failure: MotionFailurePolicy,
    /// Emit the first decoded frame, unwarped, ahead of the corrected frames.
    pub keep_reference_frame: bool,
    /// Output frame rate; the source rate is used when absent.
    pub fps: Option<f64>,
}

impl StabilizeConfig {
    /// Load from JSON. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> StabilizeResult<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no stage can run with.
    pub fn validate(&self) -> StabilizeResult<()> {
        let features = &self.motion.features;
        if features.block_size == 0 || features.block_size > MAX_BLOCK_SIZE {
            return Err(StabilizeError::invalid_config(format!(
                "features.block_size must be in 1..={MAX_BLOCK_SIZE}, got {}",
                features.block_size
            )));
        }
        if !(features.quality_level > 0.0 && features.quality_level <= 1.0) {
            return Err(StabilizeError::invalid_config(format!(
                "features.quality_level must be in (0, 1], got {}",
                features.quality_level
            )));
        }
        if !features.min_distance.is_finite() || features.min_distance < 0.0 {
            return Err(StabilizeError::invalid_config(format!(
                "features.min_distance must be >= 0, got {}",
                features.min_distance
            )));
        }

        let tracking = &self.motion.tracking;
        if tracking.window_radius == 0 || tracking.window_radius > MAX_WINDOW_RADIUS {
            return Err(StabilizeError::invalid_config(format!(
                "tracking.window_radius must be in 1..={MAX_WINDOW_RADIUS}, got {}",
                tracking.window_radius
            )));
        }
        if tracking.max_levels > MAX_PYRAMID_LEVELS {
            return Err(StabilizeError::invalid_config(format!(
                "tracking.max_levels must be <= {MAX_PYRAMID_LEVELS}, got {}",
                tracking.max_levels
            )));
        }
        if tracking.max_iterations == 0 {
            return Err(StabilizeError::invalid_config("tracking.max_iterations must be >= 1"));
        }
        if !(tracking.epsilon > 0.0) {
            return Err(StabilizeError::invalid_config(format!(
                "tracking.epsilon must be > 0, got {}",
                tracking.epsilon
            )));
        }

        let ransac = &self.motion.homography.ransac;
        if !(ransac.inlier_threshold > 0.0) {
            return Err(StabilizeError::invalid_config(format!(
                "homography.ransac.inlier_threshold must be > 0, got {}",
                ransac.inlier_threshold
            )));
        }
        if ransac.max_iters == 0 {
            return Err(StabilizeError::invalid_config("homography.ransac.max_iters must be >= 1"));
        }
        if !(ransac.confidence > 0.0 && ransac.confidence < 1.0) {
            return Err(StabilizeError::invalid_config(format!(
                "homography.ransac.confidence must be in (0, 1), got {}",
                ransac.confidence
            )));
        }

        if self.smoothing.window == 0 || self.smoothing.window > MAX_SMOOTHING_WINDOW {
            return Err(StabilizeError::invalid_config(format!(
                "smoothing.window must be in 1..={MAX_SMOOTHING_WINDOW}, got {}",
                self.smoothing.window
            )));
        }
        if let Some(sigma) = self.smoothing.sigma {
            if !sigma.is_finite() {
                return Err(StabilizeError::invalid_config("smoothing.sigma must be finite"));
            }
        }
        if let Some(fps) = self.fps {
            if !(fps.is_finite() && fps > 0.0) {
                return Err(StabilizeError::invalid_config(format!("fps must be > 0, got {fps}")));
            }
        }
        Ok(())
    }
}
