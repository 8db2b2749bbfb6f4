//! Pass-1 plan and serializable run reports.

use serde::{Deserialize, Serialize};

use crate::trajectory::Trajectory;
use crate::video::FrameGeometry;

/// Why a frame is absent from the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The source could not decode the frame.
    Decode { message: String },
    /// The frame size differs from the first frame.
    SizeMismatch { width: u32, height: u32 },
    /// Motion estimation or accumulation failed under the skip policy.
    Motion { message: String },
    /// The corrective transform could not be built or applied.
    Correction { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFrame {
    pub frame_index: usize,
    pub reason: SkipReason,
}

/// A transition for which the identity was substituted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionFallback {
    pub frame_index: usize,
    pub error: String,
}

/// Motion-estimation diagnostics of one accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMotion {
    pub frame_index: usize,
    pub n_features: usize,
    pub n_tracked: usize,
    pub n_inliers: usize,
    pub mean_err_px: f64,
}

/// Everything pass 2 needs to re-render the source.
#[derive(Debug, Clone)]
pub struct StabilizationPlan {
    /// Output size and rate, taken from the first decoded frame.
    pub geometry: FrameGeometry,
    /// Index of the first decoded frame.
    pub reference_index: usize,
    pub frames_decoded: usize,
    pub actual: Trajectory,
    pub smoothed: Trajectory,
    /// Frames dropped in pass 1.
    pub skipped: Vec<SkippedFrame>,
    pub fallbacks: Vec<MotionFallback>,
    /// Per-transition diagnostics; fallback transitions have no entry.
    pub motion: Vec<FrameMotion>,
}

impl StabilizationPlan {
    /// Serializable view of both trajectories and the pass-1 diagnostics.
    pub fn trajectory_report(&self) -> TrajectoryReport {
        let frames = self
            .actual
            .iter()
            .zip(self.smoothed.iter())
            .map(|(a, s)| FrameReport {
                frame_index: a.frame_index,
                actual: a.transform.to_rows(),
                smoothed: s.transform.to_rows(),
                motion: self
                    .motion
                    .iter()
                    .find(|m| m.frame_index == a.frame_index)
                    .cloned(),
            })
            .collect();
        TrajectoryReport {
            geometry: self.geometry,
            reference_index: self.reference_index,
            frames_decoded: self.frames_decoded,
            frames,
            skipped: self.skipped.clone(),
            fallbacks: self.fallbacks.clone(),
        }
    }
}

/// One accepted frame: cumulative and smoothed transforms, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub frame_index: usize,
    pub actual: [[f64; 3]; 3],
    pub smoothed: [[f64; 3]; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motion: Option<FrameMotion>,
}

/// Pass-1 summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryReport {
    pub geometry: FrameGeometry,
    pub reference_index: usize,
    pub frames_decoded: usize,
    pub frames: Vec<FrameReport>,
    pub skipped: Vec<SkippedFrame>,
    pub fallbacks: Vec<MotionFallback>,
}

/// Pass-2 summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderSummary {
    pub frames_written: usize,
    /// Frames dropped in pass 2.
    pub skipped: Vec<SkippedFrame>,
}

/// Full run summary written by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilizeReport {
    #[serde(flatten)]
    pub trajectory: TrajectoryReport,
    pub frames_written: usize,
    pub render_skipped: Vec<SkippedFrame>,
}

impl StabilizeReport {
    pub fn new(plan: &StabilizationPlan, render: RenderSummary) -> Self {
        Self {
            trajectory: plan.trajectory_report(),
            frames_written: render.frames_written,
            render_skipped: render.skipped,
        }
    }
}
