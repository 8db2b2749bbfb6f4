//! Two-pass stabilization pipeline.
//!
//! Pass 1 ([`Stabilizer::plan`]) decodes every frame, estimates motion
//! between consecutive accepted frames, accumulates the cumulative
//! trajectory and smooths it. Pass 2 ([`Stabilizer::render`]) rewinds the
//! source and warps each frame onto the smoothed path without estimating
//! motion again.

mod config;
mod result;
mod run;

pub use config::{MotionFailurePolicy, StabilizeConfig};
pub use result::{
    FrameMotion, FrameReport, MotionFallback, RenderSummary, SkipReason, SkippedFrame,
    StabilizationPlan, StabilizeReport, TrajectoryReport,
};
pub use run::Stabilizer;
