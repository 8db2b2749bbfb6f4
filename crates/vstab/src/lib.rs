//! vstab: pure-Rust two-pass video stabilization.
//!
//! The pipeline stages are:
//!
//! 1. **Source**: sequential, rewindable frame decoding ([`video`]).
//! 2. **Motion**: minimum-eigenvalue corners, pyramidal Lucas–Kanade
//!    tracking and a RANSAC homography between consecutive frames
//!    ([`motion`], [`features`], [`homography`]).
//! 3. **Accumulate**: pairwise homographies folded into a cumulative
//!    camera trajectory ([`trajectory`]).
//! 4. **Smooth**: Gaussian low-pass of every matrix component over time.
//! 5. **Warp**: each frame re-rendered through
//!    `smoothed × actual⁻¹` and appended to the output ([`warp`]).
//!
//! Stages 1–4 form pass 1; pass 2 rewinds the source and runs stage 5 with
//! the cached plan.
//!
//! # Public API
//! - [`Stabilizer`] and [`StabilizeConfig`] as primary entry points
//! - [`FrameSource`] / [`FrameSink`] for I/O, with image-sequence, ffmpeg
//!   and in-memory implementations
//! - [`FeatureDetector`], [`FeatureTracker`] and [`HomographyFitter`] for
//!   substituting motion-estimation stages
//!
//! ```no_run
//! use vstab::{ImageSequenceSink, ImageSequenceSource, StabilizeConfig, Stabilizer};
//!
//! let mut source = ImageSequenceSource::open("frames/").unwrap();
//! let stabilizer = Stabilizer::new(StabilizeConfig::default()).unwrap();
//! let (_sink, report) = stabilizer
//!     .stabilize(&mut source, |g| ImageSequenceSink::create("stable/", g.width, g.height))
//!     .unwrap();
//! println!("wrote {} frames", report.frames_written);
//! ```

mod error;
pub mod features;
pub mod homography;
pub mod motion;
mod pipeline;
pub mod trajectory;
mod transform;
pub mod video;
pub mod warp;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{StabilizeError, StabilizeResult};
pub use motion::{
    FeatureDetector, FeatureTracker, HomographyFitter, MotionConfig, MotionError,
    MotionEstimate, MotionEstimator,
};
pub use pipeline::{
    FrameMotion, FrameReport, MotionFailurePolicy, MotionFallback, RenderSummary, SkipReason,
    SkippedFrame, StabilizationPlan, StabilizeConfig, StabilizeReport, Stabilizer,
    TrajectoryReport,
};
pub use trajectory::{BoundaryMode, SmoothingConfig, Trajectory, TrajectoryEntry};
pub use transform::{Transform, TransformError};
pub use video::{
    probe_video, FfmpegSink, FfmpegSource, Frame, FrameGeometry, FrameRead, FrameSink,
    FrameSource, ImageSequenceSink, ImageSequenceSource, MemorySink, MemorySource, VideoError,
    VideoInfo, VideoResult,
};
