//! Two-pass orchestration: estimate and smooth the trajectory, then rewind
//! and re-render every frame with the cached plan.

use image::GrayImage;

use super::config::{MotionFailurePolicy, StabilizeConfig};
use super::result::{
    FrameMotion, MotionFallback, RenderSummary, SkipReason, SkippedFrame, StabilizationPlan,
    StabilizeReport,
};
use crate::error::{StabilizeError, StabilizeResult};
use crate::motion::{MotionError, MotionEstimator};
use crate::trajectory::{smooth_trajectory, Accumulator};
use crate::transform::Transform;
use crate::video::{
    FrameGeometry, FrameRead, FrameSink, FrameSource, VideoResult, DEFAULT_SEQUENCE_FPS,
};
use crate::warp::{corrective_transform, warp_frame};

/// Video stabilizer.
///
/// Create once from a [`StabilizeConfig`], run on many sources.
#[derive(Debug)]
pub struct Stabilizer {
    config: StabilizeConfig,
    estimator: MotionEstimator,
}

impl Stabilizer {
    /// Stabilizer with the built-in detector, tracker and fitter.
    pub fn new(config: StabilizeConfig) -> StabilizeResult<Self> {
        let estimator = MotionEstimator::new(&config.motion);
        Self::with_estimator(config, estimator)
    }

    /// Stabilizer with a caller-assembled motion estimator.
    ///
    /// `config.motion` is not consulted.
    pub fn with_estimator(config: StabilizeConfig, estimator: MotionEstimator) -> StabilizeResult<Self> {
        config.validate()?;
        Ok(Self { config, estimator })
    }

    pub fn config(&self) -> &StabilizeConfig {
        &self.config
    }

    /// Run both passes and write the stabilized stream to the sink returned
    /// by `open_sink`, which is called once the output geometry is known.
    pub fn stabilize<S, K, F>(&self, source: &mut S, open_sink: F) -> StabilizeResult<(K, StabilizeReport)>
    where
        S: FrameSource + ?Sized,
        K: FrameSink,
        F: FnOnce(&FrameGeometry) -> VideoResult<K>,
    {
        let plan = self.plan(source)?;
        let (sink, render) = self.render(source, &plan, open_sink)?;
        Ok((sink, StabilizeReport::new(&plan, render)))
    }

    // ── Pass 1 ─────────────────────────────────────────────────────────────

    /// Decode every frame, estimate pairwise motion, accumulate and smooth.
    pub fn plan<S>(&self, source: &mut S) -> StabilizeResult<StabilizationPlan>
    where
        S: FrameSource + ?Sized,
    {
        let policy = self.config.on_motion_failure;
        tracing::info!(
            frames_hint = ?source.frame_count_hint(),
            ?policy,
            "pass 1: estimating motion"
        );

        let mut geometry: Option<FrameGeometry> = None;
        let mut reference_index = 0;
        let mut prev_gray: Option<GrayImage> = None;
        let mut acc = Accumulator::new();
        let mut frames_decoded = 0usize;
        let mut skipped = Vec::new();
        let mut fallbacks = Vec::new();
        let mut motion = Vec::new();

        loop {
            let frame = match source.read_next()? {
                FrameRead::End => break,
                FrameRead::Unavailable { index, reason } => {
                    tracing::warn!(frame = index, %reason, "frame could not be decoded, skipped");
                    skipped.push(SkippedFrame {
                        frame_index: index,
                        reason: SkipReason::Decode { message: reason },
                    });
                    continue;
                }
                FrameRead::Frame(frame) => frame,
            };
            frames_decoded += 1;
            let index = frame.index;

            let Some(geom) = geometry else {
                let (width, height) = frame.dimensions();
                let fps = self
                    .config
                    .fps
                    .or_else(|| source.fps())
                    .unwrap_or(DEFAULT_SEQUENCE_FPS);
                geometry = Some(FrameGeometry { width, height, fps });
                reference_index = index;
                prev_gray = Some(frame.to_gray());
                tracing::debug!(frame = index, width, height, fps, "reference frame");
                continue;
            };

            let (width, height) = frame.dimensions();
            if (width, height) != geom.size() {
                tracing::warn!(frame = index, width, height, "frame size differs from the first frame, skipped");
                skipped.push(SkippedFrame {
                    frame_index: index,
                    reason: SkipReason::SizeMismatch { width, height },
                });
                continue;
            }

            let gray = frame.to_gray();
            let Some(prev) = prev_gray.as_ref() else {
                continue;
            };

            let estimate = self.estimator.estimate(prev, &gray);
            let pairwise = match estimate {
                Ok(est) => {
                    tracing::debug!(
                        frame = index,
                        n_features = est.n_features,
                        n_tracked = est.n_tracked,
                        n_inliers = est.fit.n_inliers,
                        mean_err_px = est.fit.mean_err_px,
                        "estimated motion"
                    );
                    motion.push(FrameMotion {
                        frame_index: index,
                        n_features: est.n_features,
                        n_tracked: est.n_tracked,
                        n_inliers: est.fit.n_inliers,
                        mean_err_px: est.fit.mean_err_px,
                    });
                    est.transform
                }
                Err(err) => match recover(policy, index, err, &mut skipped, &mut fallbacks)? {
                    Some(identity) => identity,
                    None => continue,
                },
            };

            if let Err(err) = acc.push(index, &pairwise) {
                // The estimate never reaches the trajectory.
                motion.retain(|m| m.frame_index != index);
                let err = MotionError::Degenerate(err);
                match recover(policy, index, err, &mut skipped, &mut fallbacks)? {
                    Some(_) => {
                        acc.hold(index);
                    }
                    None => continue,
                }
            }
            prev_gray = Some(gray);
        }

        let Some(geometry) = geometry else {
            return Err(StabilizeError::EmptyInput);
        };

        let actual = acc.finish();
        let smoothed = smooth_trajectory(&actual, &self.config.smoothing);
        tracing::info!(
            frames_decoded,
            transitions = actual.len(),
            skipped = skipped.len(),
            fallbacks = fallbacks.len(),
            "pass 1 complete"
        );

        Ok(StabilizationPlan {
            geometry,
            reference_index,
            frames_decoded,
            actual,
            smoothed,
            skipped,
            fallbacks,
            motion,
        })
    }

    // ── Pass 2 ─────────────────────────────────────────────────────────────

    /// Rewind `source` and write every planned frame through its corrective
    /// warp. Frames without a trajectory entry are not written.
    pub fn render<S, K, F>(
        &self,
        source: &mut S,
        plan: &StabilizationPlan,
        open_sink: F,
    ) -> StabilizeResult<(K, RenderSummary)>
    where
        S: FrameSource + ?Sized,
        K: FrameSink,
        F: FnOnce(&FrameGeometry) -> VideoResult<K>,
    {
        tracing::info!(
            frames = plan.actual.len(),
            width = plan.geometry.width,
            height = plan.geometry.height,
            "pass 2: rendering"
        );
        source.rewind()?;
        let mut sink = open_sink(&plan.geometry)?;
        let size = plan.geometry.size();
        let mut summary = RenderSummary::default();

        loop {
            let frame = match source.read_next()? {
                FrameRead::End => break,
                FrameRead::Unavailable { index, reason } => {
                    tracing::warn!(frame = index, %reason, "frame could not be decoded, skipped");
                    summary.skipped.push(SkippedFrame {
                        frame_index: index,
                        reason: SkipReason::Decode { message: reason },
                    });
                    continue;
                }
                FrameRead::Frame(frame) => frame,
            };
            let index = frame.index;

            if index == plan.reference_index {
                if self.config.keep_reference_frame && frame.dimensions() == size {
                    sink.write_frame(&frame.image)?;
                    summary.frames_written += 1;
                }
                continue;
            }

            let (Some(actual), Some(smoothed)) = (
                plan.actual.transform_for(index),
                plan.smoothed.transform_for(index),
            ) else {
                tracing::debug!(frame = index, "no trajectory entry, not written");
                continue;
            };
            if frame.dimensions() != size {
                let (width, height) = frame.dimensions();
                tracing::warn!(frame = index, width, height, "frame size changed since pass 1, skipped");
                summary.skipped.push(SkippedFrame {
                    frame_index: index,
                    reason: SkipReason::SizeMismatch { width, height },
                });
                continue;
            }

            let warped = corrective_transform(actual, smoothed)
                .and_then(|corrective| warp_frame(&frame.image, &corrective, size));
            match warped {
                Ok(image) => {
                    sink.write_frame(&image)?;
                    summary.frames_written += 1;
                }
                Err(err) => {
                    tracing::warn!(frame = index, error = %err, "degenerate corrective transform, skipped");
                    summary.skipped.push(SkippedFrame {
                        frame_index: index,
                        reason: SkipReason::Correction {
                            message: err.to_string(),
                        },
                    });
                }
            }
        }

        sink.finish()?;
        tracing::info!(
            frames_written = summary.frames_written,
            skipped = summary.skipped.len(),
            "pass 2 complete"
        );
        Ok((sink, summary))
    }
}

/// Apply the failure policy. `Some` carries the substitute pairwise
/// transform; `None` means the frame is dropped.
fn recover(
    policy: MotionFailurePolicy,
    frame_index: usize,
    err: MotionError,
    skipped: &mut Vec<SkippedFrame>,
    fallbacks: &mut Vec<MotionFallback>,
) -> StabilizeResult<Option<Transform>> {
    match policy {
        MotionFailurePolicy::Identity => {
            tracing::warn!(frame = frame_index, error = %err, "motion estimation failed, assuming no motion");
            fallbacks.push(MotionFallback {
                frame_index,
                error: err.to_string(),
            });
            Ok(Some(Transform::identity()))
        }
        MotionFailurePolicy::SkipFrame => {
            tracing::warn!(frame = frame_index, error = %err, "motion estimation failed, frame skipped");
            skipped.push(SkippedFrame {
                frame_index,
                reason: SkipReason::Motion {
                    message: err.to_string(),
                },
            });
            Ok(None)
        }
        MotionFailurePolicy::Abort => Err(StabilizeError::Motion {
            frame_index,
            source: err,
        }),
    }
}
