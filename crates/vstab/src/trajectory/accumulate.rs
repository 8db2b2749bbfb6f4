use crate::transform::{Transform, TransformError};

use super::{Trajectory, TrajectoryEntry};

/// Accumulation hit a transform whose product cannot be normalized.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("degenerate cumulative transform at frame {frame_index}: {source}")]
pub struct AccumulateError {
    pub frame_index: usize,
    #[source]
    pub source: TransformError,
}

/// One fold step: `normalize(pairwise × cumulative)`.
pub fn accumulate_step(
    cumulative: &Transform,
    pairwise: &Transform,
) -> Result<Transform, TransformError> {
    pairwise.compose(cumulative).normalized()
}

/// Incremental builder of a [`Trajectory`], starting from identity.
///
/// A failed step leaves the running cumulative transform untouched.
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    cumulative: Transform,
    entries: Vec<TrajectoryEntry>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cumulative transform (identity before the first step).
    pub fn cumulative(&self) -> &Transform {
        &self.cumulative
    }

    /// Fold `pairwise` in and record the result for `frame_index`.
    ///
    /// `frame_index` must exceed every index pushed before.
    pub fn push(&mut self, frame_index: usize, pairwise: &Transform) -> Result<Transform, TransformError> {
        let next = accumulate_step(&self.cumulative, pairwise)?;
        self.cumulative = next;
        self.entries.push(TrajectoryEntry {
            frame_index,
            transform: next,
        });
        Ok(next)
    }

    /// Record `frame_index` with no motion since the previous entry.
    pub fn hold(&mut self, frame_index: usize) -> Transform {
        self.entries.push(TrajectoryEntry {
            frame_index,
            transform: self.cumulative,
        });
        self.cumulative
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn finish(self) -> Trajectory {
        Trajectory::from_entries(self.entries)
    }
}

/// Fold `(frame_index, pairwise)` steps into a cumulative trajectory.
pub fn accumulate<I>(steps: I) -> Result<Trajectory, AccumulateError>
where
    I: IntoIterator<Item = (usize, Transform)>,
{
    let mut acc = Accumulator::new();
    for (frame_index, pairwise) in steps {
        acc.push(frame_index, &pairwise)
            .map_err(|source| AccumulateError {
                frame_index,
                source,
            })?;
    }
    Ok(acc.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_steps_stay_identity() {
        let traj = accumulate((1..=5).map(|i| (i, Transform::identity()))).unwrap();
        assert_eq!(traj.len(), 5);
        for e in &traj {
            assert_eq!(e.transform, Transform::identity());
        }
    }

    #[test]
    fn constant_pan_accumulates_linearly() {
        let traj = accumulate((1..=6).map(|i| (i, Transform::translation(2.0, -1.0)))).unwrap();
        for (k, e) in traj.iter().enumerate() {
            let [tx, ty] = e.transform.translation_part();
            assert_relative_eq!(tx, 2.0 * (k + 1) as f64, epsilon = 1e-12);
            assert_relative_eq!(ty, -1.0 * (k + 1) as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn pairwise_is_left_multiplied() {
        let a = Transform::from_rows([[1.1, 0.0, 3.0], [0.0, 0.9, 0.0], [0.001, 0.0, 1.0]]);
        let b = Transform::from_rows([[1.0, 0.2, 0.0], [0.0, 1.0, 5.0], [0.0, 0.002, 1.0]]);
        let traj = accumulate([(1, a), (2, b)]).unwrap();
        let expected = b.compose(&a).normalized().unwrap();
        assert!(traj.entries()[1].transform.max_abs_diff(&expected) < 1e-12);
        assert_relative_eq!(traj.entries()[1].transform.get(2, 2), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn degenerate_step_reports_frame() {
        let bad = Transform::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        let err = accumulate([(1, Transform::identity()), (2, bad)]).unwrap_err();
        assert_eq!(err.frame_index, 2);
        assert!(matches!(err.source, TransformError::ZeroScale(_)));
    }

    #[test]
    fn failed_push_keeps_state() {
        let mut acc = Accumulator::new();
        acc.push(1, &Transform::translation(1.0, 0.0)).unwrap();
        let bad = Transform::from_rows([[0.0; 3]; 3]);
        assert!(acc.push(2, &bad).is_err());
        assert_eq!(acc.len(), 1);
        assert_eq!(*acc.cumulative(), Transform::translation(1.0, 0.0));
    }

    #[test]
    fn hold_repeats_the_cumulative_transform() {
        let mut acc = Accumulator::new();
        acc.push(1, &Transform::translation(3.0, 1.0)).unwrap();
        assert_eq!(acc.hold(4), Transform::translation(3.0, 1.0));
        let traj = acc.finish();
        assert_eq!(traj.transform_for(4), traj.transform_for(1));
    }
}
