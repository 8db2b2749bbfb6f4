//! Camera trajectory: accumulation of pairwise motion and temporal smoothing.

mod accumulate;
mod smooth;

pub use accumulate::{accumulate, accumulate_step, AccumulateError, Accumulator};
pub use smooth::{
    gaussian_kernel, smooth_trajectory, BoundaryMode, SmoothingConfig, MAX_SMOOTHING_WINDOW,
};

use crate::transform::Transform;

/// Cumulative transform of one accepted frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryEntry {
    /// Index of the frame in the source.
    pub frame_index: usize,
    pub transform: Transform,
}

/// Ordered cumulative transforms, one per accepted frame transition.
///
/// Frame indices are strictly increasing. A trajectory is built once and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    entries: Vec<TrajectoryEntry>,
}

impl Trajectory {
    /// Entries must already be sorted by strictly increasing `frame_index`.
    pub(crate) fn from_entries(entries: Vec<TrajectoryEntry>) -> Self {
        debug_assert!(entries
            .windows(2)
            .all(|w| w[0].frame_index < w[1].frame_index));
        Self { entries }
    }

    pub fn entries(&self) -> &[TrajectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TrajectoryEntry> {
        self.entries.iter()
    }

    /// Transform recorded for `frame_index`, if that frame was accepted.
    pub fn transform_for(&self, frame_index: usize) -> Option<&Transform> {
        self.entries
            .binary_search_by_key(&frame_index, |e| e.frame_index)
            .ok()
            .map(|i| &self.entries[i].transform)
    }

    /// Time series of component `k` (row-major); `None` unless `k < 9`.
    pub fn component_series(&self, k: usize) -> Option<Vec<f64>> {
        (k < 9).then(|| {
            self.entries
                .iter()
                .map(|e| e.transform.components()[k])
                .collect()
        })
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a TrajectoryEntry;
    type IntoIter = std::slice::Iter<'a, TrajectoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_frame_index() {
        let traj = Trajectory::from_entries(vec![
            TrajectoryEntry {
                frame_index: 1,
                transform: Transform::translation(1.0, 0.0),
            },
            TrajectoryEntry {
                frame_index: 3,
                transform: Transform::translation(2.0, 0.0),
            },
        ]);
        assert_eq!(traj.transform_for(3), Some(&Transform::translation(2.0, 0.0)));
        assert_eq!(traj.transform_for(2), None);
        assert_eq!(traj.component_series(2), Some(vec![1.0, 2.0]));
        assert_eq!(traj.component_series(8), Some(vec![1.0, 1.0]));
        assert_eq!(traj.component_series(9), None);
    }
}
