//! 3×3 planar projective transform used throughout the pipeline.
//!
//! A [`Transform`] is a small `Copy` value: composition, inversion and
//! normalization each return a new value instead of mutating in place.

use nalgebra::{Matrix3, Vector3};

/// Below this magnitude the (2,2) element is treated as zero.
const SCALE_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TransformError {
    /// Element (2,2) is zero (or not finite), so the transform cannot be normalized.
    #[error("degenerate transform: scale element (2,2) = {0}")]
    ZeroScale(f64),
    /// The matrix has no inverse.
    #[error("degenerate transform: matrix is singular")]
    Singular,
}

/// Planar homography mapping coordinates of one frame into another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    m: Matrix3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    pub fn from_matrix(m: Matrix3<f64>) -> Self {
        Self { m }
    }

    /// Build from three rows.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self {
            m: Matrix3::new(
                rows[0][0], rows[0][1], rows[0][2],
                rows[1][0], rows[1][1], rows[1][2],
                rows[2][0], rows[2][1], rows[2][2],
            ),
        }
    }

    /// Build from the nine components in row-major order.
    pub fn from_components(c: [f64; 9]) -> Self {
        Self {
            m: Matrix3::new(c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7], c[8]),
        }
    }

    /// Pure translation by `(tx, ty)` pixels.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::from_rows([[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]])
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Element at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.m[(row, col)]
    }

    /// The nine components in row-major order.
    pub fn components(&self) -> [f64; 9] {
        let m = &self.m;
        [
            m[(0, 0)], m[(0, 1)], m[(0, 2)],
            m[(1, 0)], m[(1, 1)], m[(1, 2)],
            m[(2, 0)], m[(2, 1)], m[(2, 2)],
        ]
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let c = self.components();
        [[c[0], c[1], c[2]], [c[3], c[4], c[5]], [c[6], c[7], c[8]]]
    }

    /// `self × rhs`: apply `rhs` first, then `self`.
    pub fn compose(&self, rhs: &Transform) -> Transform {
        Transform { m: self.m * rhs.m }
    }

    /// Scale so that element (2,2) equals 1.
    ///
    /// Raw products are not normalized, so this must follow every
    /// [`compose`](Self::compose) whose result is stored.
    pub fn normalized(&self) -> Result<Transform, TransformError> {
        let scale = self.m[(2, 2)];
        if !scale.is_finite() || scale.abs() < SCALE_EPS {
            return Err(TransformError::ZeroScale(scale));
        }
        Ok(Transform { m: self.m / scale })
    }

    pub fn inverse(&self) -> Result<Transform, TransformError> {
        self.m
            .try_inverse()
            .map(|m| Transform { m })
            .ok_or(TransformError::Singular)
    }

    /// Map a point through the transform: `H · [x, y, 1]ᵀ` dehomogenized.
    ///
    /// Returns NaNs when the point maps to infinity.
    pub fn project(&self, x: f64, y: f64) -> [f64; 2] {
        let p = self.m * Vector3::new(x, y, 1.0);
        if p[2].abs() < 1e-15 {
            return [f64::NAN, f64::NAN];
        }
        [p[0] / p[2], p[1] / p[2]]
    }

    /// Translation part `(m02, m12)` of a normalized transform.
    pub fn translation_part(&self) -> [f64; 2] {
        [self.m[(0, 2)], self.m[(1, 2)]]
    }

    /// Largest absolute component-wise difference to `other`.
    pub fn max_abs_diff(&self, other: &Transform) -> f64 {
        self.components()
            .iter()
            .zip(other.components().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl From<Matrix3<f64>> for Transform {
    fn from(m: Matrix3<f64>) -> Self {
        Self { m }
    }
}
