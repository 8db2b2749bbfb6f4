//! Corrective transforms and perspective re-rendering of frames.

use image::{Rgb, RgbImage};

use crate::transform::{Transform, TransformError};

/// Fill color for pixels that map outside the source frame.
const FILL: Rgb<u8> = Rgb([0, 0, 0]);

/// `normalize(smoothed × actual⁻¹)`: carries a frame from its actual
/// cumulative position onto the smoothed one.
pub fn corrective_transform(
    actual: &Transform,
    smoothed: &Transform,
) -> Result<Transform, TransformError> {
    smoothed.compose(&actual.inverse()?).normalized()
}

/// Warp `frame` by `corrective` into a `width × height` canvas.
///
/// Every output pixel is sampled bilinearly at its preimage under
/// `corrective`. Taps that fall outside the frame contribute black in
/// proportion to their weight, so a pixel whose preimage lands on the
/// frame edge keeps the edge color.
pub fn warp_frame(
    frame: &RgbImage,
    corrective: &Transform,
    (width, height): (u32, u32),
) -> Result<RgbImage, TransformError> {
    let inverse = corrective.inverse()?;
    if inverse.components().iter().any(|v| !v.is_finite()) {
        return Err(TransformError::Singular);
    }
    let mut out = RgbImage::from_pixel(width, height, FILL);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let [sx, sy] = inverse.project(x as f64, y as f64);
        if let Some(sample) = sample_with_fill(frame, sx, sy) {
            *px = sample;
        }
    }
    Ok(out)
}

/// Bilinear sample at `(x, y)`; `None` when no tap touches the frame.
fn sample_with_fill(frame: &RgbImage, x: f64, y: f64) -> Option<Rgb<u8>> {
    let (w, h) = frame.dimensions();
    if !(x > -1.0 && y > -1.0 && x < w as f64 && y < h as f64) {
        return None;
    }
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let mut acc = [0.0f64; 3];
    for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
        for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
            let weight = wx * wy;
            if weight == 0.0 {
                continue;
            }
            let (tx, ty) = (x0 + dx, y0 + dy);
            let tap = if (0..w as i64).contains(&tx) && (0..h as i64).contains(&ty) {
                frame.get_pixel(tx as u32, ty as u32)
            } else {
                &FILL
            };
            for (a, &c) in acc.iter_mut().zip(tap.0.iter()) {
                *a += weight * c as f64;
            }
        }
    }
    Some(Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::textured_frame;

    #[test]
    fn equal_trajectories_give_identity_correction() {
        let h = Transform::from_rows([[1.02, 0.01, 7.0], [0.0, 0.97, -3.0], [1e-4, 2e-5, 1.0]]);
        let c = corrective_transform(&h, &h).unwrap();
        assert!(c.max_abs_diff(&Transform::identity()) < 1e-12);
    }

    #[test]
    fn correction_moves_actual_onto_smoothed() {
        let actual = Transform::translation(10.0, 4.0);
        let smoothed = Transform::translation(7.0, 5.0);
        let c = corrective_transform(&actual, &smoothed).unwrap();
        let [tx, ty] = c.translation_part();
        assert!((tx + 3.0).abs() < 1e-12 && (ty - 1.0).abs() < 1e-12);
    }

    #[test]
    fn singular_actual_is_rejected() {
        let singular = Transform::from_rows([[1.0, 2.0, 0.0], [2.0, 4.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(corrective_transform(&singular, &Transform::identity()).is_err());
        assert!(warp_frame(&RgbImage::new(4, 4), &singular, (4, 4)).is_err());
    }

    #[test]
    fn identity_warp_reproduces_every_pixel() {
        let frame = textured_frame(64, 48, 0, 0);
        let out = warp_frame(&frame, &Transform::identity(), (64, 48)).unwrap();
        assert_eq!(out, frame);

        let solid = RgbImage::from_pixel(20, 10, Rgb([200, 100, 50]));
        let out = warp_frame(&solid, &Transform::identity(), (20, 10)).unwrap();
        assert_eq!(out, solid);
    }

    #[test]
    fn near_identity_keeps_the_frame_edges() {
        // Round-off from composing and inverting cumulative transforms.
        let tiny = Transform::from_rows([
            [1.0 + 1e-13, -1e-13, -1e-13],
            [1e-13, 1.0 - 1e-13, 1e-13],
            [0.0, 0.0, 1.0],
        ]);
        let frame = textured_frame(64, 48, 0, 0);
        let out = warp_frame(&frame, &tiny, (64, 48)).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn translation_shifts_content_and_fills_black() {
        let frame = RgbImage::from_pixel(20, 10, Rgb([200, 100, 50]));
        let out = warp_frame(&frame, &Transform::translation(5.0, 0.0), (20, 10)).unwrap();
        assert_eq!(*out.get_pixel(2, 5), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(12, 5), Rgb([200, 100, 50]));
        assert_eq!(*out.get_pixel(19, 9), Rgb([200, 100, 50]));
    }

    #[test]
    fn half_pixel_shift_blends_the_edge_with_fill() {
        let frame = RgbImage::from_pixel(8, 4, Rgb([200, 100, 50]));
        let out = warp_frame(&frame, &Transform::translation(0.5, 0.0), (8, 4)).unwrap();
        assert_eq!(*out.get_pixel(0, 2), Rgb([100, 50, 25]));
        assert_eq!(*out.get_pixel(1, 2), Rgb([200, 100, 50]));
    }
}
