//! Shared synthetic frames for unit tests.

use image::{GrayImage, Luma, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Margin of the world around the visible frame, so shifted frames stay textured.
const WORLD_MARGIN: i32 = 60;

/// Render a blurred field of random rectangles, translated by `(dx, dy)`.
///
/// The same world is drawn for every call with equal `w`/`h`, so a point at
/// `(x, y)` in the `(0, 0)` frame appears at `(x + dx, y + dy)`.
pub(crate) fn textured_scene(w: u32, h: u32, dx: i32, dy: i32) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(7);
    let n_rects = ((w * h) / 400).max(12);
    let rects: Vec<(i32, i32, i32, i32, u8)> = (0..n_rects)
        .map(|_| {
            let x0 = rng.gen_range(-WORLD_MARGIN..w as i32 + WORLD_MARGIN);
            let y0 = rng.gen_range(-WORLD_MARGIN..h as i32 + WORLD_MARGIN);
            let rw = rng.gen_range(8..30);
            let rh = rng.gen_range(8..30);
            let v = rng.gen_range(20u8..236);
            (x0, y0, rw, rh, v)
        })
        .collect();

    let mut img = GrayImage::new(w, h);
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            let (wx, wy) = (x - dx, y - dy);
            let mut v = 128u8;
            for &(x0, y0, rw, rh, val) in &rects {
                if wx >= x0 && wx < x0 + rw && wy >= y0 && wy < y0 + rh {
                    v = val;
                }
            }
            img.put_pixel(x as u32, y as u32, Luma([v]));
        }
    }
    blur_gray(&img, 1.0)
}

/// Color version of [`textured_scene`].
pub(crate) fn textured_frame(w: u32, h: u32, dx: i32, dy: i32) -> RgbImage {
    image::DynamicImage::ImageLuma8(textured_scene(w, h, dx, dy)).to_rgb8()
}

/// Gaussian-blur a `GrayImage` via `imageproc`.
pub(crate) fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    let f = crate::features::gray_to_f32(img);
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        Luma([blurred.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}
