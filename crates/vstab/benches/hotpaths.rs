use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vstab::features::{good_features_to_track, GoodFeaturesConfig, PyramidalLkTracker};
use vstab::trajectory::{accumulate, smooth_trajectory, SmoothingConfig};
use vstab::Transform;

/// Random rectangles drawn over a grey background, shifted by `(dx, dy)`.
fn textured(w: u32, h: u32, dx: i32, dy: i32) -> GrayImage {
    let mut rng = StdRng::seed_from_u64(11);
    let rects: Vec<(i32, i32, i32, i32, u8)> = (0..(w * h / 600))
        .map(|_| {
            (
                rng.gen_range(-40..w as i32 + 40),
                rng.gen_range(-40..h as i32 + 40),
                rng.gen_range(10..40),
                rng.gen_range(10..40),
                rng.gen_range(20u8..236),
            )
        })
        .collect();
    GrayImage::from_fn(w, h, |x, y| {
        let (wx, wy) = (x as i32 - dx, y as i32 - dy);
        let mut v = 128;
        for &(x0, y0, rw, rh, val) in &rects {
            if wx >= x0 && wx < x0 + rw && wy >= y0 && wy < y0 + rh {
                v = val;
            }
        }
        Luma([v])
    })
}

fn bench_detector(c: &mut Criterion) {
    let img = textured(640, 360, 0, 0);
    let config = GoodFeaturesConfig::default();
    c.bench_function("good_features_640x360", |b| {
        b.iter(|| good_features_to_track(black_box(&img), black_box(&config)))
    });
}

fn bench_tracker(c: &mut Criterion) {
    let prev = textured(640, 360, 0, 0);
    let next = textured(640, 360, 3, -2);
    let points: Vec<[f32; 2]> = good_features_to_track(&prev, &GoodFeaturesConfig::default())
        .iter()
        .map(|c| c.position())
        .collect();
    let tracker = PyramidalLkTracker::default();
    c.bench_function("pyramidal_lk_640x360", |b| {
        b.iter(|| tracker.track(black_box(&prev), black_box(&next), black_box(&points)))
    });
}

fn bench_smoother(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let steps: Vec<(usize, Transform)> = (1..=1800)
        .map(|i| {
            let tx = rng.gen_range(-2.0..2.0);
            let ty = rng.gen_range(-2.0..2.0);
            (i, Transform::translation(tx, ty))
        })
        .collect();
    let traj = accumulate(steps).unwrap();
    let config = SmoothingConfig::default();
    c.bench_function("smooth_trajectory_1800", |b| {
        b.iter(|| smooth_trajectory(black_box(&traj), black_box(&config)))
    });
}

criterion_group!(benches, bench_detector, bench_tracker, bench_smoother);
criterion_main!(benches);
