use std::error::Error;

use vstab::{ImageSequenceSink, ImageSequenceSource, StabilizeConfig, Stabilizer};

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <frames_dir> <out_dir> [report.json]", args[0]);
        std::process::exit(2);
    }

    let mut source = ImageSequenceSource::open(&args[1])?;
    let stabilizer = Stabilizer::new(StabilizeConfig::default())?;
    let out_dir = args[2].clone();
    let (_sink, report) = stabilizer.stabilize(&mut source, |g| {
        ImageSequenceSink::create(&out_dir, g.width, g.height)
    })?;

    println!(
        "Decoded {} frames, wrote {} ({} skipped, {} motion fallbacks).",
        report.trajectory.frames_decoded,
        report.frames_written,
        report.trajectory.skipped.len() + report.render_skipped.len(),
        report.trajectory.fallbacks.len()
    );

    if let Some(out_path) = args.get(3) {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
