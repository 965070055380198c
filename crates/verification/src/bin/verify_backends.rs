//! Backend agreement verification binary
//!
//! Runs the push pipeline on the CPU and GPU backends with intermediate capture
//! enabled and compares every texture the two runs produced.

use anime4k_push::{CpuBackend, Image, PassScheduler, UpscaleOptions, WgpuBackend};
use anime4k_push_verification::compare::{CompareResult, compare_images};

/// Default per-channel tolerance between backends
const DEFAULT_TOLERANCE: u8 = 2;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <input_image> [tolerance]", args[0]);
        return Ok(());
    }

    let input_path = &args[1];
    let tolerance = match args.get(2) {
        Some(value) => value.parse().map_err(|e| format!("Invalid tolerance {value}: {e}"))?,
        None => DEFAULT_TOLERANCE,
    };
    let input_image = image::open(input_path).map_err(|e| format!("Failed to open input image: {e}"))?;
    let source = Image::from_dynamic_image(&input_image);

    let scheduler = PassScheduler::new(UpscaleOptions {
        capture_intermediates: true,
        ..UpscaleOptions::default()
    });

    let started = std::time::Instant::now();
    let cpu_output = scheduler.run(&mut CpuBackend::new(), &source)?;
    let cpu_duration = started.elapsed();

    let mut gpu = WgpuBackend::new().await?;
    let started = std::time::Instant::now();
    let gpu_output = scheduler.run(&mut gpu, &source)?;
    let gpu_duration = started.elapsed();

    let cpu_textures = cpu_output.intermediates.iter().map(|(slot, image)| (slot.name(), image)).chain([("result", &cpu_output.image)]);
    let gpu_textures = gpu_output.intermediates.iter().map(|(_, image)| image).chain([&gpu_output.image]);

    let mut failures = 0;
    for ((name, cpu_image), gpu_image) in cpu_textures.zip(gpu_textures) {
        match compare_images(cpu_image, gpu_image, tolerance) {
            CompareResult::Match => println!("✓ {name}: outputs match"),
            CompareResult::WithinTolerance { max_difference } => {
                println!("✓ {name}: outputs match within {max_difference}")
            }
            CompareResult::DimensionMismatch {
                reference_dimensions,
                candidate_dimensions,
            } => {
                failures += 1;
                eprintln!("✗ {name}: dimension mismatch (CPU: {reference_dimensions:?}, GPU: {candidate_dimensions:?})");
            }
            CompareResult::PixelMismatch {
                max_difference,
                mismatched_texels,
            } => {
                failures += 1;
                eprintln!("✗ {name}: {mismatched_texels} texels differ by more than {tolerance} (max per channel: {max_difference:?})");
            }
        }
    }

    println!("CPU: {cpu_duration:.2?}, GPU: {gpu_duration:.2?}");
    if failures > 0 {
        return Err(format!("{failures} textures disagree between backends").into());
    }

    Ok(())
}
