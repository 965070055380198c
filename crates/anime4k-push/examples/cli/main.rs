//! Anime4K push CLI image upscaler
//!
//! Upscales one image with the push pipeline on the GPU (wgpu) or on the CPU
//! (rayon), optionally writing every intermediate texture next to the result.
//!
//! # Usage
//! ```bash
//! cargo run --example cli -- input.png output.png --scale-factor 2 --bold 10 --blur 0.0001
//! cargo run --example cli -- input.png output.png --backend cpu --dump-intermediates dumps/
//! ```

use anime4k_push::{ComputeBackend, CpuBackend, Image, PassScheduler, UpscaleOptions, WgpuBackend};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// wgpu compute shaders
    Gpu,
    /// rayon emulation of the kernels
    Cpu,
}

/// Command-line arguments for the push upscaler
#[derive(Parser)]
#[command(version, about = "CLI tool for upscaling images with the Anime4K push pipeline")]
struct Args {
    /// Input image file path
    input: PathBuf,

    /// Output image file path
    output: PathBuf,

    /// YAML options file; explicit flags override its values
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Output size relative to input (e.g., 2.0 for 2x upscaling)
    #[arg(long, short)]
    scale_factor: Option<f32>,

    /// Push strength; 0 disables line thinning
    #[arg(long, short)]
    bold: Option<f32>,

    /// Gradient threshold in [0, 1] below which the plain upscale is kept
    #[arg(long)]
    blur: Option<f32>,

    /// Compute backend
    #[arg(long, value_enum, default_value_t = Backend::Gpu)]
    backend: Backend,

    /// CPU worker threads (defaults to rayon's global pool)
    #[arg(long)]
    threads: Option<usize>,

    /// Directory receiving every intermediate texture as PNG
    #[arg(long)]
    dump_intermediates: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => UpscaleOptions::from_file(path)?,
        None => UpscaleOptions::default(),
    };
    if let Some(scale_factor) = args.scale_factor {
        options.scale_factor = scale_factor;
    }
    if let Some(bold) = args.bold {
        options.bold_strength = bold;
    }
    if let Some(blur) = args.blur {
        options.blur_threshold = blur;
    }
    options.capture_intermediates |= args.dump_intermediates.is_some();

    tracing::info!("Loading image from: {}", args.input.display());
    let source = Image::from_dynamic_image(&image::open(&args.input)?);

    let mut backend: Box<dyn ComputeBackend> = match (args.backend, args.threads) {
        (Backend::Gpu, _) => Box::new(WgpuBackend::new_blocking()?),
        (Backend::Cpu, Some(threads)) => Box::new(CpuBackend::with_threads(threads)?),
        (Backend::Cpu, None) => Box::new(CpuBackend::new()),
    };

    let output = PassScheduler::new(options).run(backend.as_mut(), &source)?;

    if let Some(dir) = &args.dump_intermediates {
        std::fs::create_dir_all(dir)?;
        for (index, (slot, image)) in output.intermediates.iter().enumerate() {
            let path = dir.join(format!("{index}_{slot}.png"));
            image.to_rgba_image()?.save(&path)?;
            tracing::info!("Wrote {}", path.display());
        }
    }

    output.image.to_rgba_image()?.save(&args.output)?;
    tracing::info!(
        "Upscaled {}x{} to {}x{}, saved to {}",
        source.width(),
        source.height(),
        output.image.width(),
        output.image.height(),
        args.output.display()
    );

    Ok(())
}
