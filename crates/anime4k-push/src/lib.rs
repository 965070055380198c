//! Anime4K v0.9 push upscaler on wgpu compute shaders
//!
//! This crate upscales a single RGBA8 image and sharpens its line art with the
//! classic Anime4K "push" pipeline: a bilinear upscale, a luminance pass, a
//! thin-line push, a second luminance pass, a Sobel gradient and a final
//! gradient-controlled blend. Every pass is a per-texel compute kernel that runs
//! either on the GPU through wgpu ([`WgpuBackend`]) or on the CPU through rayon
//! ([`CpuBackend`]).
//!
//! ```no_run
//! use anime4k_push::{CpuBackend, Image, UpscaleOptions, upscale};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Image::from_dynamic_image(&image::open("input.png")?);
//! let output = upscale(&mut CpuBackend::new(), &source, &UpscaleOptions::default())?;
//! output.to_rgba_image()?.save("output.png")?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod bitmap;
pub mod config;
pub mod error;
pub mod executable_pipeline;
pub mod kernels;
mod pipeline_executor;
pub mod texture_store;

pub use backend::{ComputeBackend, CpuBackend, TextureHandle, WgpuBackend};
pub use bitmap::{AlphaMode, Image};
pub use config::{KernelConstants, PipelineConfig, UpscaleOptions};
pub use error::{Anime4KError, Anime4KResult, ConfigError};
pub use executable_pipeline::{ExecutablePipeline, PUSH_PIPELINE, PassSpec, PipelineValidationError, TextureSlot};
pub use kernels::Kernel;
pub use pipeline_executor::{PassScheduler, PipelineOutput};

/// Upscales `source` with the push pipeline on `backend`
///
/// Shorthand for [`PassScheduler::new`] followed by [`PassScheduler::run`],
/// discarding intermediates.
pub fn upscale<B: ComputeBackend + ?Sized>(backend: &mut B, source: &Image, options: &UpscaleOptions) -> Anime4KResult<Image> {
    PassScheduler::new(*options).run(backend, source).map(|output| output.image)
}
