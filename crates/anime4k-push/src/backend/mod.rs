//! Compute backends
//!
//! The pipeline talks to the hardware only through [`ComputeBackend`], a narrow
//! capability interface over 2D RGBA8 grids and kernel dispatch. Two
//! implementations are provided: [`WgpuBackend`] runs the WGSL kernels on a GPU,
//! [`CpuBackend`] emulates them with rayon for deterministic host-side runs.

mod cpu;
mod wgpu_backend;

pub use cpu::CpuBackend;
pub use wgpu_backend::WgpuBackend;

use crate::{config::KernelConstants, error::Anime4KResult, kernels::Kernel};

/// Opaque identifier of a grid owned by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub(crate) u32);

impl std::fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capability interface implemented by every compute backend
///
/// Implementations may defer the work of [`dispatch_kernel`](Self::dispatch_kernel)
/// until [`join`](Self::join); callers must join before downloading results.
pub trait ComputeBackend {
    /// Human-readable backend name for logging
    fn name(&self) -> &str;

    /// Reserves a new RGBA8 grid of the given size
    ///
    /// # Errors
    /// `Resource` if the grid cannot be reserved
    fn allocate_grid(&mut self, width: u32, height: u32) -> Anime4KResult<TextureHandle>;

    /// Copies a row-major RGBA8 buffer over the full extent of a grid
    ///
    /// The caller guarantees `data.len() == bytes_per_row * height` and
    /// `bytes_per_row >= width * 4`.
    fn upload_data(&mut self, handle: TextureHandle, data: &[u8], bytes_per_row: u32) -> Anime4KResult<()>;

    /// Reads the full extent of a grid back into a row-major buffer
    fn download_data(&mut self, handle: TextureHandle, bytes_per_row: u32) -> Anime4KResult<Vec<u8>>;

    /// Runs `kernel` once per texel of `output`
    ///
    /// # Arguments
    /// * `pass` - Name of the pass, used in errors and labels
    /// * `kernel` - Compute program to run
    /// * `inputs` - Input grids in binding order
    /// * `output` - Grid written by this dispatch
    /// * `constants` - Constant bundle shared by all passes of the run
    fn dispatch_kernel(&mut self, pass: &str, kernel: Kernel, inputs: &[TextureHandle], output: TextureHandle, constants: &KernelConstants) -> Anime4KResult<()>;

    /// Blocks until every previously dispatched kernel has completed
    fn join(&mut self) -> Anime4KResult<()>;

    /// Drops dispatches recorded since the last join without running them
    ///
    /// Called when a run is abandoned, before its grids are released, so no
    /// deferred work can reach a released grid later.
    fn discard_pending(&mut self);

    /// Frees a grid; unknown handles are ignored
    fn release_grid(&mut self, handle: TextureHandle);
}
