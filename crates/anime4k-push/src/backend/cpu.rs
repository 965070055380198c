//! CPU emulation of the compute kernels
//!
//! Every dispatch evaluates the kernel's reference implementation once per
//! destination texel, rows in parallel via rayon. Dispatches complete before
//! returning, so [`CpuBackend::join`] has nothing left to wait for.

use super::{ComputeBackend, TextureHandle};
use crate::{
    config::KernelConstants,
    error::{Anime4KError, Anime4KResult},
    kernels::{Kernel, TexelGrid},
};
use rayon::prelude::*;
use std::collections::HashMap;

/// Largest grid edge accepted by default, matching common GPU limits
pub const DEFAULT_MAX_DIMENSION: u32 = 16384;

/// Deterministic host-side backend
#[derive(Debug)]
pub struct CpuBackend {
    /// Live grids by handle
    grids: HashMap<TextureHandle, TexelGrid>,
    /// Next handle to hand out
    next_id: u32,
    /// Largest accepted width or height
    max_dimension: u32,
    /// Dedicated worker pool; the global rayon pool is used when `None`
    pool: Option<rayon::ThreadPool>,
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuBackend {
    /// Creates a backend running on rayon's global pool
    pub fn new() -> Self {
        Self {
            grids: HashMap::new(),
            next_id: 0,
            max_dimension: DEFAULT_MAX_DIMENSION,
            pool: None,
        }
    }

    /// Creates a backend with a dedicated pool of `threads` workers
    ///
    /// # Errors
    /// `Resource` if the worker pool cannot be spawned
    pub fn with_threads(threads: usize) -> Anime4KResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("anime4k-cpu-{i}"))
            .build()
            .map_err(|e| Anime4KError::resource("thread pool", format!("failed to build rayon thread pool: {e}")))?;

        Ok(Self { pool: Some(pool), ..Self::new() })
    }

    /// Overrides the largest accepted grid edge
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    /// Number of grids currently allocated
    pub fn live_grids(&self) -> usize {
        self.grids.len()
    }

    fn grid(&self, stage: &str, handle: TextureHandle) -> Anime4KResult<&TexelGrid> {
        self.grids.get(&handle).ok_or_else(|| Anime4KError::resource(stage, format!("unknown texture {handle}")))
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn allocate_grid(&mut self, width: u32, height: u32) -> Anime4KResult<TextureHandle> {
        if width == 0 || height == 0 || width > self.max_dimension || height > self.max_dimension {
            return Err(Anime4KError::resource(
                "allocate",
                format!("grid {width}x{height} is outside 1..={} per edge", self.max_dimension),
            ));
        }

        let len = width as usize * height as usize * 4;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| Anime4KError::resource("allocate", format!("cannot reserve {len} bytes: {e}")))?;
        data.resize(len, 0);

        let handle = TextureHandle(self.next_id);
        self.next_id += 1;
        // Length matches by construction
        if let Some(grid) = TexelGrid::from_raw(width, height, data) {
            self.grids.insert(handle, grid);
        }
        Ok(handle)
    }

    fn upload_data(&mut self, handle: TextureHandle, data: &[u8], bytes_per_row: u32) -> Anime4KResult<()> {
        let grid = self
            .grids
            .get_mut(&handle)
            .ok_or_else(|| Anime4KError::resource("upload", format!("unknown texture {handle}")))?;
        let row_len = grid.width() as usize * 4;
        let rows = grid.as_bytes_mut().chunks_exact_mut(row_len);
        for (dst, src) in rows.zip(data.chunks(bytes_per_row as usize)) {
            dst.copy_from_slice(&src[..row_len]);
        }
        Ok(())
    }

    fn download_data(&mut self, handle: TextureHandle, bytes_per_row: u32) -> Anime4KResult<Vec<u8>> {
        let grid = self.grid("download", handle)?;
        let row_len = grid.width() as usize * 4;
        let mut buffer = vec![0; bytes_per_row as usize * grid.height() as usize];
        for (dst, src) in buffer.chunks_exact_mut(bytes_per_row as usize).zip(grid.as_bytes().chunks_exact(row_len)) {
            dst[..row_len].copy_from_slice(src);
        }
        Ok(buffer)
    }

    fn dispatch_kernel(&mut self, pass: &str, kernel: Kernel, inputs: &[TextureHandle], output: TextureHandle, constants: &KernelConstants) -> Anime4KResult<()> {
        if inputs.len() != kernel.input_count() {
            return Err(Anime4KError::kernel_build(
                pass,
                format!("{kernel} takes {} inputs, {} bound", kernel.input_count(), inputs.len()),
            ));
        }
        if inputs.contains(&output) {
            return Err(Anime4KError::dispatch(pass, format!("texture {output} is bound as both input and output")));
        }

        let (width, height) = {
            let target = self.grids.get(&output).ok_or_else(|| Anime4KError::dispatch(pass, format!("unknown output texture {output}")))?;
            (target.width(), target.height())
        };

        let input_grids = inputs
            .iter()
            .map(|handle| self.grids.get(handle).ok_or_else(|| Anime4KError::dispatch(pass, format!("unknown input texture {handle}"))))
            .collect::<Result<Vec<_>, _>>()?;

        let mut data = vec![0u8; width as usize * height as usize * 4];
        let mut fill = || {
            data.par_chunks_mut(width as usize * 4).enumerate().for_each(|(y, row)| {
                for (x, texel) in row.chunks_exact_mut(4).enumerate() {
                    texel.copy_from_slice(&kernel.texel(&input_grids, constants, x as u32, y as u32));
                }
            })
        };
        match &self.pool {
            Some(pool) => pool.install(fill),
            None => fill(),
        }

        let grid = TexelGrid::from_raw(width, height, data).ok_or_else(|| Anime4KError::dispatch(pass, "output size changed during dispatch"))?;
        self.grids.insert(output, grid);
        Ok(())
    }

    fn join(&mut self) -> Anime4KResult<()> {
        Ok(())
    }

    fn discard_pending(&mut self) {}

    fn release_grid(&mut self, handle: TextureHandle) {
        self.grids.remove(&handle);
    }
}
