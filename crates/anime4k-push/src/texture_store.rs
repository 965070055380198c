//! Scoped ownership of the grids used by one pipeline run
//!
//! [`TextureStore`] sits between the scheduler and a [`ComputeBackend`]. It
//! checks every transfer and dispatch against the grid it touches, enforces the
//! single-writer rule (a grid is written exactly once, by an upload or by one
//! pass, and only read afterwards) and releases every grid it allocated when it
//! is dropped, whether the run succeeded or not.

use crate::{
    backend::{ComputeBackend, TextureHandle},
    config::KernelConstants,
    error::{Anime4KError, Anime4KResult},
    kernels::Kernel,
};
use std::collections::BTreeMap;

/// Bookkeeping for one allocated grid
#[derive(Debug, Clone, Copy)]
struct GridState {
    width: u32,
    height: u32,
    written: bool,
}

/// Grids allocated for one run, released on drop
pub struct TextureStore<'a, B: ComputeBackend + ?Sized> {
    backend: &'a mut B,
    grids: BTreeMap<TextureHandle, GridState>,
    /// Whether dispatches were issued since the last successful join
    unjoined: bool,
}

impl<'a, B: ComputeBackend + ?Sized> TextureStore<'a, B> {
    /// Creates an empty store on top of `backend`
    pub fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            grids: BTreeMap::new(),
            unjoined: false,
        }
    }

    /// Number of grids currently held
    pub fn len(&self) -> usize {
        self.grids.len()
    }

    /// Whether the store holds no grids
    pub fn is_empty(&self) -> bool {
        self.grids.is_empty()
    }

    /// Dimensions of a grid held by this store
    pub fn size(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.grids.get(&handle).map(|grid| (grid.width, grid.height))
    }

    fn state(&self, stage: &str, handle: TextureHandle) -> Anime4KResult<GridState> {
        self.grids
            .get(&handle)
            .copied()
            .ok_or_else(|| Anime4KError::resource(stage, format!("texture {handle} is not owned by this store")))
    }

    /// Allocates an unwritten RGBA8 grid
    ///
    /// # Errors
    /// `Resource` if the backend cannot reserve a grid of this size
    pub fn allocate(&mut self, width: u32, height: u32) -> Anime4KResult<TextureHandle> {
        let handle = self.backend.allocate_grid(width, height)?;
        tracing::debug!(%handle, width, height, backend = self.backend.name(), "allocated texture");
        self.grids.insert(
            handle,
            GridState {
                width,
                height,
                written: false,
            },
        );
        Ok(handle)
    }

    /// Fills a grid from a row-major RGBA8 buffer
    ///
    /// # Errors
    /// `Resource` if the buffer geometry does not match the grid,
    /// `Dispatch` if the grid was already written
    pub fn upload(&mut self, handle: TextureHandle, data: &[u8], bytes_per_row: u32) -> Anime4KResult<()> {
        let state = self.state("upload", handle)?;
        let row_len = u64::from(state.width) * 4;
        if u64::from(bytes_per_row) < row_len {
            return Err(Anime4KError::resource("upload", format!("stride {bytes_per_row} is shorter than a {}-texel row", state.width)));
        }
        let expected = u64::from(bytes_per_row) * u64::from(state.height);
        if data.len() as u64 != expected {
            return Err(Anime4KError::resource("upload", format!("buffer holds {} bytes, grid {handle} needs {expected}", data.len())));
        }
        if state.written {
            return Err(Anime4KError::dispatch("upload", format!("texture {handle} was already written")));
        }

        self.backend.upload_data(handle, data, bytes_per_row)?;
        self.mark_written(handle);
        Ok(())
    }

    /// Reads a written grid back into a row-major buffer with the given stride
    ///
    /// Dispatches recorded so far must have been joined with [`TextureStore::join`].
    ///
    /// # Errors
    /// `Resource` if the stride is too short or the grid was never written
    pub fn download(&mut self, handle: TextureHandle, bytes_per_row: u32) -> Anime4KResult<Vec<u8>> {
        let state = self.state("download", handle)?;
        if u64::from(bytes_per_row) < u64::from(state.width) * 4 {
            return Err(Anime4KError::resource("download", format!("stride {bytes_per_row} is shorter than a {}-texel row", state.width)));
        }
        if !state.written {
            return Err(Anime4KError::resource("download", format!("texture {handle} was never written")));
        }
        self.backend.download_data(handle, bytes_per_row)
    }

    /// Dispatches `kernel` for one pass
    ///
    /// # Arguments
    /// * `pass` - Name of the pass, reported in errors
    /// * `kernel` - Compute program to run
    /// * `inputs` - Written grids read by the pass, in binding order
    /// * `output` - Unwritten grid produced by the pass
    /// * `constants` - The run's constant bundle
    ///
    /// # Errors
    /// `KernelBuild` if the number of bound slots does not match the kernel,
    /// `Dispatch` if an input is unwritten or the output was already written
    pub fn dispatch(&mut self, pass: &str, kernel: Kernel, inputs: &[TextureHandle], output: TextureHandle, constants: &KernelConstants) -> Anime4KResult<()> {
        if inputs.len() + 1 != kernel.slot_count() {
            return Err(Anime4KError::kernel_build(
                pass,
                format!("{kernel} binds {} texture slots, {} given", kernel.slot_count(), inputs.len() + 1),
            ));
        }

        for &input in inputs {
            let state = self
                .grids
                .get(&input)
                .ok_or_else(|| Anime4KError::dispatch(pass, format!("input texture {input} is not owned by this store")))?;
            if !state.written {
                return Err(Anime4KError::dispatch(pass, format!("input texture {input} is read before it is written")));
            }
        }

        let target = self
            .grids
            .get(&output)
            .ok_or_else(|| Anime4KError::dispatch(pass, format!("output texture {output} is not owned by this store")))?;
        if target.written {
            return Err(Anime4KError::dispatch(pass, format!("output texture {output} was already written")));
        }

        self.unjoined = true;
        self.backend.dispatch_kernel(pass, kernel, inputs, output, constants)?;
        self.mark_written(output);
        tracing::debug!(pass, %kernel, %output, "dispatched pass");
        Ok(())
    }

    /// Waits for every dispatched pass to finish
    pub fn join(&mut self) -> Anime4KResult<()> {
        self.backend.join()?;
        self.unjoined = false;
        Ok(())
    }

    fn mark_written(&mut self, handle: TextureHandle) {
        if let Some(state) = self.grids.get_mut(&handle) {
            state.written = true;
        }
    }
}

impl<B: ComputeBackend + ?Sized> Drop for TextureStore<'_, B> {
    fn drop(&mut self) {
        if self.unjoined {
            self.backend.discard_pending();
        }
        for handle in std::mem::take(&mut self.grids).into_keys() {
            self.backend.release_grid(handle);
        }
    }
}
