//! Pass scheduling for one upscaling run
//!
//! [`PassScheduler`] drives a validated [`ExecutablePipeline`] on a
//! [`ComputeBackend`]: it decodes the source image, derives the run's
//! [`PipelineConfig`], allocates one grid per texture slot, dispatches the
//! passes in order, joins once and reads the result (and optionally every
//! intermediate) back into [`Image`]s. Grids are owned by a [`TextureStore`]
//! scoped to the run, so they are released however the run ends.

use crate::{
    backend::{ComputeBackend, TextureHandle},
    bitmap::{self, Image},
    config::{PipelineConfig, UpscaleOptions},
    error::{Anime4KError, Anime4KResult},
    executable_pipeline::{ExecutablePipeline, TextureSlot},
    texture_store::TextureStore,
};
use std::collections::BTreeMap;

/// Images produced by one run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The upscaled image
    pub image: Image,
    /// Every intermediate texture in production order, if capture was requested
    pub intermediates: Vec<(TextureSlot, Image)>,
}

/// Runs a pass graph with fixed options
#[derive(Debug, Clone)]
pub struct PassScheduler {
    pipeline: ExecutablePipeline,
    options: UpscaleOptions,
}

impl PassScheduler {
    /// Creates a scheduler for the push pipeline
    pub fn new(options: UpscaleOptions) -> Self {
        Self::with_pipeline(ExecutablePipeline::push(), options)
    }

    /// Creates a scheduler for a custom, already validated pass graph
    pub fn with_pipeline(pipeline: ExecutablePipeline, options: UpscaleOptions) -> Self {
        Self { pipeline, options }
    }

    /// Upscales `source` on `backend`
    ///
    /// # Returns
    /// The final image plus the captured intermediates, or the first error raised
    /// by any stage. No partial output is produced.
    #[tracing::instrument(skip_all, fields(backend = %backend.name(), width = source.width(), height = source.height()))]
    pub fn run<B: ComputeBackend + ?Sized>(&self, backend: &mut B, source: &Image) -> Anime4KResult<PipelineOutput> {
        let started = std::time::Instant::now();

        let pixels = bitmap::decode(source)?;
        let config = PipelineConfig::new(source.width(), source.height(), &self.options)?;
        let constants = config.kernel_constants();
        let (dst_width, dst_height) = config.dst_size();
        tracing::info!(
            dst_width,
            dst_height,
            scale_factor = config.scale_factor,
            bold_strength = config.bold_strength,
            blur_threshold = config.blur_threshold,
            "starting push pipeline"
        );

        let mut store = TextureStore::new(backend);

        let mut handles = BTreeMap::new();
        for slot in self.pipeline.slots() {
            let (width, height) = if slot == TextureSlot::Source { config.src_size() } else { config.dst_size() };
            handles.insert(slot, store.allocate(width, height)?);
        }
        let handle = |slot: TextureSlot| -> Anime4KResult<TextureHandle> {
            handles
                .get(&slot)
                .copied()
                .ok_or_else(|| Anime4KError::resource("schedule", format!("no texture allocated for slot '{slot}'")))
        };

        let src_bytes_per_row = u32::try_from(source.bytes_per_row())
            .map_err(|_| Anime4KError::resource("upload", format!("bytes per row {} exceeds the backend's stride range", source.bytes_per_row())))?;
        store.upload(handle(TextureSlot::Source)?, &pixels, src_bytes_per_row)?;

        for pass in self.pipeline.passes() {
            let inputs = pass.inputs.iter().map(|slot| handle(*slot)).collect::<Result<Vec<_>, _>>()?;
            store.dispatch(pass.name, pass.kernel, &inputs, handle(pass.output)?, &constants)?;
        }
        store.join()?;

        let bytes_per_row = config.dst_bytes_per_row();
        let mut read_back = |slot: TextureSlot| -> Anime4KResult<Image> {
            let buffer = store.download(handle(slot)?, bytes_per_row)?;
            bitmap::encode(buffer, dst_width, dst_height, bytes_per_row as usize)
        };

        let intermediates = if self.options.capture_intermediates {
            self.pipeline
                .intermediate_slots()
                .into_iter()
                .map(|slot| Ok((slot, read_back(slot)?)))
                .collect::<Anime4KResult<Vec<_>>>()?
        } else {
            Vec::new()
        };
        let image = read_back(TextureSlot::Result)?;

        tracing::info!(elapsed = ?started.elapsed(), intermediates = intermediates.len(), "push pipeline finished");
        Ok(PipelineOutput { image, intermediates })
    }
}
