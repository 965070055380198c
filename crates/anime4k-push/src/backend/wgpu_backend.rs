//! GPU backend running the WGSL kernels through wgpu
//!
//! Every grid is an `Rgba8Unorm` texture usable both as a sampled input and as a
//! write-only storage output. Kernel dispatches are recorded into a single
//! command encoder and only submitted on [`join`](ComputeBackend::join), so a
//! whole pipeline run costs one queue submission.

use super::{ComputeBackend, TextureHandle};
use crate::{
    config::KernelConstants,
    error::{Anime4KError, Anime4KResult},
    kernels::Kernel,
};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

/// Storage format of every grid
const GRID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Usage flags of every grid: sampled input, storage output, upload and readback
const GRID_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// Edge length of a compute workgroup, matching `@workgroup_size(8, 8, 1)`
const WORKGROUP_SIZE: u32 = 8;

/// A kernel compiled for this device
#[derive(Debug)]
struct CompiledKernel {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

/// wgpu implementation of [`ComputeBackend`]
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureHandle, wgpu::Texture>,
    /// Kernels compiled so far; built lazily on first dispatch
    kernels: HashMap<Kernel, CompiledKernel>,
    /// Encoder collecting dispatches since the last submission
    encoder: Option<wgpu::CommandEncoder>,
    /// Passes recorded into `encoder`, for error reporting
    pending_passes: Vec<String>,
    next_id: u32,
}

impl WgpuBackend {
    /// Requests a high-performance adapter and device
    ///
    /// # Errors
    /// `Resource` if no adapter is available or the device request fails
    pub async fn new() -> Anime4KResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Anime4KError::resource("device", format!("no compatible GPU adapter: {e}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("anime4k-push"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| Anime4KError::resource("device", format!("device request failed: {e}")))?;

        let info = adapter.get_info();
        tracing::info!(adapter = %info.name, backend = ?info.backend, "GPU backend ready");

        Ok(Self::from_device(device, queue))
    }

    /// Blocking variant of [`WgpuBackend::new`]
    pub fn new_blocking() -> Anime4KResult<Self> {
        pollster::block_on(Self::new())
    }

    /// Wraps an existing device, e.g. one shared with a renderer
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::new(),
            kernels: HashMap::new(),
            encoder: None,
            pending_passes: Vec::new(),
            next_id: 0,
        }
    }

    fn texture(&self, stage: &str, handle: TextureHandle) -> Anime4KResult<&wgpu::Texture> {
        self.textures
            .get(&handle)
            .ok_or_else(|| Anime4KError::resource(stage, format!("unknown texture {handle}")))
    }

    /// Pops the innermost error scope, turning a captured error into `Err(reason)`
    fn pop_error_scope(&self) -> Result<(), String> {
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(error.to_string()),
            None => Ok(()),
        }
    }

    /// Compiles `kernel` unless it is already cached
    fn ensure_kernel(&mut self, pass: &str, kernel: Kernel) -> Anime4KResult<()> {
        if self.kernels.contains_key(&kernel) {
            return Ok(());
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kernel.name()),
            source: wgpu::ShaderSource::Wgsl(kernel.shader().into()),
        });

        // Uniform constants at 0, inputs at 1..=N, storage output last
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<KernelConstants>() as u64),
            },
            count: None,
        }];
        for binding in 1..=kernel.input_count() as u32 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: kernel.input_count() as u32 + 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: GRID_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        });

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(kernel.name()),
            entries: &entries,
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(kernel.name()),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kernel.name()),
            layout: Some(&pipeline_layout),
            module: &shader_module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        self.pop_error_scope().map_err(|reason| Anime4KError::kernel_build(pass, reason))?;

        tracing::debug!(kernel = kernel.name(), "compiled compute pipeline");
        self.kernels.insert(kernel, CompiledKernel { pipeline, bind_group_layout });
        Ok(())
    }

    /// Submits recorded dispatches and waits for the device to go idle
    fn flush(&mut self) -> Anime4KResult<()> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };
        let passes = std::mem::take(&mut self.pending_passes).join(", ");

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.queue.submit(std::iter::once(encoder.finish()));
        let polled = self.device.poll(wgpu::PollType::Wait);
        self.pop_error_scope().map_err(|reason| Anime4KError::dispatch(passes.as_str(), reason))?;
        polled.map_err(|e| Anime4KError::dispatch(passes.as_str(), e.to_string()))?;
        Ok(())
    }
}

impl ComputeBackend for WgpuBackend {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn allocate_grid(&mut self, width: u32, height: u32) -> Anime4KResult<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(Anime4KError::resource("allocate", format!("grid {width}x{height} is outside 1..={max} per edge")));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("anime4k grid"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: GRID_FORMAT,
            usage: GRID_USAGE,
            view_formats: &[],
        });
        self.pop_error_scope().map_err(|reason| Anime4KError::resource("allocate", reason))?;

        let handle = TextureHandle(self.next_id);
        self.next_id += 1;
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn upload_data(&mut self, handle: TextureHandle, data: &[u8], bytes_per_row: u32) -> Anime4KResult<()> {
        // Keep queue writes ordered after earlier dispatches
        self.flush()?;
        let texture = self.texture("upload", handle)?;
        let size = texture.size();

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(size.height),
            },
            size,
        );
        Ok(())
    }

    fn download_data(&mut self, handle: TextureHandle, bytes_per_row: u32) -> Anime4KResult<Vec<u8>> {
        self.flush()?;
        let texture = self.texture("download", handle)?;
        let wgpu::Extent3d { width, height, .. } = texture.size();

        // Buffer copies need rows aligned to 256 bytes
        let row_len = width * 4;
        let padded_row_len = row_len.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(padded_row_len) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_len),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |v| {
            // The receiver only disappears if the readback was abandoned
            let _ = sender.send(v);
        });

        let polled = self.device.poll(wgpu::PollType::Wait);
        self.pop_error_scope().map_err(|reason| Anime4KError::resource("download", reason))?;
        polled.map_err(|e| Anime4KError::resource("download", e.to_string()))?;
        pollster::block_on(receiver.receive())
            .ok_or_else(|| Anime4KError::resource("download", "map callback dropped"))?
            .map_err(|e| Anime4KError::resource("download", e.to_string()))?;

        let mapped = buffer_slice.get_mapped_range();
        let mut output = vec![0; bytes_per_row as usize * height as usize];
        for (dst, src) in output.chunks_exact_mut(bytes_per_row as usize).zip(mapped.chunks_exact(padded_row_len as usize)) {
            dst[..row_len as usize].copy_from_slice(&src[..row_len as usize]);
        }
        drop(mapped);
        buffer.unmap();

        Ok(output)
    }

    #[tracing::instrument(level = "debug", skip(self, inputs, constants), fields(backend = "wgpu"))]
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

        self.ensure_kernel(pass, kernel)?;

        let lookup = |handle: &TextureHandle| {
            self.textures
                .get(handle)
                .map(|texture| texture.create_view(&wgpu::TextureViewDescriptor::default()))
                .ok_or_else(|| Anime4KError::dispatch(pass, format!("unknown texture {handle}")))
        };
        let input_views = inputs.iter().map(lookup).collect::<Result<Vec<_>, _>>()?;
        let output_view = lookup(&output)?;
        let (width, height) = {
            let size = self.texture("dispatch", output)?.size();
            (size.width, size.height)
        };

        let compiled = self
            .kernels
            .get(&kernel)
            .ok_or_else(|| Anime4KError::kernel_build(pass, "pipeline missing after compilation"))?;

        let constants_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(pass),
            contents: bytemuck::bytes_of(constants),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: constants_buffer.as_entire_binding(),
        }];
        for (binding, view) in (1u32..).zip(&input_views) {
            entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: inputs.len() as u32 + 1,
            resource: wgpu::BindingResource::TextureView(&output_view),
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(pass),
            layout: &compiled.bind_group_layout,
            entries: &entries,
        });
        self.pop_error_scope().map_err(|reason| Anime4KError::dispatch(pass, reason))?;

        let device = &self.device;
        let encoder = self
            .encoder
            .get_or_insert_with(|| device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Anime4K Push Pipeline") }));
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(pass),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&compiled.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(width.div_ceil(WORKGROUP_SIZE), height.div_ceil(WORKGROUP_SIZE), 1);
        }
        self.pending_passes.push(pass.to_owned());

        Ok(())
    }

    fn join(&mut self) -> Anime4KResult<()> {
        self.flush()
    }

    fn discard_pending(&mut self) {
        let passes = std::mem::take(&mut self.pending_passes);
        if self.encoder.take().is_some() {
            tracing::debug!(?passes, "discarded unsubmitted passes");
        }
    }

    fn release_grid(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.textures.remove(&handle) {
            texture.destroy();
        }
    }
}
