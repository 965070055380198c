//! Per-texel compute kernels of the push pipeline
//!
//! Every kernel exists twice: as a WGSL compute shader (embedded by the build
//! script) and as a CPU reference implementation operating on [`TexelGrid`]s.
//! Both compute one destination texel per invocation from read-only inputs and
//! have no other side effect.

mod final_blend;
mod gradient;
mod luminance;
mod push;
mod scale;

use crate::config::KernelConstants;

/// Minified WGSL sources generated by `build.rs`
mod shaders {
    include!(concat!(env!("OUT_DIR"), "/shaders.rs"));
}

/// The five compute programs of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Resamples the source grid to destination size
    Scale,
    /// Derives a perceptual luminance grid from a color grid
    Luminance,
    /// Sharpens thin lines by pushing lighter neighbor colors into the center
    Push,
    /// Measures local luminance edge strength
    Gradient,
    /// Blends pushed and scaled colors according to edge strength
    Final,
}

impl Kernel {
    /// Every kernel, in pipeline order of first use
    pub const ALL: [Kernel; 5] = [Kernel::Scale, Kernel::Luminance, Kernel::Push, Kernel::Gradient, Kernel::Final];

    /// Returns the human-readable name of this kernel
    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Scale => "Scale",
            Kernel::Luminance => "Luminance",
            Kernel::Push => "Push",
            Kernel::Gradient => "Gradient",
            Kernel::Final => "Final",
        }
    }

    /// Number of textures read by this kernel
    pub fn input_count(&self) -> usize {
        match self {
            Kernel::Scale | Kernel::Luminance => 1,
            Kernel::Push | Kernel::Gradient => 2,
            Kernel::Final => 3,
        }
    }

    /// Number of bound texture slots: every input plus the single output
    pub fn slot_count(&self) -> usize {
        self.input_count() + 1
    }

    /// WGSL compute shader implementing this kernel
    ///
    /// Binding 0 holds the constant bundle, bindings `1..=input_count()` the
    /// inputs in order and the last binding the write-only output.
    pub fn shader(&self) -> &'static str {
        match self {
            Kernel::Scale => shaders::SCALE_WGSL,
            Kernel::Luminance => shaders::LUMINANCE_WGSL,
            Kernel::Push => shaders::PUSH_WGSL,
            Kernel::Gradient => shaders::GRADIENT_WGSL,
            Kernel::Final => shaders::FINAL_WGSL,
        }
    }

    /// Computes one destination texel on the CPU
    ///
    /// # Arguments
    /// * `inputs` - Input grids in binding order; length must equal [`Kernel::input_count`]
    /// * `constants` - The run's constant bundle
    /// * `x`, `y` - Destination texel coordinate
    pub fn texel(&self, inputs: &[&TexelGrid], constants: &KernelConstants, x: u32, y: u32) -> [u8; 4] {
        match self {
            Kernel::Scale => scale::texel(inputs[0], constants, x, y),
            Kernel::Luminance => luminance::texel(inputs[0], x, y),
            Kernel::Push => push::texel(inputs[0], inputs[1], constants, x, y),
            Kernel::Gradient => gradient::texel(inputs[0], inputs[1], x, y),
            Kernel::Final => final_blend::texel(inputs[0], inputs[1], inputs[2], constants, x, y),
        }
    }
}

impl std::fmt::Display for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A host-resident RGBA8 grid, row-major and tightly packed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TexelGrid {
    /// Creates a zero-filled grid
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Wraps tightly packed RGBA8 rows, returning `None` on a length mismatch
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * 4).then_some(Self { width, height, data })
    }

    /// Creates a grid with every texel set to `color`
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            data: color.repeat(width as usize * height as usize),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Returns the texel at an in-bounds coordinate
    pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[offset], self.data[offset + 1], self.data[offset + 2], self.data[offset + 3]]
    }

    /// Returns the texel nearest to a possibly out-of-bounds coordinate
    pub fn texel_clamped(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, i64::from(self.width) - 1) as u32;
        let y = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.texel(x, y)
    }

    /// Returns the clamped texel normalized to [0, 1]
    pub fn unit_clamped(&self, x: i64, y: i64) -> [f32; 4] {
        self.texel_clamped(x, y).map(to_unit)
    }
}

/// Converts a unorm8 channel to [0, 1]
pub(crate) fn to_unit(value: u8) -> f32 {
    f32::from(value) / 255.0
}

/// Converts a [0, 1] channel to unorm8 with round-to-nearest
pub(crate) fn to_unorm(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
