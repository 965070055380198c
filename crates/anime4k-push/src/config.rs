//! Pipeline configuration
//!
//! User tunables are collected in [`UpscaleOptions`], validated once against the
//! source image size and frozen into a [`PipelineConfig`]. Every kernel dispatch
//! receives the same [`KernelConstants`] view of that config.

use crate::error::ConfigError;
use serde::Deserialize;

/// Default upscaling factor
pub const DEFAULT_SCALE_FACTOR: f32 = 2.0;
/// Default push strength
pub const DEFAULT_BOLD_STRENGTH: f32 = 10.0;
/// Default gradient threshold below which sharpening is suppressed
pub const DEFAULT_BLUR_THRESHOLD: f32 = 0.0001;

/// User-facing tunables for one upscaling run
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpscaleOptions {
    /// Output size relative to input (e.g., 2.0 for 2x upscaling)
    pub scale_factor: f32,
    /// Strength of the thin-line push; 0 disables it
    pub bold_strength: f32,
    /// Gradient level in [0, 1] at or below which the scaled source is kept
    pub blur_threshold: f32,
    /// Download every intermediate texture after the run completes
    pub capture_intermediates: bool,
}

impl Default for UpscaleOptions {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            bold_strength: DEFAULT_BOLD_STRENGTH,
            blur_threshold: DEFAULT_BLUR_THRESHOLD,
            capture_intermediates: false,
        }
    }
}

impl UpscaleOptions {
    /// Parses options from YAML content; missing keys keep their defaults
    ///
    /// # Arguments
    /// * `yaml_content` - YAML mapping with any of the option keys
    pub fn from_yaml(yaml_content: &str) -> Result<Self, serde_norway::Error> {
        serde_norway::from_str(yaml_content)
    }

    /// Parses options from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML options file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?)
    }
}

/// Immutable parameter bundle shared by every pass of a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Output size relative to input
    pub scale_factor: f32,
    /// Source width in texels
    pub src_width: u32,
    /// Source height in texels
    pub src_height: u32,
    /// Destination width, `round(src_width * scale_factor)`
    pub dst_width: u32,
    /// Destination height, `round(src_height * scale_factor)`
    pub dst_height: u32,
    /// Push strength
    pub bold_strength: f32,
    /// Final-pass gradient threshold
    pub blur_threshold: f32,
}

impl PipelineConfig {
    /// Validates the tunables and derives destination dimensions
    ///
    /// # Arguments
    /// * `src_width` - Source image width
    /// * `src_height` - Source image height
    /// * `options` - User tunables
    ///
    /// # Returns
    /// The frozen configuration, or a [`ConfigError`] describing the first invalid value
    pub fn new(src_width: u32, src_height: u32, options: &UpscaleOptions) -> Result<Self, ConfigError> {
        let UpscaleOptions {
            scale_factor,
            bold_strength,
            blur_threshold,
            ..
        } = *options;

        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(ConfigError::InvalidScaleFactor(scale_factor));
        }
        if !bold_strength.is_finite() || bold_strength < 0.0 {
            return Err(ConfigError::InvalidBoldStrength(bold_strength));
        }
        if !(0.0..=1.0).contains(&blur_threshold) {
            return Err(ConfigError::InvalidBlurThreshold(blur_threshold));
        }
        if src_width == 0 || src_height == 0 {
            return Err(ConfigError::EmptySource {
                width: src_width,
                height: src_height,
            });
        }

        let width = (f64::from(src_width) * f64::from(scale_factor)).round();
        let height = (f64::from(src_height) * f64::from(scale_factor)).round();
        // Each row must also fit a u32 byte stride
        let max_width = f64::from(u32::MAX / 4);
        if width < 1.0 || height < 1.0 || width > max_width || height > f64::from(u32::MAX) {
            return Err(ConfigError::InvalidDestination { width, height });
        }

        Ok(Self {
            scale_factor,
            src_width,
            src_height,
            dst_width: width as u32,
            dst_height: height as u32,
            bold_strength,
            blur_threshold,
        })
    }

    /// Source dimensions as (width, height)
    pub fn src_size(&self) -> (u32, u32) {
        (self.src_width, self.src_height)
    }

    /// Destination dimensions as (width, height)
    pub fn dst_size(&self) -> (u32, u32) {
        (self.dst_width, self.dst_height)
    }

    /// Row stride of a tightly packed RGBA8 destination buffer
    pub fn dst_bytes_per_row(&self) -> u32 {
        self.dst_width * 4
    }

    /// Constant bundle bound to every kernel dispatch
    pub fn kernel_constants(&self) -> KernelConstants {
        KernelConstants {
            scale_factor: self.scale_factor,
            src_width: self.src_width,
            src_height: self.src_height,
            dst_width: self.dst_width,
            dst_height: self.dst_height,
            dst_bytes_per_row: self.dst_bytes_per_row(),
            bold_strength: self.bold_strength,
            blur_threshold: self.blur_threshold,
        }
    }
}

/// GPU-layout view of [`PipelineConfig`]
///
/// Matches the `Params` uniform struct declared by every WGSL kernel
/// (eight 4-byte scalars, 32 bytes total).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelConstants {
    pub scale_factor: f32,
    pub src_width: u32,
    pub src_height: u32,
    pub dst_width: u32,
    pub dst_height: u32,
    pub dst_bytes_per_row: u32,
    pub bold_strength: f32,
    pub blur_threshold: f32,
}
