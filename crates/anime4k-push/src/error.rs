//! Error types for the Anime4K push pipeline
//!
//! Every failure aborts the whole run. Each variant carries the name of the
//! pass or stage it was raised at so callers can report a single terminal
//! failure without guessing where it came from.

/// Errors raised while validating user tunables
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Scale factor is not a finite value greater than zero
    #[error("scale factor must be finite and greater than zero, got {0}")]
    InvalidScaleFactor(f32),
    /// Bold strength is negative or not finite
    #[error("bold strength must be finite and non-negative, got {0}")]
    InvalidBoldStrength(f32),
    /// Blur threshold lies outside [0, 1]
    #[error("blur threshold must lie in [0, 1], got {0}")]
    InvalidBlurThreshold(f32),
    /// Source image has a zero dimension
    #[error("source dimensions must be positive, got {width}x{height}")]
    EmptySource {
        /// Source width in pixels
        width: u32,
        /// Source height in pixels
        height: u32,
    },
    /// Rounding the scaled size produced an empty or unrepresentable grid
    #[error("destination dimensions {width}x{height} are not representable")]
    InvalidDestination {
        /// Unclamped destination width
        width: f64,
        /// Unclamped destination height
        height: f64,
    },
}

/// Terminal failure of an upscaling run
#[derive(Debug, thiserror::Error)]
pub enum Anime4KError {
    /// Invalid tunable values
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The source image could not be drawn into an RGBA8 raster
    #[error("failed to decode bitmap: {0}")]
    Decode(String),

    /// A raw buffer could not be wrapped as an output image
    #[error("failed to encode bitmap: {0}")]
    Encode(String),

    /// Texture or buffer allocation, upload or download failure
    #[error("resource error during {stage}: {reason}")]
    Resource {
        /// Stage at which the resource was requested
        stage: String,
        /// Backend-provided reason
        reason: String,
    },

    /// A pass's compute program failed to build or bind
    #[error("failed to build kernel for pass '{pass}': {reason}")]
    KernelBuild {
        /// Pass name
        pass: String,
        /// Backend-provided reason
        reason: String,
    },

    /// A pass failed during execution
    #[error("pass '{pass}' failed during dispatch: {reason}")]
    Dispatch {
        /// Pass name
        pass: String,
        /// Backend-provided reason
        reason: String,
    },
}

impl Anime4KError {
    /// Build an [`Anime4KError::Decode`] value.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Build an [`Anime4KError::Encode`] value.
    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Build an [`Anime4KError::Resource`] value.
    pub fn resource(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`Anime4KError::KernelBuild`] value.
    pub fn kernel_build(pass: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KernelBuild {
            pass: pass.into(),
            reason: reason.into(),
        }
    }

    /// Build an [`Anime4KError::Dispatch`] value.
    pub fn dispatch(pass: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Dispatch {
            pass: pass.into(),
            reason: reason.into(),
        }
    }

    /// Name of the pass or stage the error was raised at
    pub fn stage(&self) -> &str {
        match self {
            Self::Config(_) => "config",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Resource { stage, .. } => stage,
            Self::KernelBuild { pass, .. } | Self::Dispatch { pass, .. } => pass,
        }
    }
}

/// Convenience result type used across the crate
pub type Anime4KResult<T> = Result<T, Anime4KError>;
