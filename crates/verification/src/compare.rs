//! Image comparison utilities for verification
//!
//! The GPU and CPU backends evaluate the same kernels with different float
//! hardware, so their outputs are compared per channel with a tolerance rather
//! than bit for bit.

use anime4k_push::Image;

/// Result of comparing two images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    /// Images match exactly
    Match,
    /// Every channel differs by at most the tolerance
    WithinTolerance {
        /// Largest per-channel difference found
        max_difference: u8,
    },
    /// Images have different dimensions
    DimensionMismatch {
        /// Dimensions of the reference image
        reference_dimensions: (u32, u32),
        /// Dimensions of the candidate image
        candidate_dimensions: (u32, u32),
    },
    /// Images have matching dimensions but some texels exceed the tolerance
    PixelMismatch {
        /// Largest difference per channel (R, G, B, A)
        max_difference: [u8; 4],
        /// Number of texels with at least one channel over the tolerance
        mismatched_texels: usize,
    },
}

impl CompareResult {
    /// Whether the images agree within the tolerance
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match | Self::WithinTolerance { .. })
    }
}

/// Compares two RGBA8 images texel by texel
///
/// # Arguments
/// * `reference` - Expected image, usually the CPU backend's output
/// * `candidate` - Image under test, usually the GPU backend's output
/// * `tolerance` - Largest accepted per-channel difference
///
/// # Returns
/// A `CompareResult` indicating whether the images match and details about any differences
pub fn compare_images(reference: &Image, candidate: &Image, tolerance: u8) -> CompareResult {
    if reference.dimensions() != candidate.dimensions() {
        return CompareResult::DimensionMismatch {
            reference_dimensions: reference.dimensions(),
            candidate_dimensions: candidate.dimensions(),
        };
    }

    let mut max_difference = [0u8; 4];
    let mut mismatched_texels = 0;

    let (width, height) = reference.dimensions();
    for y in 0..height {
        for x in 0..width {
            let (Some(a), Some(b)) = (reference.pixel(x, y), candidate.pixel(x, y)) else {
                continue;
            };
            let mut over = false;
            for i in 0..4 {
                let difference = a[i].abs_diff(b[i]);
                max_difference[i] = max_difference[i].max(difference);
                over |= difference > tolerance;
            }
            mismatched_texels += usize::from(over);
        }
    }

    let overall = max_difference.into_iter().max().unwrap_or(0);
    if mismatched_texels > 0 {
        CompareResult::PixelMismatch {
            max_difference,
            mismatched_texels,
        }
    } else if overall == 0 {
        CompareResult::Match
    } else {
        CompareResult::WithinTolerance { max_difference: overall }
    }
}
