//! Scale pass: bilinear resampling to destination size

use super::{TexelGrid, to_unorm};
use crate::config::KernelConstants;

pub(super) fn texel(source: &TexelGrid, constants: &KernelConstants, x: u32, y: u32) -> [u8; 4] {
    let max_x = (source.width() - 1) as f32;
    let max_y = (source.height() - 1) as f32;

    // Pixel-center mapping back into source space
    let sx = ((x as f32 + 0.5) / constants.scale_factor - 0.5).clamp(0.0, max_x);
    let sy = ((y as f32 + 0.5) / constants.scale_factor - 0.5).clamp(0.0, max_y);
    let (bx, by) = (sx.floor(), sy.floor());
    let (tx, ty) = (sx - bx, sy - by);
    let (x0, y0) = (bx as i64, by as i64);

    let c00 = source.unit_clamped(x0, y0);
    let c10 = source.unit_clamped(x0 + 1, y0);
    let c01 = source.unit_clamped(x0, y0 + 1);
    let c11 = source.unit_clamped(x0 + 1, y0 + 1);

    std::array::from_fn(|i| {
        let top = c00[i] + (c10[i] - c00[i]) * tx;
        let bottom = c01[i] + (c11[i] - c01[i]) * tx;
        to_unorm(top + (bottom - top) * ty)
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{constants, run};
    use super::super::{Kernel, TexelGrid};

    fn checkerboard(width: u32, height: u32) -> TexelGrid {
        let data = (0..height)
            .flat_map(|y| (0..width).flat_map(move |x| if (x + y) % 2 == 0 { [250, 10, 90, 255] } else { [5, 120, 200, 128] }))
            .collect();
        TexelGrid::from_raw(width, height, data).unwrap()
    }

    #[test]
    fn test_unit_scale_is_identity() {
        let source = checkerboard(5, 3);
        let output = run(Kernel::Scale, &[&source], &constants(5, 3, 1.0, 0.0, 0.0));
        assert_eq!(output, source);
    }

    #[test]
    fn test_output_has_destination_dimensions() {
        let source = checkerboard(3, 5);
        let output = run(Kernel::Scale, &[&source], &constants(3, 5, 1.5, 0.0, 0.0));
        assert_eq!((output.width(), output.height()), (5, 8));
    }

    #[test]
    fn test_solid_color_stays_solid() {
        let source = TexelGrid::filled(2, 2, [255, 0, 0, 255]);
        let output = run(Kernel::Scale, &[&source], &constants(2, 2, 2.0, 0.0, 0.0));
        assert_eq!(output, TexelGrid::filled(4, 4, [255, 0, 0, 255]));
    }

    #[test]
    fn test_interpolates_between_neighbors() {
        let source = TexelGrid::from_raw(2, 1, vec![0, 0, 0, 255, 200, 200, 200, 255]).unwrap();
        let output = run(Kernel::Scale, &[&source], &constants(2, 1, 2.0, 0.0, 0.0));
        // Destination centers map to source x = -0.25, 0.25, 0.75, 1.25
        let reds: Vec<u8> = (0..4).map(|x| output.texel(x, 0)[0]).collect();
        assert_eq!(reds, vec![0, 50, 150, 200]);
    }
}
