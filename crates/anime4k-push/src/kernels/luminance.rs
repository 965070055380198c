//! Luminance pass

use super::{TexelGrid, to_unit, to_unorm};

/// Perceptual luminance, `(2R + 3G + B) / 6`
pub(crate) fn luma(color: [f32; 4]) -> f32 {
    (color[0] * 2.0 + color[1] * 3.0 + color[2]) / 6.0
}

pub(super) fn texel(color: &TexelGrid, x: u32, y: u32) -> [u8; 4] {
    let l = to_unorm(luma(color.texel(x, y).map(to_unit)));
    [l, l, l, 255]
}

#[cfg(test)]
mod tests {
    use super::super::tests::{constants, run};
    use super::super::{Kernel, TexelGrid};

    #[test]
    fn test_achromatic_input_keeps_its_value() {
        for v in 0..=255u8 {
            let grid = TexelGrid::filled(3, 2, [v, v, v, 255]);
            let output = run(Kernel::Luminance, &[&grid], &constants(3, 2, 1.0, 0.0, 0.0));
            assert_eq!(output, TexelGrid::filled(3, 2, [v, v, v, 255]), "luminance of gray {v}");
        }
    }

    #[test]
    fn test_green_weighs_more_than_blue() {
        let grid = TexelGrid::from_raw(2, 1, vec![0, 255, 0, 255, 0, 0, 255, 255]).unwrap();
        let output = run(Kernel::Luminance, &[&grid], &constants(2, 1, 1.0, 0.0, 0.0));
        assert_eq!(output.texel(0, 0)[0], 128);
        assert_eq!(output.texel(1, 0)[0], 43);
    }
}
