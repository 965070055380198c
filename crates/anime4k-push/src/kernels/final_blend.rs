//! Final pass: gradient-controlled blend of pushed and scaled colors

use super::{TexelGrid, to_unit, to_unorm};
use crate::config::KernelConstants;

/// Slope of the blend weight above the threshold
const EDGE_GAIN: f32 = 4.0;

/// Weight of the pushed color for gradient `g`; zero at or below `threshold`
pub(crate) fn edge_weight(g: f32, threshold: f32) -> f32 {
    if g <= threshold { 0.0 } else { (0.5 + (g - threshold) * EDGE_GAIN).clamp(0.5, 1.0) }
}

pub(super) fn texel(pushed: &TexelGrid, gradient: &TexelGrid, scaled: &TexelGrid, constants: &KernelConstants, x: u32, y: u32) -> [u8; 4] {
    let source = scaled.texel(x, y);
    let w = edge_weight(to_unit(gradient.texel(x, y)[0]), constants.blur_threshold);
    if w == 0.0 {
        return source;
    }

    let s = source.map(to_unit);
    let p = pushed.texel(x, y).map(to_unit);
    std::array::from_fn(|i| to_unorm(s[i] + (p[i] - s[i]) * w))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{constants, run};
    use super::super::{Kernel, TexelGrid};
    use super::edge_weight;

    fn blend(gradient_level: u8, blur_threshold: f32) -> [u8; 4] {
        let pushed = TexelGrid::filled(1, 1, [200, 200, 200, 255]);
        let gradient = TexelGrid::filled(1, 1, [gradient_level, gradient_level, gradient_level, 255]);
        let scaled = TexelGrid::filled(1, 1, [100, 100, 100, 255]);
        run(Kernel::Final, &[&pushed, &gradient, &scaled], &constants(1, 1, 1.0, 0.0, blur_threshold)).texel(0, 0)
    }

    #[test]
    fn test_no_edges_keeps_scaled_source() {
        assert_eq!(blend(0, 0.0), [100, 100, 100, 255]);
    }

    #[test]
    fn test_gradient_at_or_below_threshold_keeps_scaled_source() {
        assert_eq!(blend(51, 0.2), [100, 100, 100, 255]);
        assert_eq!(blend(25, 0.2), [100, 100, 100, 255]);
    }

    #[test]
    fn test_edges_favor_pushed_color() {
        let [r, ..] = blend(52, 0.2);
        assert!(r >= 150, "edge texel {r} should lean toward the pushed color");
        assert_eq!(blend(255, 0.0), [200, 200, 200, 255]);
    }

    #[test]
    fn test_edge_weight_is_monotonic_above_threshold() {
        assert_eq!(edge_weight(0.1, 0.1), 0.0);
        assert!(edge_weight(0.11, 0.1) >= 0.5);
        assert!(edge_weight(0.2, 0.1) > edge_weight(0.11, 0.1));
        assert_eq!(edge_weight(1.0, 0.0), 1.0);
    }
}
