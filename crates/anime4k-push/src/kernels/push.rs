//! Push pass: thin-line sharpening over the 3x3 ring
//!
//! Each of the eight ring kernels (four orientations, each tested from both
//! sides) asks whether one side of the neighborhood is uniformly lighter than
//! the other. When it is, the center is blended toward the mean of the lighter
//! side; of all accepted blends the one with the highest luminance wins. If no
//! kernel fires the center texel is copied unchanged.

use super::{TexelGrid, to_unorm};
use crate::config::KernelConstants;

#[derive(Debug, Clone, Copy)]
struct Sample {
    color: [f32; 4],
    lum: f32,
}

/// Maps the unbounded bold strength onto a blend factor in [0, 1)
pub(crate) fn push_strength(bold_strength: f32) -> f32 {
    bold_strength / (1.0 + bold_strength)
}

fn max3(a: f32, b: f32, c: f32) -> f32 {
    a.max(b).max(c)
}

fn min3(a: f32, b: f32, c: f32) -> f32 {
    a.min(b).min(c)
}

/// Blends `center` toward the mean of `a`, `b`, `c` and keeps the lighter of that and `current`
fn lighter(current: Sample, center: Sample, [a, b, c]: [Sample; 3], strength: f32) -> Sample {
    let color = std::array::from_fn(|i| center.color[i] * (1.0 - strength) + (a.color[i] + b.color[i] + c.color[i]) / 3.0 * strength);
    let lum = center.lum * (1.0 - strength) + (a.lum + b.lum + c.lum) / 3.0 * strength;
    if lum > current.lum { Sample { color, lum } } else { current }
}

pub(super) fn texel(scaled: &TexelGrid, lum: &TexelGrid, constants: &KernelConstants, x: u32, y: u32) -> [u8; 4] {
    let (x, y) = (i64::from(x), i64::from(y));
    let sample = |dx: i64, dy: i64| Sample {
        color: scaled.unit_clamped(x + dx, y + dy),
        lum: lum.unit_clamped(x + dx, y + dy)[0],
    };

    let tl = sample(-1, -1);
    let tc = sample(0, -1);
    let tr = sample(1, -1);
    let ml = sample(-1, 0);
    let cc = sample(0, 0);
    let mr = sample(1, 0);
    let bl = sample(-1, 1);
    let bc = sample(0, 1);
    let br = sample(1, 1);

    let strength = push_strength(constants.bold_strength);
    let mut lightest = cc;

    // Kernels 0 and 4: horizontal edge
    let (max_dark, min_light) = (max3(br.lum, bc.lum, bl.lum), min3(tl.lum, tc.lum, tr.lum));
    if min_light > cc.lum && min_light > max_dark {
        lightest = lighter(lightest, cc, [tl, tc, tr], strength);
    } else {
        let (max_dark, min_light) = (max3(tl.lum, tc.lum, tr.lum), min3(br.lum, bc.lum, bl.lum));
        if min_light > cc.lum && min_light > max_dark {
            lightest = lighter(lightest, cc, [br, bc, bl], strength);
        }
    }

    // Kernels 1 and 5: diagonal toward top-right
    let (max_dark, min_light) = (max3(cc.lum, ml.lum, bc.lum), min3(mr.lum, tc.lum, tr.lum));
    if min_light > max_dark {
        lightest = lighter(lightest, cc, [mr, tc, tr], strength);
    } else {
        let (max_dark, min_light) = (max3(cc.lum, mr.lum, tc.lum), min3(bl.lum, ml.lum, bc.lum));
        if min_light > max_dark {
            lightest = lighter(lightest, cc, [bl, ml, bc], strength);
        }
    }

    // Kernels 2 and 6: vertical edge
    let (max_dark, min_light) = (max3(ml.lum, tl.lum, bl.lum), min3(mr.lum, br.lum, tr.lum));
    if min_light > cc.lum && min_light > max_dark {
        lightest = lighter(lightest, cc, [mr, br, tr], strength);
    } else {
        let (max_dark, min_light) = (max3(mr.lum, br.lum, tr.lum), min3(ml.lum, tl.lum, bl.lum));
        if min_light > cc.lum && min_light > max_dark {
            lightest = lighter(lightest, cc, [ml, tl, bl], strength);
        }
    }

    // Kernels 3 and 7: diagonal toward bottom-right
    let (max_dark, min_light) = (max3(cc.lum, ml.lum, tc.lum), min3(mr.lum, br.lum, bc.lum));
    if min_light > max_dark {
        lightest = lighter(lightest, cc, [mr, br, bc], strength);
    } else {
        let (max_dark, min_light) = (max3(cc.lum, mr.lum, bc.lum), min3(tc.lum, ml.lum, tl.lum));
        if min_light > max_dark {
            lightest = lighter(lightest, cc, [tc, ml, tl], strength);
        }
    }

    if lightest.lum > cc.lum {
        lightest.color.map(to_unorm)
    } else {
        scaled.texel_clamped(x, y)
    }
}
