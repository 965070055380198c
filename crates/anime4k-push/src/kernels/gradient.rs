//! Gradient pass: normalized Sobel magnitude of luminance

use super::{TexelGrid, to_unorm};

/// Largest Sobel magnitude reachable with luminance in [0, 1] (4 * sqrt 2)
const MAX_SOBEL: f32 = 5.656854;

pub(super) fn texel(pushed: &TexelGrid, lum: &TexelGrid, x: u32, y: u32) -> [u8; 4] {
    let (xi, yi) = (i64::from(x), i64::from(y));
    let l = |dx: i64, dy: i64| lum.unit_clamped(xi + dx, yi + dy)[0];

    let (tl, tc, tr) = (l(-1, -1), l(0, -1), l(1, -1));
    let (ml, mr) = (l(-1, 0), l(1, 0));
    let (bl, bc, br) = (l(-1, 1), l(0, 1), l(1, 1));

    // Differences first so flat neighborhoods give exactly zero
    let gx = (tr - tl) + 2.0 * (mr - ml) + (br - bl);
    let gy = (bl - tl) + 2.0 * (bc - tc) + (br - tr);
    let g = to_unorm((gx * gx + gy * gy).sqrt() / MAX_SOBEL);

    [g, g, g, pushed.texel(x, y)[3]]
}
