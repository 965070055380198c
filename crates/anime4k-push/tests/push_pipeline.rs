use anime4k_push::{AlphaMode, Anime4KError, CpuBackend, Image, PassScheduler, TextureSlot, UpscaleOptions, upscale};

fn solid(width: u32, height: u32, color: [u8; 4]) -> Image {
    let pixels: Vec<u8> = std::iter::repeat_n(color, (width * height) as usize).flatten().collect();
    Image::from_raw(width, height, width as usize * 4, AlphaMode::Premultiplied, pixels)
}

/// Opaque image with diagonal stripes and a few hard edges
fn line_art(width: u32, height: u32) -> Image {
    let pixels: Vec<u8> = (0..height)
        .flat_map(|y| {
            (0..width).flat_map(move |x| {
                if (x + y) % 5 < 2 {
                    [24, 20, 30, 255]
                } else {
                    [(x * 31 % 256) as u8, 200, (y * 47 % 256) as u8, 255]
                }
            })
        })
        .collect();
    Image::from_raw(width, height, width as usize * 4, AlphaMode::Premultiplied, pixels)
}

fn options(scale_factor: f32, bold_strength: f32) -> UpscaleOptions {
    UpscaleOptions {
        scale_factor,
        bold_strength,
        ..UpscaleOptions::default()
    }
}

#[test]
fn test_runs_are_deterministic() {
    let source = line_art(7, 5);
    let first = upscale(&mut CpuBackend::new(), &source, &UpscaleOptions::default()).unwrap();
    let second = upscale(&mut CpuBackend::with_threads(3).unwrap(), &source, &UpscaleOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_output_dimensions_follow_rounding_law() {
    let cases = [((3, 5), 1.5, (5, 8)), ((10, 7), 2.0, (20, 14)), ((9, 9), 0.5, (5, 5)), ((1, 1), 3.0, (3, 3))];
    for ((width, height), scale_factor, expected) in cases {
        let output = upscale(&mut CpuBackend::new(), &line_art(width, height), &options(scale_factor, 10.0)).unwrap();
        assert_eq!(output.dimensions(), expected, "{width}x{height} at {scale_factor}x");
        assert_eq!(output.bytes_per_row(), expected.0 as usize * 4);
    }
}

#[test]
fn test_identity_scale_without_push_returns_source() {
    let source = line_art(6, 4);
    let output = upscale(&mut CpuBackend::new(), &source, &options(1.0, 0.0)).unwrap();
    assert_eq!(output.as_bytes(), source.as_bytes());
}

#[test]
fn test_flat_input_passes_through() {
    let color = [40, 90, 160, 255];
    let output = upscale(&mut CpuBackend::new(), &solid(3, 2, color), &UpscaleOptions::default()).unwrap();
    assert_eq!(output.dimensions(), (6, 4));
    assert!(output.as_bytes().chunks_exact(4).all(|texel| texel == color));
}

#[test]
fn test_red_2x2_becomes_red_4x4() {
    let red = Image::from_rgba_image(&image::RgbaImage::from_pixel(2, 2, image::Rgba([255, 0, 0, 255])));
    let options = UpscaleOptions {
        scale_factor: 2.0,
        bold_strength: 0.0,
        blur_threshold: 0.0,
        ..UpscaleOptions::default()
    };
    let output = upscale(&mut CpuBackend::new(), &red, &options).unwrap();
    assert_eq!(output.dimensions(), (4, 4));
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(output.pixel(x, y), Some([255, 0, 0, 255]), "texel ({x}, {y})");
        }
    }
}

#[test]
fn test_intermediates_of_gray_and_flat_inputs() {
    let capture = UpscaleOptions {
        capture_intermediates: true,
        ..UpscaleOptions::default()
    };

    // R = G = B: luminance of the scaled image is the scaled image itself
    let gray: Vec<u8> = (0..16u8).flat_map(|i| [i * 16, i * 16, i * 16, 255]).collect();
    let gray = Image::from_raw(4, 4, 16, AlphaMode::Premultiplied, gray);
    let output = PassScheduler::new(capture).run(&mut CpuBackend::new(), &gray).unwrap();
    let find = |slot| output.intermediates.iter().find(|(s, _)| *s == slot).map(|(_, image)| image.clone()).unwrap();
    assert_eq!(find(TextureSlot::Luminance), find(TextureSlot::Scaled));

    let flat = PassScheduler::new(capture).run(&mut CpuBackend::new(), &solid(3, 3, [200, 10, 10, 255])).unwrap();
    let (_, gradient) = flat.intermediates.iter().find(|(slot, _)| *slot == TextureSlot::Gradient).unwrap();
    assert!(gradient.as_bytes().chunks_exact(4).all(|texel| texel[..3] == [0, 0, 0]));
}

#[test]
fn test_texels_without_edges_keep_scaled_color() {
    // Two flat halves meeting at a vertical edge
    let pixels: Vec<u8> = (0..8u32)
        .flat_map(|_| (0..8u32).flat_map(|x| if x < 4 { [30, 40, 60, 255] } else { [220, 200, 180, 255] }))
        .collect();
    let source = Image::from_raw(8, 8, 32, AlphaMode::Premultiplied, pixels);
    let options = UpscaleOptions {
        blur_threshold: 0.05,
        capture_intermediates: true,
        ..UpscaleOptions::default()
    };
    let output = PassScheduler::new(options).run(&mut CpuBackend::new(), &source).unwrap();
    let find = |slot| output.intermediates.iter().find(|(s, _)| *s == slot).map(|(_, image)| image.clone()).unwrap();
    let scaled = find(TextureSlot::Scaled);
    let gradient = find(TextureSlot::Gradient);

    let (width, height) = output.image.dimensions();
    let mut flat_texels = 0;
    let mut edge_texels = 0;
    for y in 0..height {
        for x in 0..width {
            let g = f32::from(gradient.pixel(x, y).unwrap()[0]) / 255.0;
            if g <= options.blur_threshold {
                flat_texels += 1;
                assert_eq!(output.image.pixel(x, y), scaled.pixel(x, y), "texel ({x}, {y}) with gradient {g}");
            } else {
                edge_texels += 1;
            }
        }
    }
    assert!(flat_texels > 0 && edge_texels > 0, "{flat_texels} flat and {edge_texels} edge texels");
}

#[test]
fn test_push_changes_line_art() {
    let source = line_art(8, 8);
    let plain = upscale(&mut CpuBackend::new(), &source, &options(2.0, 0.0)).unwrap();
    let pushed = upscale(&mut CpuBackend::new(), &source, &options(2.0, 10.0)).unwrap();
    assert_eq!(plain.dimensions(), pushed.dimensions());
    assert_ne!(plain, pushed);
}

#[test]
fn test_errors_name_their_stage() {
    let empty = Image::from_raw(0, 0, 0, AlphaMode::Premultiplied, Vec::new());
    let err = upscale(&mut CpuBackend::new(), &empty, &UpscaleOptions::default()).unwrap_err();
    assert!(matches!(err, Anime4KError::Decode(_)));

    let err = upscale(&mut CpuBackend::new(), &solid(2, 2, [0; 4]), &options(-1.0, 0.0)).unwrap_err();
    assert!(matches!(err, Anime4KError::Config(_)));

    let mut tiny = CpuBackend::new().with_max_dimension(8);
    let err = upscale(&mut tiny, &solid(5, 5, [0; 4]), &UpscaleOptions::default()).unwrap_err();
    assert_eq!(err.stage(), "allocate");
    assert_eq!(tiny.live_grids(), 0);
}
