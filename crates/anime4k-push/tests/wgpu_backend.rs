//! GPU runs; skipped when no adapter is available

use anime4k_push::{AlphaMode, CpuBackend, Image, PassScheduler, TextureSlot, UpscaleOptions, WgpuBackend, upscale};

async fn gpu() -> Option<WgpuBackend> {
    match WgpuBackend::new().await {
        Ok(backend) => Some(backend),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

fn checker(width: u32, height: u32) -> Image {
    let pixels: Vec<u8> = (0..height)
        .flat_map(|y| (0..width).flat_map(move |x| if (x / 2 + y / 2) % 2 == 0 { [230, 220, 210, 255] } else { [30, 40, 60, 255] }))
        .collect();
    Image::from_raw(width, height, width as usize * 4, AlphaMode::Premultiplied, pixels)
}

fn assert_close(label: &str, gpu: &Image, cpu: &Image, tolerance: u8) {
    assert_eq!(gpu.dimensions(), cpu.dimensions(), "{label} dimensions");
    for (i, (a, b)) in gpu.as_bytes().iter().zip(cpu.as_bytes()).enumerate() {
        assert!(a.abs_diff(*b) <= tolerance, "{label} byte {i} differs: {a} vs {b}");
    }
}

#[tokio::test]
async fn test_red_2x2_becomes_red_4x4_on_gpu() {
    let Some(mut backend) = gpu().await else { return };
    let red = Image::from_raw(2, 2, 8, AlphaMode::Premultiplied, [255u8, 0, 0, 255].repeat(4));
    let output = upscale(&mut backend, &red, &UpscaleOptions::default()).unwrap();
    assert_eq!(output.dimensions(), (4, 4));
    assert!(output.as_bytes().chunks_exact(4).all(|texel| texel == [255, 0, 0, 255]));
}

#[tokio::test]
async fn test_gpu_matches_cpu_within_rounding() {
    let Some(mut backend) = gpu().await else { return };
    let source = checker(13, 9);
    let options = UpscaleOptions {
        capture_intermediates: true,
        ..UpscaleOptions::default()
    };

    let scheduler = PassScheduler::new(options);
    let gpu = scheduler.run(&mut backend, &source).unwrap();
    let cpu = scheduler.run(&mut CpuBackend::new(), &source).unwrap();

    assert_eq!(gpu.image.dimensions(), cpu.image.dimensions());
    assert_eq!(gpu.intermediates.len(), cpu.intermediates.len());
    // Scale and luminance are smooth functions; float rounding may differ by one step
    for ((slot, gpu_image), (_, cpu_image)) in gpu.intermediates.iter().zip(&cpu.intermediates).take(2) {
        let tolerance = if *slot == TextureSlot::Scaled { 1 } else { 2 };
        assert_close(slot.name(), gpu_image, cpu_image, tolerance);
    }
}

#[tokio::test]
async fn test_gpu_gradient_and_final_match_cpu_without_push() {
    let Some(mut backend) = gpu().await else { return };
    let source = checker(11, 7);
    // Without push every pass is continuous in its inputs, so GPU and CPU stay close
    let options = UpscaleOptions {
        bold_strength: 0.0,
        capture_intermediates: true,
        ..UpscaleOptions::default()
    };

    let scheduler = PassScheduler::new(options);
    let gpu = scheduler.run(&mut backend, &source).unwrap();
    let cpu = scheduler.run(&mut CpuBackend::new(), &source).unwrap();

    assert_eq!(gpu.intermediates.len(), cpu.intermediates.len());
    for ((slot, gpu_image), (cpu_slot, cpu_image)) in gpu.intermediates.iter().zip(&cpu.intermediates) {
        assert_eq!(slot, cpu_slot);
        let tolerance = match slot {
            TextureSlot::Scaled | TextureSlot::Pushed => 1,
            TextureSlot::Luminance | TextureSlot::PushedLuminance => 2,
            _ => 6,
        };
        assert_close(slot.name(), gpu_image, cpu_image, tolerance);
    }
    assert_close("result", &gpu.image, &cpu.image, 1);

    let (_, gradient) = gpu.intermediates.iter().find(|(slot, _)| *slot == TextureSlot::Gradient).unwrap();
    assert!(gradient.as_bytes().chunks_exact(4).any(|texel| texel[0] > 0), "checker edges should register on the GPU");
}

#[tokio::test]
async fn test_gpu_backend_is_reusable_across_runs() {
    let Some(mut backend) = gpu().await else { return };
    let first = upscale(&mut backend, &checker(6, 6), &UpscaleOptions::default()).unwrap();
    let second = upscale(&mut backend, &checker(6, 6), &UpscaleOptions::default()).unwrap();
    assert_eq!(first, second);
}
