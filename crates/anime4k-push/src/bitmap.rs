//! RGBA8 bitmap marshaling
//!
//! Converts decoded images to and from the flat, row-major, premultiplied RGBA8
//! buffers that the texture store uploads and downloads.

use crate::error::{Anime4KError, Anime4KResult};
use bytes::Bytes;

/// Bytes per RGBA8 texel
pub const BYTES_PER_PIXEL: usize = 4;

/// How the color channels of an [`Image`] relate to its alpha channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    /// Color channels are independent of alpha
    Straight,
    /// Color channels are already multiplied by alpha
    Premultiplied,
}

/// A decoded RGBA8 raster image
///
/// Immutable once constructed. Rows may be padded: `bytes_per_row` is at least
/// `width * 4` and `pixels` holds at least `bytes_per_row * height` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    bytes_per_row: usize,
    alpha: AlphaMode,
    pixels: Bytes,
}

impl Image {
    /// Creates an image from raw RGBA8 rows without validating the geometry
    ///
    /// Geometry is checked by [`decode`], which is where a malformed image
    /// would fail to be drawn.
    pub fn from_raw(width: u32, height: u32, bytes_per_row: usize, alpha: AlphaMode, pixels: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            bytes_per_row,
            alpha,
            pixels: pixels.into(),
        }
    }

    /// Creates a straight-alpha image from an `image` crate buffer
    pub fn from_rgba_image(image: &image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::from_raw(width, height, width as usize * BYTES_PER_PIXEL, AlphaMode::Straight, image.as_raw().clone())
    }

    /// Creates a straight-alpha image from any decoded image
    pub fn from_dynamic_image(image: &image::DynamicImage) -> Self {
        Self::from_rgba_image(&image.to_rgba8())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    pub fn alpha_mode(&self) -> AlphaMode {
        self.alpha
    }

    /// Raw pixel storage, including any row padding
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Returns the texel at (x, y) as stored
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.bytes_per_row + x as usize * BYTES_PER_PIXEL;
        let texel = self.pixels.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([texel[0], texel[1], texel[2], texel[3]])
    }

    /// Converts to a straight-alpha `image` crate buffer for saving
    pub fn to_rgba_image(&self) -> Anime4KResult<image::RgbaImage> {
        let row_len = self.width as usize * BYTES_PER_PIXEL;
        let mut buffer: Vec<u8> = decode(self)?
            .chunks_exact(self.bytes_per_row)
            .flat_map(|row| &row[..row_len])
            .copied()
            .collect();
        if self.alpha == AlphaMode::Premultiplied {
            buffer.chunks_exact_mut(BYTES_PER_PIXEL).for_each(unpremultiply);
        }
        image::RgbaImage::from_raw(self.width, self.height, buffer).ok_or_else(|| Anime4KError::encode("raster size does not match image dimensions"))
    }
}

/// Draws an image into a premultiplied RGBA8 raster with the image's own stride
///
/// The returned buffer holds `height` rows of `bytes_per_row` bytes. Row
/// padding is carried over untouched, so `decode(&encode(buffer, ..)?)` gives
/// back `buffer` for every well-formed premultiplied buffer.
///
/// # Errors
/// [`Anime4KError::Decode`] if the declared geometry cannot describe an RGBA8 raster
pub fn decode(image: &Image) -> Anime4KResult<Vec<u8>> {
    if image.width == 0 || image.height == 0 {
        return Err(Anime4KError::decode(format!("image has empty dimensions {}x{}", image.width, image.height)));
    }

    let row_len = (image.width as usize)
        .checked_mul(BYTES_PER_PIXEL)
        .ok_or_else(|| Anime4KError::decode("row size overflows"))?;
    if image.bytes_per_row < row_len {
        return Err(Anime4KError::decode(format!("bytes per row {} is smaller than {} required for width {}", image.bytes_per_row, row_len, image.width)));
    }

    let required = image
        .bytes_per_row
        .checked_mul(image.height as usize)
        .ok_or_else(|| Anime4KError::decode("raster size overflows"))?;
    if image.pixels.len() < required {
        return Err(Anime4KError::decode(format!("pixel storage holds {} bytes, {} required", image.pixels.len(), required)));
    }

    let mut buffer = image.pixels[..required].to_vec();
    if image.alpha == AlphaMode::Straight {
        for row in buffer.chunks_exact_mut(image.bytes_per_row) {
            row[..row_len].chunks_exact_mut(BYTES_PER_PIXEL).for_each(premultiply);
        }
    }

    Ok(buffer)
}

/// Wraps a premultiplied RGBA8 buffer and its geometry as an image
///
/// # Errors
/// [`Anime4KError::Encode`] if the buffer length does not match `bytes_per_row * height`
pub fn encode(buffer: Vec<u8>, width: u32, height: u32, bytes_per_row: usize) -> Anime4KResult<Image> {
    if width == 0 || height == 0 {
        return Err(Anime4KError::encode(format!("image has empty dimensions {width}x{height}")));
    }
    if (width as usize).checked_mul(BYTES_PER_PIXEL).is_none_or(|row_len| bytes_per_row < row_len) {
        return Err(Anime4KError::encode(format!("bytes per row {bytes_per_row} is too small for width {width}")));
    }
    if bytes_per_row.checked_mul(height as usize) != Some(buffer.len()) {
        return Err(Anime4KError::encode(format!(
            "buffer holds {} bytes, expected {} rows of {} bytes",
            buffer.len(),
            height,
            bytes_per_row
        )));
    }

    Ok(Image::from_raw(width, height, bytes_per_row, AlphaMode::Premultiplied, buffer))
}

fn premultiply(texel: &mut [u8]) {
    let alpha = u16::from(texel[3]);
    for channel in &mut texel[..3] {
        *channel = ((u16::from(*channel) * alpha + 127) / 255) as u8;
    }
}

fn unpremultiply(texel: &mut [u8]) {
    let alpha = u16::from(texel[3]);
    if alpha == 0 {
        return;
    }
    for channel in &mut texel[..3] {
        *channel = ((u16::from(*channel) * 255 + alpha / 2) / alpha).min(255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_buffer(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let v = (i * 37 % 251) as u8;
                [v, v / 2, 255 - v, 255]
            })
            .collect()
    }

    #[test]
    fn test_round_trip_reproduces_buffer() {
        for (width, height) in [(1, 1), (3, 2), (16, 9)] {
            let buffer = gradient_buffer(width, height);
            let image = encode(buffer.clone(), width, height, width as usize * 4).unwrap();
            assert_eq!(image.alpha_mode(), AlphaMode::Premultiplied);
            assert_eq!(decode(&image).unwrap(), buffer);
        }
    }

    #[test]
    fn test_round_trip_keeps_translucent_premultiplied_texels() {
        let buffer = vec![10, 20, 30, 40, 0, 0, 0, 0, 128, 64, 0, 128];
        let image = encode(buffer.clone(), 3, 1, 12).unwrap();
        assert_eq!(decode(&image).unwrap(), buffer);
    }

    #[test]
    fn test_round_trip_keeps_row_padding() {
        let padded = vec![
            1, 2, 3, 255, 4, 5, 6, 255, 0xAA, 0xAA, //
            7, 8, 9, 255, 10, 11, 12, 255, 0xBB, 0xBB,
        ];
        let image = encode(padded.clone(), 2, 2, 10).unwrap();
        assert_eq!(decode(&image).unwrap(), padded);
        assert_eq!(image.pixel(1, 1), Some([10, 11, 12, 255]));
        assert_eq!(image.pixel(2, 0), None);
    }

    #[test]
    fn test_decode_premultiplies_texels_but_not_padding() {
        let image = Image::from_raw(1, 2, 6, AlphaMode::Straight, vec![200, 100, 50, 128, 0xAA, 0xAA, 10, 20, 30, 0, 0xBB, 0xBB]);
        assert_eq!(decode(&image).unwrap(), vec![100, 50, 25, 128, 0xAA, 0xAA, 0, 0, 0, 0, 0xBB, 0xBB]);
    }

    #[test]
    fn test_padded_image_converts_to_tight_rgba_image() {
        let image = encode(vec![9, 8, 7, 255, 0, 0, 0, 0, 6, 5, 4, 255, 0, 0, 0, 0], 1, 2, 8).unwrap();
        let rgba = image.to_rgba_image().unwrap();
        assert_eq!(rgba.as_raw(), &vec![9, 8, 7, 255, 6, 5, 4, 255]);
    }

    #[test]
    fn test_decode_premultiplies_straight_alpha() {
        let image = Image::from_raw(2, 1, 8, AlphaMode::Straight, vec![255, 128, 0, 128, 200, 100, 50, 0]);
        assert_eq!(decode(&image).unwrap(), vec![128, 64, 0, 128, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_rejects_bad_geometry() {
        let empty = Image::from_raw(0, 4, 0, AlphaMode::Straight, Vec::new());
        assert!(matches!(decode(&empty), Err(Anime4KError::Decode(_))));

        let narrow_stride = Image::from_raw(4, 1, 8, AlphaMode::Straight, vec![0; 16]);
        assert!(matches!(decode(&narrow_stride), Err(Anime4KError::Decode(_))));

        let truncated = Image::from_raw(2, 2, 8, AlphaMode::Straight, vec![0; 12]);
        assert!(matches!(decode(&truncated), Err(Anime4KError::Decode(_))));
    }

    #[test]
    fn test_encode_rejects_length_mismatch() {
        assert!(matches!(encode(vec![0; 15], 2, 2, 8), Err(Anime4KError::Encode(_))));
        assert!(matches!(encode(vec![0; 16], 4, 2, 8), Err(Anime4KError::Encode(_))));
        assert!(matches!(encode(Vec::new(), 0, 0, 0), Err(Anime4KError::Encode(_))));
    }

    #[test]
    fn test_rgba_image_conversion() {
        let source = image::RgbaImage::from_raw(2, 1, vec![255, 0, 0, 255, 100, 200, 50, 255]).unwrap();
        let image = Image::from_rgba_image(&source);
        let premultiplied = encode(decode(&image).unwrap(), 2, 1, 8).unwrap();
        assert_eq!(premultiplied.to_rgba_image().unwrap(), source);
    }

    #[test]
    fn test_unpremultiply_inverts_premultiply_for_opaque_and_half_alpha() {
        let mut texel = [128, 64, 0, 128];
        unpremultiply(&mut texel);
        assert_eq!(texel, [255, 128, 0, 128]);

        let mut opaque = [12, 34, 56, 255];
        premultiply(&mut opaque);
        assert_eq!(opaque, [12, 34, 56, 255]);
    }
}
