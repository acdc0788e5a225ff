//! The rasterized caption image returned by the renderer.

/// Pixel format of an [`Image`]. Only `Rgba8888` is produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelFormat {
    #[default]
    Rgba8888,
}

/// Alignment, in bytes, that [`Image::stride`] is always a multiple of.
pub const ALIGNED_TO: usize = 32;

/// A rendered caption image: an owned RGBA8888 buffer plus its placement in
/// the target video frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Image {
    pub width: i32,
    pub height: i32,
    /// Bytes per row, including padding for alignment. Always `>= width * 4`
    /// and a multiple of [`ALIGNED_TO`].
    pub stride: i32,
    /// Top-left corner of this image inside the target video frame.
    pub dst_x: i32,
    pub dst_y: i32,
    pub pixel_format: PixelFormat,
    pub bitmap: Vec<u8>,
}

impl Image {
    /// Computes the aligned stride for `width` RGBA8888 pixels.
    pub fn aligned_stride(width: i32) -> i32 {
        let raw = width as usize * 4;
        let remainder = raw % ALIGNED_TO;
        let padded = if remainder == 0 {
            raw
        } else {
            raw + (ALIGNED_TO - remainder)
        };
        padded as i32
    }

    /// Allocates a zero-filled image of the given size at the origin.
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0);
        let stride = Self::aligned_stride(width);
        Self {
            width,
            height,
            stride,
            dst_x: 0,
            dst_y: 0,
            pixel_format: PixelFormat::Rgba8888,
            bitmap: vec![0u8; stride as usize * height as usize],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_aligned() {
        for w in [1, 7, 8, 33, 960, 1920] {
            let s = Image::aligned_stride(w);
            assert!(s as usize % ALIGNED_TO == 0);
            assert!(s >= w * 4);
        }
    }

    #[test]
    fn new_image_is_zeroed_and_sized() {
        let img = Image::new(10, 4);
        assert_eq!(img.bitmap.len(), img.stride as usize * 4);
        assert!(img.bitmap.iter().all(|&b| b == 0));
    }
}
