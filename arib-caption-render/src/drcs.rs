//! The C5 DRCS rasterizer: rescales a packed DRCS pixel grid into an RGBA
//! bitmap, with an optional stroke halo.

use arib_caption_core::{CharStyle, ColorRgba, Drcs, Image};

use crate::canvas;

/// Failure modes of [`draw_drcs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DrcsError {
    #[error("DRCS pattern has no pixels")]
    EmptyPixels,
    #[error("target dimensions must be positive")]
    ZeroDimensions,
}

/// Reads the `depth_bits`-wide, MSB-first, big-endian-packed pixel value at
/// `(sx, sy)` in a `width`-wide DRCS grid.
fn sample(pixels: &[u8], width: u32, depth_bits: u32, sx: u32, sy: u32) -> u32 {
    let bit_index = (sy * width + sx) * depth_bits;
    let mut byte_index = (bit_index / 8) as usize;
    let mut bit_offset = bit_index % 8;
    let mut remaining = depth_bits;
    let mut value = 0u32;

    while remaining > 0 {
        let byte = *pixels.get(byte_index).unwrap_or(&0) as u32;
        let bits_in_byte = 8 - bit_offset;
        let take = remaining.min(bits_in_byte);
        let shift = bits_in_byte - take;
        let mask = (1u32 << take) - 1;
        let bits = (byte >> shift) & mask;
        value = (value << take) | bits;
        remaining -= take;
        bit_offset += take;
        if bit_offset >= 8 {
            bit_offset = 0;
            byte_index += 1;
        }
    }
    value
}

/// Rescales `drcs` into a `target_w x target_h` RGBA bitmap colored `fg`,
/// with per-pixel alpha derived from the source grey level.
fn rasterize_fill(drcs: &Drcs, fg: ColorRgba, target_w: i32, target_h: i32) -> Image {
    let mut out = Image::new(target_w, target_h);
    let max_level = (drcs.depth.max(2) - 1) as f32;

    for dy in 0..target_h {
        let sy = ((dy as f32 * drcs.height as f32) / target_h as f32) as u32;
        let sy = sy.min(drcs.height.saturating_sub(1));
        for dx in 0..target_w {
            let sx = ((dx as f32 * drcs.width as f32) / target_w as f32) as u32;
            let sx = sx.min(drcs.width.saturating_sub(1));

            let value = sample(&drcs.pixels, drcs.width, drcs.depth_bits, sx, sy);
            let grey = ((255.0 * value as f32) / max_level).floor() as u32;
            let alpha = (grey * fg.a as u32 / 255) as u8;

            let idx = (dy as usize * out.stride as usize) + dx as usize * 4;
            out.bitmap[idx] = fg.r;
            out.bitmap[idx + 1] = fg.g;
            out.bitmap[idx + 2] = fg.b;
            out.bitmap[idx + 3] = alpha;
        }
    }
    out
}

/// Rasterizes `drcs` at `target_w x target_h` directly onto `dst` at
/// `(x, y)`, coloring with `style`'s text color and optionally compositing a
/// stroke halo first.
#[allow(clippy::too_many_arguments)]
pub fn draw_drcs(
    drcs: &Drcs,
    style: CharStyle,
    fg: ColorRgba,
    stroke_color: ColorRgba,
    stroke_width: i32,
    target_w: i32,
    target_h: i32,
    dst: &mut Image,
    x: i32,
    y: i32,
) -> Result<(), DrcsError> {
    if drcs.pixels.is_empty() || drcs.width == 0 || drcs.height == 0 {
        return Err(DrcsError::EmptyPixels);
    }
    if target_w <= 0 || target_h <= 0 {
        return Err(DrcsError::ZeroDimensions);
    }

    if style.contains(CharStyle::STROKE) {
        let stroke_bitmap = rasterize_fill(drcs, stroke_color, target_w, target_h);
        for (ox, oy) in [
            (-stroke_width, 0),
            (stroke_width, 0),
            (0, -stroke_width),
            (0, stroke_width),
        ] {
            canvas::draw_bitmap(dst, &stroke_bitmap, x + ox, y + oy);
        }
    }

    let fill_bitmap = rasterize_fill(drcs, fg, target_w, target_h);
    canvas::draw_bitmap(dst, &fill_bitmap, x, y);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_drcs(width: u32, height: u32, depth_bits: u32, value: u32) -> Drcs {
        let total_bits = width as usize * height as usize * depth_bits as usize;
        let mut pixels = vec![0u8; total_bits.div_ceil(8)];
        for py in 0..height {
            for px in 0..width {
                set_bits(&mut pixels, width, depth_bits, px, py, value);
            }
        }
        Drcs {
            width,
            height,
            depth: 1 << depth_bits,
            depth_bits,
            pixels,
            md5: [0; 16],
            alternative_text: String::new(),
            alternative_ucs4: 0,
        }
    }

    fn set_bits(pixels: &mut [u8], width: u32, depth_bits: u32, x: u32, y: u32, value: u32) {
        let bit_index = (y * width + x) * depth_bits;
        for b in 0..depth_bits {
            let bit = (value >> (depth_bits - 1 - b)) & 1;
            let idx = bit_index + b;
            let byte_index = (idx / 8) as usize;
            let bit_offset = 7 - (idx % 8);
            if bit == 1 {
                pixels[byte_index] |= 1 << bit_offset;
            }
        }
    }

    #[test]
    fn max_value_is_fully_opaque() {
        let drcs = solid_drcs(2, 2, 2, 3); // depth=4, max level
        let mut dst = Image::new(4, 4);
        draw_drcs(
            &drcs,
            CharStyle::empty(),
            ColorRgba::opaque(10, 20, 30),
            ColorRgba::TRANSPARENT,
            0,
            4,
            4,
            &mut dst,
            0,
            0,
        )
        .unwrap();
        assert_eq!(dst.bitmap[3], 255); // alpha of pixel (0,0)
    }

    #[test]
    fn zero_value_is_transparent() {
        let drcs = solid_drcs(2, 2, 2, 0);
        let mut dst = Image::new(4, 4);
        draw_drcs(
            &drcs,
            CharStyle::empty(),
            ColorRgba::opaque(10, 20, 30),
            ColorRgba::TRANSPARENT,
            0,
            4,
            4,
            &mut dst,
            0,
            0,
        )
        .unwrap();
        assert_eq!(dst.bitmap[3], 0);
    }

    #[test]
    fn empty_pixels_is_error() {
        let drcs = Drcs {
            width: 4,
            height: 4,
            depth: 4,
            depth_bits: 2,
            pixels: Vec::new(),
            md5: [0; 16],
            alternative_text: String::new(),
            alternative_ucs4: 0,
        };
        let mut dst = Image::new(4, 4);
        assert_eq!(
            draw_drcs(&drcs, CharStyle::empty(), ColorRgba::TRANSPARENT, ColorRgba::TRANSPARENT, 0, 4, 4, &mut dst, 0, 0),
            Err(DrcsError::EmptyPixels)
        );
    }
}
