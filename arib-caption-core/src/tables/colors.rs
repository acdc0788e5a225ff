//! The 8-palette, 16-color-per-palette CLUT selected by `COL`/`BKF`..`WHF`/`ORN`.
//!
//! Palette 0 holds the eight named colors (`BKF`..`WHF`), a transparent
//! entry, and seven darker blends. Palettes 1-3 continue the same 128-entry
//! gradient sequence at full alpha; palettes 4-7 repeat that same 128-entry
//! sequence at half alpha (0x80), used for the "half-tone" CSI forms. The
//! table is transcribed verbatim, not synthesized from a formula — two
//! entries (palette 6 index 5, palette 7 index 7) carry a green channel of 9
//! rather than the otherwise-expected 85; this is a quirk of the reference
//! CLUT, not a transcription error, and is preserved here.

use crate::color::ColorRgba;

const fn c(r: u8, g: u8, b: u8, a: u8) -> ColorRgba {
    ColorRgba::new(r, g, b, a)
}

/// The full 8x16 CLUT selected by `COL`'s palette bits.
pub const CLUT: [[ColorRgba; 16]; 8] = [
    [
        c(0, 0, 0, 255),
        c(255, 0, 0, 255),
        c(0, 255, 0, 255),
        c(255, 255, 0, 255),
        c(0, 0, 255, 255),
        c(255, 0, 255, 255),
        c(0, 255, 255, 255),
        c(255, 255, 255, 255),
        c(0, 0, 0, 0),
        c(170, 0, 0, 255),
        c(0, 170, 0, 255),
        c(170, 170, 0, 255),
        c(0, 0, 170, 255),
        c(170, 0, 170, 255),
        c(0, 170, 170, 255),
        c(170, 170, 170, 255),
    ],
    [
        c(0, 0, 85, 255),
        c(0, 85, 0, 255),
        c(0, 85, 85, 255),
        c(0, 85, 170, 255),
        c(0, 85, 255, 255),
        c(0, 170, 85, 255),
        c(0, 170, 255, 255),
        c(0, 255, 85, 255),
        c(0, 255, 170, 255),
        c(85, 0, 0, 255),
        c(85, 0, 85, 255),
        c(85, 0, 170, 255),
        c(85, 0, 255, 255),
        c(85, 85, 0, 255),
        c(85, 85, 85, 255),
        c(85, 85, 170, 255),
    ],
    [
        c(85, 85, 255, 255),
        c(85, 170, 0, 255),
        c(85, 170, 85, 255),
        c(85, 170, 170, 255),
        c(85, 170, 255, 255),
        c(85, 255, 0, 255),
        c(85, 255, 85, 255),
        c(85, 255, 170, 255),
        c(85, 255, 255, 255),
        c(170, 0, 85, 255),
        c(170, 0, 255, 255),
        c(170, 85, 0, 255),
        c(170, 85, 85, 255),
        c(170, 85, 170, 255),
        c(170, 85, 255, 255),
        c(170, 170, 85, 255),
    ],
    [
        c(170, 170, 255, 255),
        c(170, 255, 0, 255),
        c(170, 255, 85, 255),
        c(170, 255, 170, 255),
        c(170, 255, 255, 255),
        c(255, 0, 85, 255),
        c(255, 0, 170, 255),
        c(255, 85, 0, 255),
        c(255, 85, 85, 255),
        c(255, 85, 170, 255),
        c(255, 85, 255, 255),
        c(255, 170, 0, 255),
        c(255, 170, 85, 255),
        c(255, 170, 170, 255),
        c(255, 170, 255, 255),
        c(255, 255, 85, 255),
    ],
    [
        c(255, 255, 170, 255),
        c(0, 0, 0, 128),
        c(255, 0, 0, 128),
        c(0, 255, 0, 128),
        c(255, 255, 0, 128),
        c(0, 0, 255, 128),
        c(255, 0, 255, 128),
        c(0, 255, 255, 128),
        c(255, 255, 255, 128),
        c(170, 0, 0, 128),
        c(0, 170, 0, 128),
        c(170, 170, 0, 128),
        c(0, 0, 170, 128),
        c(170, 0, 170, 128),
        c(0, 170, 170, 128),
        c(170, 170, 170, 128),
    ],
    [
        c(0, 0, 85, 128),
        c(0, 85, 0, 128),
        c(0, 85, 85, 128),
        c(0, 85, 170, 128),
        c(0, 85, 255, 128),
        c(0, 170, 85, 128),
        c(0, 170, 255, 128),
        c(0, 255, 85, 128),
        c(0, 255, 170, 128),
        c(85, 0, 0, 128),
        c(85, 0, 85, 128),
        c(85, 0, 170, 128),
        c(85, 0, 255, 128),
        c(85, 85, 0, 128),
        c(85, 85, 85, 128),
        c(85, 85, 170, 128),
    ],
    [
        c(85, 85, 255, 128),
        c(85, 170, 0, 128),
        c(85, 170, 85, 128),
        c(85, 170, 170, 128),
        c(85, 170, 255, 128),
        c(85, 255, 9, 128),
        c(85, 255, 85, 128),
        c(85, 255, 170, 128),
        c(85, 255, 255, 128),
        c(170, 0, 85, 128),
        c(170, 0, 255, 128),
        c(170, 85, 0, 128),
        c(170, 85, 85, 128),
        c(170, 85, 170, 128),
        c(170, 85, 255, 128),
        c(170, 170, 85, 128),
    ],
    [
        c(170, 170, 255, 128),
        c(170, 255, 0, 128),
        c(170, 255, 85, 128),
        c(170, 255, 170, 128),
        c(170, 255, 255, 128),
        c(255, 0, 85, 128),
        c(255, 0, 170, 128),
        c(255, 85, 9, 128),
        c(255, 85, 85, 128),
        c(255, 85, 170, 128),
        c(255, 85, 255, 128),
        c(255, 170, 0, 128),
        c(255, 170, 85, 128),
        c(255, 170, 170, 128),
        c(255, 170, 255, 128),
        c(255, 255, 85, 128),
    ],
];

/// Default text color: palette 0, index 7 (white).
pub const DEFAULT_TEXT_COLOR: ColorRgba = CLUT[0][7];

/// Default background color: palette 0, index 8 (transparent).
/// Matches `kB24ColorCLUT[0][8]`.
pub const DEFAULT_BACK_COLOR: ColorRgba = CLUT[0][8];

/// Looks up `CLUT[palette][color_index]`, clamping out-of-range indices.
pub fn lookup(palette: u8, color_index: u8) -> ColorRgba {
    let p = (palette as usize).min(CLUT.len() - 1);
    let idx = (color_index as usize).min(15);
    CLUT[p][idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_0_basic_colors() {
        assert_eq!(lookup(0, 0), ColorRgba::opaque(0, 0, 0));
        assert_eq!(lookup(0, 1), ColorRgba::opaque(255, 0, 0));
        assert_eq!(lookup(0, 7), ColorRgba::opaque(255, 255, 255));
    }

    #[test]
    fn palette_0_transparent_slot() {
        assert_eq!(lookup(0, 8), ColorRgba::TRANSPARENT);
        assert_eq!(DEFAULT_BACK_COLOR, ColorRgba::TRANSPARENT);
    }

    #[test]
    fn half_tone_palettes_carry_half_alpha() {
        let base = lookup(1, 1);
        let halved = lookup(5, 1);
        assert_eq!(halved.r, base.r);
        assert_eq!(halved.a, 128);
    }

    #[test]
    fn out_of_range_indices_clamp() {
        assert_eq!(lookup(200, 200), lookup(7, 15));
    }
}
