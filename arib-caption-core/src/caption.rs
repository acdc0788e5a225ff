//! The decoded caption value tree: regions of positioned, styled glyphs.

use std::collections::HashMap;

use crate::color::ColorRgba;

/// PTS sentinel meaning "no presentation timestamp".
pub const PTS_NOPTS: i64 = i64::MIN;

/// `wait_duration` sentinel meaning "stays on screen until superseded".
pub const DURATION_INDEFINITE: i64 = i64::MAX;

/// An ISO 639-2 language code packed as `(c0<<16)|(c1<<8)|c2`, e.g.
/// `LanguageCode::three_cc(*b"jpn")`. A packed `u32` instead of `[u8; 3]`
/// so callers compare/hash/pass it as one value, matching the reference
/// library's `ThreeCC`-style packing instead of carrying three loose bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LanguageCode(pub u32);

impl LanguageCode {
    /// No language code present / unknown.
    pub const UNKNOWN: LanguageCode = LanguageCode(0);

    /// Packs a 3-character ISO 639-2 code, e.g. `LanguageCode::three_cc(*b"jpn")`.
    pub const fn three_cc(code: [u8; 3]) -> Self {
        Self(((code[0] as u32) << 16) | ((code[1] as u32) << 8) | (code[2] as u32))
    }

    /// Unpacks back to the 3 raw ISO 639-2 bytes.
    pub const fn to_bytes(self) -> [u8; 3] {
        [
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        ]
    }
}

/// Caption profile, selects the default writing-format table and region size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// ARIB STD-B24 Profile A (digital terrestrial / BS / CS broadcast captions).
    ProfileA,
    /// ARIB STD-B24 Profile C (one-seg mobile broadcast captions).
    ProfileC,
}

/// Which of up to two simultaneous caption languages a decoder instance tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageId {
    First,
    Second,
}

/// Caption vs. superimpose (teletext-like "control track") stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionType {
    Caption,
    Superimpose,
}

impl CaptionType {
    /// The PES `data_identifier` byte this caption type's elementary stream
    /// carries.
    pub fn data_identifier(self) -> u8 {
        match self {
            CaptionType::Caption => 0x80,
            CaptionType::Superimpose => 0x81,
        }
    }
}

/// What produced a [`CaptionChar`]'s glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionCharType {
    /// An ordinary Unicode codepoint from a standard graphic set.
    Text,
    /// A DRCS glyph with no textual substitute; render its bitmap as-is.
    Drcs,
    /// A DRCS glyph with a configured Unicode substitute; render as text.
    DrcsReplaced,
}

bitflags::bitflags! {
    /// Per-character rendering style, bit-combinable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CharStyle: u32 {
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const UNDERLINE      = 1 << 2;
        const STROKE        = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Ruby/enclosure decoration drawn around a character cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EnclosureStyle: u32 {
        const TOP    = 1 << 0;
        const RIGHT  = 1 << 1;
        const BOTTOM = 1 << 2;
        const LEFT   = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Per-[`Caption`] flags describing what the decoder run produced.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CaptionFlags: u32 {
        /// The decoder saw a CS (clear screen) control code for this caption.
        const CLEAR_SCREEN  = 1 << 0;
        /// `wait_duration` was set from a TIME control code rather than defaulted.
        const WAIT_DURATION = 1 << 1;
    }
}

/// A Dynamically Redefinable Character Set glyph: a small greyscale bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drcs {
    pub width: u32,
    pub height: u32,
    /// Number of distinct grey levels, `2^depth_bits`.
    pub depth: u32,
    /// Bits per pixel in [`Drcs::pixels`].
    pub depth_bits: u32,
    /// Row-major, `depth_bits`-bit-packed pixel values, MSB-first within a byte.
    pub pixels: Vec<u8>,
    /// Digest of `pixels`, used to look up a known substitution.
    pub md5: [u8; 16],
    /// UTF-8 substitute text, if this DRCS pattern is a known alternative glyph.
    pub alternative_text: String,
    /// Substitute codepoint matching `alternative_text`, or 0 if none.
    pub alternative_ucs4: u32,
}

/// One positioned, styled glyph within a [`CaptionRegion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionChar {
    pub char_type: CaptionCharType,
    /// Primary codepoint. For [`CaptionCharType::Drcs`] this is 0.
    pub codepoint: u32,
    /// PUA fallback codepoint for gaiji without a standard Unicode mapping, or 0.
    pub pua_codepoint: u32,
    /// UTF-8 rendering of this character (may differ from `codepoint` for DRCS
    /// substitutes spanning more than one codepoint).
    pub text: String,
    /// Key into the owning [`Caption::drcs_map`] for DRCS character types.
    pub drcs_code: u32,

    /// Dot position of this character's top-left corner within the plane.
    pub x: i32,
    pub y: i32,

    pub char_width: u32,
    pub char_height: u32,
    pub char_horizontal_spacing: u32,
    pub char_vertical_spacing: u32,
    pub char_horizontal_scale: f32,
    pub char_vertical_scale: f32,

    pub text_color: ColorRgba,
    pub back_color: ColorRgba,
    pub stroke_color: ColorRgba,
    pub style: CharStyle,
    pub enclosure_style: EnclosureStyle,
}

impl CaptionChar {
    /// Width of this character's section, including spacing and scale.
    pub fn section_width(&self) -> u32 {
        (((self.char_width + self.char_horizontal_spacing) as f32) * self.char_horizontal_scale)
            .floor() as u32
    }

    /// Height of this character's section, including spacing and scale.
    pub fn section_height(&self) -> u32 {
        (((self.char_height + self.char_vertical_spacing) as f32) * self.char_vertical_scale)
            .floor() as u32
    }
}

/// A run of [`CaptionChar`]s sharing the same line/section height and packed
/// contiguously along x. Invariant: all chars in a region share
/// `section_height()`, and each char's `x` equals the previous char's
/// `x + section_width()`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptionRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub is_ruby: bool,
    pub chars: Vec<CaptionChar>,
}

impl CaptionRegion {
    pub fn new(x: i32, y: i32, height: u32, is_ruby: bool) -> Self {
        Self {
            x,
            y,
            width: 0,
            height,
            is_ruby,
            chars: Vec::new(),
        }
    }
}

/// One decoded caption event: a snapshot of on-screen text plus timing.
#[derive(Debug, Clone, Default)]
pub struct Caption {
    pub flags: CaptionFlags,
    pub caption_type: Option<CaptionType>,
    /// ISO 639-2 language code, e.g. `LanguageCode::three_cc(*b"jpn")`.
    pub iso6392_language_code: LanguageCode,
    /// Plain-text rendition of the caption (ruby text excluded).
    pub text: String,
    pub regions: Vec<CaptionRegion>,
    /// DRCS glyphs referenced by [`CaptionChar::drcs_code`] from this caption's
    /// `Drcs`-typed characters.
    pub drcs_map: HashMap<u32, Drcs>,

    pub pts: i64,
    /// How long this caption stays valid, or [`DURATION_INDEFINITE`].
    pub wait_duration: i64,

    pub plane_width: u32,
    pub plane_height: u32,

    pub has_builtin_sound: bool,
    pub builtin_sound_id: u8,
}

impl Caption {
    pub fn new() -> Self {
        Self {
            pts: PTS_NOPTS,
            wait_duration: DURATION_INDEFINITE,
            ..Default::default()
        }
    }
}
