//! ARIB STD-B24 / ABNT NBR 15606-1 closed caption data model and decoder.
//!
//! This crate turns the PES payload of an ARIB/ABNT closed-caption elementary
//! stream into a structured [`Caption`] value: positioned glyphs grouped into
//! regions, carrying color, style, DRCS and ruby-annotation information. It
//! does not rasterize anything; see `arib-caption-render` for that.

pub mod caption;
pub mod color;
pub mod context;
pub mod decoder;
pub mod image;
pub mod tables;

pub use caption::{
    Caption, CaptionChar, CaptionCharType, CaptionFlags, CaptionRegion, CaptionType, CharStyle,
    Drcs, EnclosureStyle, LanguageCode, LanguageId, Profile, DURATION_INDEFINITE, PTS_NOPTS,
};
pub use color::ColorRgba;
pub use context::{Context, LogLevel, Logger, NullLogger};
pub use decoder::{DecodeStatus, Decoder, EncodingScheme};
pub use image::{Image, PixelFormat};

/// Result type for `arib-caption-core` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding a caption PES payload.
///
/// These cover structural failures in the PES/data-group/data-unit framing
/// and in the control-code interpreter. A malformed control sequence never
/// unwinds; it is always reported through this type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("PES payload too short: {len} bytes, need at least {need}")]
    PesTooShort { len: usize, need: usize },

    #[error("data_identifier 0x{found:02X} does not match expected caption type 0x{expected:02X}")]
    DataIdentifierMismatch { found: u8, expected: u8 },

    #[error("invalid private_stream_id: 0x{0:02X}")]
    InvalidPrivateStreamId(u8),

    #[error("data_group framing truncated: need {need} bytes from offset {offset}")]
    DataGroupTruncated { offset: usize, need: usize },

    #[error("caption management data malformed: {0}")]
    ManagementDataMalformed(&'static str),

    #[error("caption statement data malformed: {0}")]
    StatementDataMalformed(&'static str),

    #[error("data unit truncated at offset {offset}")]
    DataUnitTruncated { offset: usize },

    #[error("invalid data unit separator 0x{0:02X}, expected 0x1F")]
    InvalidUnitSeparator(u8),

    #[error("DRCS data truncated while parsing font {font_index} of code {code_index}")]
    DrcsTruncated { code_index: u8, font_index: u8 },

    #[error("control code parse failure for byte 0x{byte:02X} at offset {offset}")]
    ControlCodeParseFailure { byte: u8, offset: usize },

    #[error("unknown graphic-set designator final byte 0x{0:02X}")]
    UnknownDesignator(u8),

    #[error("invalid number of languages in caption management data: {0}")]
    InvalidLanguageCount(u8),
}
