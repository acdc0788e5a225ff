//! The C3/C4 pluggable collaborators: platform font lookup and glyph
//! rasterization. Only the trait surface lives here -- no concrete
//! Fontconfig/CoreText/DirectWrite/Android/GDI backend is in scope.
//!
//! [`NullFontProvider`]/[`NullTextRenderer`] are test scaffolding: they let
//! [`crate::renderer::Renderer`] and [`crate::region::RegionRenderer`] be
//! exercised without a real font backend. They are not a platform backend
//! and do not count against the non-goal above.

use arib_caption_core::{CharStyle, ColorRgba, Image};

/// A resolved font face, as returned by [`FontProvider::lookup`].
///
/// `backend_handle` is opaque to this crate: it is produced by whatever
/// concrete `FontProvider` implementation is in use and handed back
/// unexamined to the matching `TextRenderer`.
#[derive(Debug, Clone, Default)]
pub struct FaceInfo {
    pub family_name: String,
    pub postscript_name: String,
    pub filename: String,
    /// Face index within `filename`. `-1` means "match by postscript name
    /// instead of index" (used for memory-resident/installed collections).
    pub face_index: i32,
    pub font_bytes: Option<Vec<u8>>,
    pub provider_tag: u32,
    pub backend_handle: Option<usize>,
}

/// Failure modes a [`FontProvider`] can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FontProviderError {
    #[error("no font matches the requested family")]
    FontNotFound,
    #[error("matched font does not carry the requested codepoint")]
    CodePointMissing,
    #[error("font provider error: {0}")]
    Other(String),
}

/// Platform font lookup collaborator (C3). The core never interprets font
/// file bytes; it only stores the opaque [`FaceInfo`] a provider returns and
/// hands it to a matching [`TextRenderer`].
pub trait FontProvider: Send {
    fn lookup(&mut self, family_name: &str, codepoint: Option<u32>) -> Result<FaceInfo, FontProviderError>;
    fn set_language(&mut self, iso6392_code: u32);
}

/// Always reports [`FontProviderError::FontNotFound`]. Lets the renderer
/// core and region renderer be exercised in tests with no real font backend.
#[derive(Debug, Default)]
pub struct NullFontProvider;

impl FontProvider for NullFontProvider {
    fn lookup(&mut self, _family_name: &str, _codepoint: Option<u32>) -> Result<FaceInfo, FontProviderError> {
        Err(FontProviderError::FontNotFound)
    }

    fn set_language(&mut self, _iso6392_code: u32) {}
}

/// Failure modes a [`TextRenderer`] can report from [`TextRenderer::draw_char`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TextRendererError {
    #[error("no font available to draw this character")]
    FontNotFound,
    #[error("matched font lacks a glyph for this codepoint")]
    CodePointNotFound,
    #[error("text renderer error: {0}")]
    Other(String),
}

/// How [`TextRenderer::draw_char`] should react to a codepoint the matched
/// font can't shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Try the configured font family list, falling back to any installed
    /// font that carries the codepoint.
    #[default]
    Auto,
    /// Report [`TextRendererError::CodePointNotFound`] instead of falling
    /// back to another font.
    FailOnCodePointNotFound,
}

/// Underline extent in bitmap-local coordinates, present only when the char
/// being drawn carries [`CharStyle::UNDERLINE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Underline {
    pub start_x: i32,
    pub width: i32,
}

/// Platform text-shaping/rasterization collaborator (C4).
///
/// `begin_draw`/`end_draw` bracket a batch of `draw_char` calls against one
/// destination bitmap, mirroring the reference's per-frame drawing context;
/// this crate keeps the destination as an explicit `&mut Image` parameter
/// on every call rather than an opaque context value, so the trait stays
/// object-safe behind `Box<dyn TextRenderer>`.
pub trait TextRenderer: Send {
    fn begin_draw(&mut self, bitmap: &mut Image);

    #[allow(clippy::too_many_arguments)]
    fn draw_char(
        &mut self,
        bitmap: &mut Image,
        x: i32,
        y: i32,
        codepoint: u32,
        style: CharStyle,
        text_color: ColorRgba,
        stroke_color: ColorRgba,
        stroke_width: i32,
        char_width: i32,
        char_height: i32,
        aspect_ratio: f32,
        underline: Option<Underline>,
        fallback_policy: FallbackPolicy,
    ) -> Result<(), TextRendererError>;

    fn end_draw(&mut self, bitmap: &mut Image);

    fn set_language(&mut self, iso6392_code: u32);
    fn set_font_family(&mut self, family: &[String]);
}

/// Always reports [`TextRendererError::CodePointNotFound`]. Test scaffolding,
/// see the module doc.
#[derive(Debug, Default)]
pub struct NullTextRenderer;

impl TextRenderer for NullTextRenderer {
    fn begin_draw(&mut self, _bitmap: &mut Image) {}

    fn draw_char(
        &mut self,
        _bitmap: &mut Image,
        _x: i32,
        _y: i32,
        _codepoint: u32,
        _style: CharStyle,
        _text_color: ColorRgba,
        _stroke_color: ColorRgba,
        _stroke_width: i32,
        _char_width: i32,
        _char_height: i32,
        _aspect_ratio: f32,
        _underline: Option<Underline>,
        _fallback_policy: FallbackPolicy,
    ) -> Result<(), TextRendererError> {
        Err(TextRendererError::CodePointNotFound)
    }

    fn end_draw(&mut self, _bitmap: &mut Image) {}

    fn set_language(&mut self, _iso6392_code: u32) {}
    fn set_font_family(&mut self, _family: &[String]) {}
}
