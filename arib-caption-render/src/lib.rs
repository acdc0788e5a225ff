//! Rasterizer for decoded ARIB STD-B24 / ABNT NBR 15606-1 captions.
//!
//! `arib-caption-core` turns a PES payload into a structured [`Caption`];
//! this crate turns a [`Caption`] into positioned RGBA [`Image`]s, ready to
//! be composited over a video frame. [`Renderer`] is the entry point: feed
//! it decoded captions with [`Renderer::append_caption`], then query the
//! caption visible at a given pts with [`Renderer::render`].
//!
//! Font lookup ([`FontProvider`]) and glyph shaping ([`TextRenderer`]) are
//! pluggable traits; no platform backend ships here.

pub mod canvas;
pub mod drcs;
pub mod font;
pub mod region;
pub mod renderer;

pub use arib_caption_core::Caption;
pub use canvas::{blend_over, Rect};
pub use drcs::{draw_drcs, DrcsError};
pub use font::{
    FaceInfo, FallbackPolicy, FontProvider, FontProviderError, NullFontProvider, NullTextRenderer,
    TextRenderer, TextRendererError, Underline,
};
pub use region::{RegionError, RegionRenderer};
pub use renderer::{RenderResult, RenderStatus, Renderer, StoragePolicy};
