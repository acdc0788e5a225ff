//! The C7 region renderer: rasterizes one [`CaptionRegion`] into an RGBA
//! [`Image`], orchestrating the canvas (C2), text renderer (C4) and DRCS
//! rasterizer (C5).

use std::collections::HashMap;

use arib_caption_core::{CaptionCharType, CaptionRegion, ColorRgba, Drcs, EnclosureStyle, Image};

use crate::canvas::{self, Rect};
use crate::drcs;
use crate::font::{FallbackPolicy, TextRenderer, TextRendererError, Underline};

/// Failure modes of [`RegionRenderer::render_region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("a region character needs a font that isn't available")]
    FontNotFound,
    #[error("a region character's codepoint has no glyph in any available font")]
    CodePointNotFound,
    #[error("region rasterization produced a bitmap smaller than 3x3")]
    ImageTooSmall,
    #[error("region rasterization failed")]
    Other,
}

impl RegionError {
    /// Ranks `FontNotFound > CodePointNotFound > Other`, per the "worst
    /// error observed" rule a region surfaces when every character in it
    /// failed to render.
    fn severity(self) -> u8 {
        match self {
            RegionError::FontNotFound => 2,
            RegionError::CodePointNotFound => 1,
            RegionError::Other => 0,
            RegionError::ImageTooSmall => 0,
        }
    }

    fn worse(self, other: RegionError) -> RegionError {
        if self.severity() >= other.severity() {
            self
        } else {
            other
        }
    }
}

impl From<TextRendererError> for RegionError {
    fn from(e: TextRendererError) -> Self {
        match e {
            TextRendererError::FontNotFound => RegionError::FontNotFound,
            TextRendererError::CodePointNotFound => RegionError::CodePointNotFound,
            TextRendererError::Other(_) => RegionError::Other,
        }
    }
}

/// Rasterizes [`CaptionRegion`]s against a fixed plane-to-pixel scale.
pub struct RegionRenderer<'a> {
    text_renderer: &'a mut dyn TextRenderer,
    plane_width: i32,
    plane_height: i32,
    caption_area: Rect,
    pub stroke_width: i32,
    pub replace_drcs: bool,
    pub force_stroke_text: bool,
    pub force_no_background: bool,
}

impl<'a> RegionRenderer<'a> {
    pub fn new(
        text_renderer: &'a mut dyn TextRenderer,
        plane_width: i32,
        plane_height: i32,
        caption_area: Rect,
    ) -> Self {
        Self {
            text_renderer,
            plane_width,
            plane_height,
            caption_area,
            stroke_width: 1,
            replace_drcs: true,
            force_stroke_text: false,
            force_no_background: false,
        }
    }

    fn x_mag(&self) -> f64 {
        self.caption_area.width as f64 / self.plane_width as f64
    }

    fn y_mag(&self) -> f64 {
        self.caption_area.height as f64 / self.plane_height as f64
    }

    fn scale_x(&self, v: i32) -> i32 {
        ((v as f64) * self.x_mag()).floor() as i32
    }

    fn scale_y(&self, v: i32) -> i32 {
        ((v as f64) * self.y_mag()).floor() as i32
    }

    fn scale_width(&self, w: i32, x0: i32) -> i32 {
        self.scale_x(x0 + w) - self.scale_x(x0)
    }

    fn scale_height(&self, h: i32, y0: i32) -> i32 {
        self.scale_y(y0 + h) - self.scale_y(y0)
    }

    /// Rasterizes `region` into a freshly-allocated image. The returned
    /// image's `dst_x`/`dst_y` are relative to the plane's origin; the
    /// renderer core adds `caption_area`'s origin to place it in the frame.
    pub fn render_region(
        &mut self,
        region: &CaptionRegion,
        drcs_map: &HashMap<u32, Drcs>,
    ) -> Result<Image, RegionError> {
        let out_w = self.scale_width(region.width as i32, region.x);
        let out_h = self.scale_height(region.height as i32, region.y);
        if out_w < 3 || out_h < 3 {
            return Err(RegionError::ImageTooSmall);
        }

        let mut bitmap = Image::new(out_w, out_h);
        self.text_renderer.begin_draw(&mut bitmap);

        let mut successes = 0usize;
        let mut worst_error: Option<RegionError> = None;

        for ch in &region.chars {
            let cell_x = self.scale_x(ch.x) - self.scale_x(region.x);
            let cell_y = self.scale_y(ch.y) - self.scale_y(region.y);
            let cell_w = self.scale_width(ch.section_width() as i32, ch.x);
            let cell_h = self.scale_height(ch.section_height() as i32, ch.y);
            let cell = Rect::new(cell_x, cell_y, cell_w, cell_h);

            if !self.force_no_background {
                canvas::draw_rect(&mut bitmap, ch.back_color, cell);
            }
            self.draw_enclosure(&mut bitmap, ch.enclosure_style, ch.text_color, cell);

            let glyph_w = self.scale_width(ch.char_width as i32, ch.x);
            let glyph_h = self.scale_height(ch.char_height as i32, ch.y);
            let spacing_x = self.scale_x(ch.char_horizontal_spacing as i32) / 2;
            let spacing_y = self.scale_y(ch.char_vertical_spacing as i32) / 2;
            let glyph_x = cell_x + spacing_x;
            let glyph_y = cell_y + spacing_y;
            let aspect = (ch.char_width as f32 * ch.char_horizontal_scale)
                / (ch.char_height as f32 * ch.char_vertical_scale).max(1.0);

            let mut style = ch.style;
            let mut stroke_color = ch.stroke_color;
            if self.force_stroke_text && !style.contains(arib_caption_core::CharStyle::STROKE) {
                style |= arib_caption_core::CharStyle::STROKE;
                stroke_color = ch.back_color;
            }

            let underline = style
                .contains(arib_caption_core::CharStyle::UNDERLINE)
                .then_some(Underline { start_x: cell_x, width: cell_w });

            let result = match ch.char_type {
                CaptionCharType::Text => self.draw_text_char(
                    &mut bitmap,
                    glyph_x,
                    glyph_y,
                    ch.codepoint,
                    ch.pua_codepoint,
                    style,
                    ch.text_color,
                    stroke_color,
                    glyph_w,
                    glyph_h,
                    aspect,
                    underline,
                ),
                CaptionCharType::DrcsReplaced if self.replace_drcs => {
                    match self.draw_text_char(
                        &mut bitmap,
                        glyph_x,
                        glyph_y,
                        ch.codepoint,
                        0,
                        style,
                        ch.text_color,
                        stroke_color,
                        glyph_w,
                        glyph_h,
                        aspect,
                        underline,
                    ) {
                        Ok(()) => Ok(()),
                        Err(_) => self.draw_drcs_char(&mut bitmap, drcs_map, ch.drcs_code, style, ch.text_color, stroke_color, glyph_w, glyph_h, glyph_x, glyph_y),
                    }
                }
                CaptionCharType::DrcsReplaced | CaptionCharType::Drcs => self.draw_drcs_char(
                    &mut bitmap, drcs_map, ch.drcs_code, style, ch.text_color, stroke_color, glyph_w, glyph_h, glyph_x, glyph_y,
                ),
            };

            match result {
                Ok(()) => successes += 1,
                Err(e) => worst_error = Some(worst_error.map(|w| w.worse(e)).unwrap_or(e)),
            }
        }

        self.text_renderer.end_draw(&mut bitmap);

        if !region.chars.is_empty() && successes == 0 {
            return Err(worst_error.unwrap_or(RegionError::Other));
        }

        let mut bitmap = bitmap;
        bitmap.dst_x = self.scale_x(region.x);
        bitmap.dst_y = self.scale_y(region.y);
        Ok(bitmap)
    }

    fn draw_enclosure(&self, bitmap: &mut Image, style: EnclosureStyle, color: ColorRgba, cell: Rect) {
        if style.contains(EnclosureStyle::TOP) {
            canvas::draw_rect(bitmap, color, Rect::new(cell.x, cell.y, cell.width, 1));
        }
        if style.contains(EnclosureStyle::BOTTOM) {
            canvas::draw_rect(bitmap, color, Rect::new(cell.x, cell.y + cell.height - 1, cell.width, 1));
        }
        if style.contains(EnclosureStyle::LEFT) {
            canvas::draw_rect(bitmap, color, Rect::new(cell.x, cell.y, 1, cell.height));
        }
        if style.contains(EnclosureStyle::RIGHT) {
            canvas::draw_rect(bitmap, color, Rect::new(cell.x + cell.width - 1, cell.y, 1, cell.height));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text_char(
        &mut self,
        bitmap: &mut Image,
        x: i32,
        y: i32,
        codepoint: u32,
        pua_codepoint: u32,
        style: arib_caption_core::CharStyle,
        text_color: ColorRgba,
        stroke_color: ColorRgba,
        w: i32,
        h: i32,
        aspect: f32,
        underline: Option<Underline>,
    ) -> Result<(), RegionError> {
        let stroke_width = if style.contains(arib_caption_core::CharStyle::STROKE) {
            self.scale_x(self.stroke_width)
        } else {
            0
        };

        if pua_codepoint != 0 {
            match self.text_renderer.draw_char(
                bitmap, x, y, codepoint, style, text_color, stroke_color, stroke_width, w, h, aspect,
                underline, FallbackPolicy::FailOnCodePointNotFound,
            ) {
                Ok(()) => return Ok(()),
                Err(TextRendererError::CodePointNotFound) => {}
                Err(e) => return Err(e.into()),
            }
            match self.text_renderer.draw_char(
                bitmap, x, y, pua_codepoint, style, text_color, stroke_color, stroke_width, w, h, aspect,
                underline, FallbackPolicy::Auto,
            ) {
                Ok(()) => return Ok(()),
                Err(TextRendererError::CodePointNotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.text_renderer
            .draw_char(
                bitmap, x, y, codepoint, style, text_color, stroke_color, stroke_width, w, h, aspect,
                underline, FallbackPolicy::Auto,
            )
            .map_err(Into::into)
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_drcs_char(
        &self,
        bitmap: &mut Image,
        drcs_map: &HashMap<u32, Drcs>,
        drcs_code: u32,
        style: arib_caption_core::CharStyle,
        fg: ColorRgba,
        stroke_color: ColorRgba,
        w: i32,
        h: i32,
        x: i32,
        y: i32,
    ) -> Result<(), RegionError> {
        let drcs = match drcs_map.get(&drcs_code) {
            Some(d) => d,
            None => return Ok(()), // missing drcs_code is logged upstream and skipped
        };
        drcs::draw_drcs(drcs, style, fg, stroke_color, self.scale_x(self.stroke_width), w, h, bitmap, x, y)
            .map_err(|_| RegionError::Other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::NullTextRenderer;
    use arib_caption_core::{CaptionChar, CaptionCharType, CharStyle};

    fn char_at(x: i32, y: i32, codepoint: u32) -> CaptionChar {
        CaptionChar {
            char_type: CaptionCharType::Text,
            codepoint,
            pua_codepoint: 0,
            text: String::new(),
            drcs_code: 0,
            x,
            y,
            char_width: 36,
            char_height: 36,
            char_horizontal_spacing: 4,
            char_vertical_spacing: 24,
            char_horizontal_scale: 1.0,
            char_vertical_scale: 1.0,
            text_color: ColorRgba::opaque(255, 255, 255),
            back_color: ColorRgba::TRANSPARENT,
            stroke_color: ColorRgba::TRANSPARENT,
            style: CharStyle::empty(),
            enclosure_style: EnclosureStyle::empty(),
        }
    }

    #[test]
    fn image_too_small_is_reported() {
        let mut tr = NullTextRenderer;
        let mut renderer = RegionRenderer::new(&mut tr, 960, 540, Rect::new(0, 0, 1, 1));
        let mut region = CaptionRegion::new(0, 0, 40, false);
        region.width = 40;
        region.chars.push(char_at(0, 0, 0x41));
        assert_eq!(renderer.render_region(&region, &HashMap::new()), Err(RegionError::ImageTooSmall));
    }

    #[test]
    fn all_chars_failing_surfaces_worst_error() {
        let mut tr = NullTextRenderer;
        let mut renderer = RegionRenderer::new(&mut tr, 960, 540, Rect::new(0, 0, 1920, 1080));
        let mut region = CaptionRegion::new(0, 0, 40, false);
        region.width = 40;
        region.chars.push(char_at(0, 0, 0x41));
        let err = renderer.render_region(&region, &HashMap::new()).unwrap_err();
        assert_eq!(err, RegionError::CodePointNotFound);
    }

    #[test]
    fn severity_orders_font_not_found_above_codepoint_not_found() {
        assert_eq!(RegionError::FontNotFound.worse(RegionError::CodePointNotFound), RegionError::FontNotFound);
        assert_eq!(RegionError::CodePointNotFound.worse(RegionError::FontNotFound), RegionError::FontNotFound);
    }
}
