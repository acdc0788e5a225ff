//! The C8 renderer core: a caption store keyed by PTS, a result cache, and
//! the query-by-PTS entry point that drives the region renderer (C7) per
//! visible caption.

use std::collections::{BTreeMap, HashMap};

use arib_caption_core::{
    Caption, CaptionType, ColorRgba, Context, Image, LanguageCode, DURATION_INDEFINITE, PTS_NOPTS,
};

use crate::canvas::{self, Rect};
use crate::font::{FontProvider, TextRenderer};
use crate::region::{RegionError, RegionRenderer};

/// How the caption store trims itself as captions accumulate, applied right
/// after every [`Renderer::append_caption`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePolicy {
    /// Erase everything strictly before the last-rendered caption's pts.
    Minimum,
    /// Never erase anything.
    Unlimited,
    /// Retain at most the `N` most recent captions by pts.
    UpperLimitCount(usize),
    /// Erase captions more than `D` milliseconds older than the newest pts.
    UpperLimitDuration(i64),
}

/// Outcome of [`Renderer::render`] / [`Renderer::try_render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStatus {
    /// Frame size/margins unset, caption area degenerate, or a region
    /// rasterization failed for reasons other than being too small.
    Error,
    /// No caption is visible at the queried pts, or all its regions were
    /// empty.
    #[default]
    NoImage,
    /// A fresh rasterization was produced.
    GotImage,
    /// The cached images from the last render are still valid.
    GotImageUnchanged,
}

/// Result of a [`Renderer::render`] call. `pts`/`duration` describe the
/// *selected caption*, not the query.
#[derive(Debug, Clone, Default)]
pub struct RenderResult {
    pub status: RenderStatus,
    pub pts: i64,
    pub duration: i64,
    pub images: Vec<Image>,
}

struct RenderCache {
    caption_pts: i64,
    duration: i64,
    images: Vec<Image>,
}

/// ARIB/ABNT closed-caption renderer: resolves the caption visible at a
/// queried pts and rasterizes it into positioned RGBA images.
pub struct Renderer {
    #[allow(dead_code)]
    context: Context,
    #[allow(dead_code)]
    caption_type: CaptionType,

    font_provider: Box<dyn FontProvider>,
    text_renderer: Box<dyn TextRenderer>,

    store: BTreeMap<i64, Caption>,
    storage_policy: StoragePolicy,
    prev_rendered_caption_pts: Option<i64>,
    cache: Option<RenderCache>,

    stroke_width: i32,
    replace_drcs: bool,
    force_stroke_text: bool,
    force_no_ruby: bool,
    force_no_background: bool,
    merge_region_images: bool,

    default_font_family: Vec<String>,
    force_default_font_family: bool,
    language_font_family: HashMap<LanguageCode, Vec<String>>,

    frame_width: Option<i32>,
    frame_height: Option<i32>,
    margin_top: i32,
    margin_bottom: i32,
    margin_left: i32,
    margin_right: i32,
}

impl Renderer {
    pub fn new(
        context: Context,
        caption_type: CaptionType,
        font_provider: Box<dyn FontProvider>,
        text_renderer: Box<dyn TextRenderer>,
    ) -> Self {
        Self {
            context,
            caption_type,
            font_provider,
            text_renderer,
            store: BTreeMap::new(),
            storage_policy: StoragePolicy::Unlimited,
            prev_rendered_caption_pts: None,
            cache: None,
            stroke_width: 1,
            replace_drcs: true,
            force_stroke_text: false,
            force_no_ruby: false,
            force_no_background: false,
            merge_region_images: false,
            default_font_family: Vec::new(),
            force_default_font_family: false,
            language_font_family: HashMap::new(),
            frame_width: None,
            frame_height: None,
            margin_top: 0,
            margin_bottom: 0,
            margin_left: 0,
            margin_right: 0,
        }
    }

    fn invalidate_cache(&mut self) {
        self.cache = None;
    }

    pub fn set_stroke_width(&mut self, width: i32) {
        self.stroke_width = width;
        self.invalidate_cache();
    }

    pub fn set_replace_drcs(&mut self, replace: bool) {
        self.replace_drcs = replace;
        self.invalidate_cache();
    }

    pub fn set_force_stroke_text(&mut self, force: bool) {
        self.force_stroke_text = force;
        self.invalidate_cache();
    }

    pub fn set_force_no_ruby(&mut self, force: bool) {
        self.force_no_ruby = force;
        self.invalidate_cache();
    }

    pub fn set_force_no_background(&mut self, force: bool) {
        self.force_no_background = force;
        self.invalidate_cache();
    }

    pub fn set_merge_region_images(&mut self, merge: bool) {
        self.merge_region_images = merge;
        self.invalidate_cache();
    }

    pub fn set_default_font_family(&mut self, family: Vec<String>, force_default: bool) {
        self.default_font_family = family;
        self.force_default_font_family = force_default;
        self.invalidate_cache();
    }

    pub fn set_language_specific_font_family(&mut self, iso6392_code: LanguageCode, family: Vec<String>) {
        self.language_font_family.insert(iso6392_code, family);
        self.invalidate_cache();
    }

    pub fn set_frame_size(&mut self, width: i32, height: i32) {
        self.frame_width = Some(width);
        self.frame_height = Some(height);
        self.invalidate_cache();
    }

    pub fn set_margins(&mut self, top: i32, bottom: i32, left: i32, right: i32) {
        self.margin_top = top;
        self.margin_bottom = bottom;
        self.margin_left = left;
        self.margin_right = right;
        self.invalidate_cache();
    }

    pub fn set_storage_policy(&mut self, policy: StoragePolicy) {
        self.storage_policy = policy;
        self.apply_storage_policy();
    }

    /// Clears all stored captions and invalidates the result cache.
    pub fn flush(&mut self) {
        self.store.clear();
        self.prev_rendered_caption_pts = None;
        self.invalidate_cache();
    }

    /// Appends `caption` to the store, keyed by its `pts`. Returns `false`
    /// without storing anything if `pts == PTS_NOPTS` or the plane size is
    /// non-positive.
    pub fn append_caption(&mut self, caption: Caption) -> bool {
        if caption.pts == PTS_NOPTS || caption.plane_width == 0 || caption.plane_height == 0 {
            return false;
        }
        let pts = caption.pts;

        if let Some((_, prev)) = self.store.range_mut(..pts).next_back() {
            if prev.wait_duration == DURATION_INDEFINITE && prev.pts < pts {
                prev.wait_duration = pts - prev.pts;
            }
        }

        self.store.insert(pts, caption);

        if let Some(prev_rendered) = self.prev_rendered_caption_pts {
            if pts <= prev_rendered {
                self.invalidate_cache();
            }
        }

        self.apply_storage_policy();
        true
    }

    fn apply_storage_policy(&mut self) {
        match self.storage_policy {
            StoragePolicy::Minimum => {
                if let Some(prev) = self.prev_rendered_caption_pts {
                    let stale: Vec<i64> = self.store.range(..prev).map(|(&k, _)| k).collect();
                    for k in stale {
                        self.store.remove(&k);
                    }
                }
            }
            StoragePolicy::Unlimited => {}
            StoragePolicy::UpperLimitCount(limit) => {
                while self.store.len() > limit {
                    if let Some(&oldest) = self.store.keys().next() {
                        self.store.remove(&oldest);
                    } else {
                        break;
                    }
                }
            }
            StoragePolicy::UpperLimitDuration(duration) => {
                if let Some(&last_pts) = self.store.keys().next_back() {
                    let threshold = last_pts - duration;
                    let stale: Vec<i64> = self.store.range(..threshold).map(|(&k, _)| k).collect();
                    for k in stale {
                        self.store.remove(&k);
                    }
                }
            }
        }
    }

    fn select_caption(&self, pts: i64) -> Option<&Caption> {
        let (_, caption) = self.store.range(..=pts).next_back()?;
        if pts < caption.pts {
            return None;
        }
        if caption.wait_duration != DURATION_INDEFINITE && pts >= caption.pts + caption.wait_duration {
            return None;
        }
        if caption.regions.is_empty() {
            return None;
        }
        Some(caption)
    }

    fn font_family_for(&self, lang: LanguageCode) -> &[String] {
        if !self.force_default_font_family {
            if let Some(family) = self.language_font_family.get(&lang) {
                return family;
            }
        }
        &self.default_font_family
    }

    fn caption_area(&self, plane_width: i32, plane_height: i32) -> Option<Rect> {
        let frame_w = self.frame_width?;
        let frame_h = self.frame_height?;
        let avail_w = frame_w - self.margin_left - self.margin_right;
        let avail_h = frame_h - self.margin_top - self.margin_bottom;
        if avail_w <= 0 || avail_h <= 0 || plane_width <= 0 || plane_height <= 0 {
            return None;
        }
        let x_mag = avail_w as f64 / plane_width as f64;
        let y_mag = avail_h as f64 / plane_height as f64;
        let mag = x_mag.min(y_mag);
        let scaled_w = (plane_width as f64 * mag).floor() as i32;
        let scaled_h = (plane_height as f64 * mag).floor() as i32;
        let x = self.margin_left + (avail_w - scaled_w) / 2;
        let y = self.margin_top + (avail_h - scaled_h) / 2;
        Some(Rect::new(x, y, scaled_w, scaled_h))
    }

    /// Query-only form of [`Renderer::render`]: runs the same selection and
    /// rasterization and reports the same status, without returning images.
    pub fn try_render(&mut self, pts: i64) -> RenderStatus {
        self.render(pts).status
    }

    /// Resolves the caption visible at `pts` and rasterizes it.
    pub fn render(&mut self, pts: i64) -> RenderResult {
        let caption = match self.select_caption(pts) {
            Some(c) => c,
            None => return RenderResult { status: RenderStatus::NoImage, ..Default::default() },
        };
        let caption_pts = caption.pts;
        let duration = caption.wait_duration;

        if let Some(cache) = &self.cache {
            if cache.caption_pts == caption_pts {
                return RenderResult {
                    status: RenderStatus::GotImageUnchanged,
                    pts: caption_pts,
                    duration: cache.duration,
                    images: cache.images.clone(),
                };
            }
        }

        let caption_area = match self.caption_area(caption.plane_width as i32, caption.plane_height as i32) {
            Some(r) => r,
            None => return RenderResult { status: RenderStatus::Error, ..Default::default() },
        };

        let lang = caption.iso6392_language_code;
        let family = self.font_family_for(lang).to_vec();
        self.text_renderer.set_language(lang.0);
        self.text_renderer.set_font_family(&family);
        self.font_provider.set_language(lang.0);

        let mut region_renderer = RegionRenderer::new(
            self.text_renderer.as_mut(),
            caption.plane_width as i32,
            caption.plane_height as i32,
            caption_area,
        );
        region_renderer.stroke_width = self.stroke_width;
        region_renderer.replace_drcs = self.replace_drcs;
        region_renderer.force_stroke_text = self.force_stroke_text;
        region_renderer.force_no_background = self.force_no_background;

        let mut images = Vec::new();
        for region in &caption.regions {
            if region.is_ruby && self.force_no_ruby {
                continue;
            }
            match region_renderer.render_region(region, &caption.drcs_map) {
                Ok(mut image) => {
                    image.dst_x += caption_area.x;
                    image.dst_y += caption_area.y;
                    images.push(image);
                }
                Err(RegionError::ImageTooSmall) => {}
                Err(_) => {
                    self.invalidate_cache();
                    return RenderResult { status: RenderStatus::Error, ..Default::default() };
                }
            }
        }

        if self.merge_region_images && images.len() > 1 {
            images = vec![merge_images(&images)];
        }

        self.prev_rendered_caption_pts = Some(caption_pts);
        self.apply_storage_policy();

        if images.is_empty() {
            // Every visible region was skipped (ImageTooSmall) or the
            // caption had none left after force_no_ruby filtering -- treat
            // the same as no caption being visible at all.
            self.cache = None;
            return RenderResult { status: RenderStatus::NoImage, pts: caption_pts, duration, images };
        }

        self.cache = Some(RenderCache { caption_pts, duration, images: images.clone() });

        RenderResult { status: RenderStatus::GotImage, pts: caption_pts, duration, images }
    }
}

/// Composes `images` onto one bitmap spanning their bounding rect, blended
/// in declaration order -- semantically identical to blending them onto a
/// shared framebuffer one at a time.
fn merge_images(images: &[Image]) -> Image {
    let min_x = images.iter().map(|i| i.dst_x).min().unwrap_or(0);
    let min_y = images.iter().map(|i| i.dst_y).min().unwrap_or(0);
    let max_x = images.iter().map(|i| i.dst_x + i.width).max().unwrap_or(0);
    let max_y = images.iter().map(|i| i.dst_y + i.height).max().unwrap_or(0);

    let width = (max_x - min_x).max(1);
    let height = (max_y - min_y).max(1);
    let mut out = Image::new(width, height);
    canvas::clear_color(&mut out, ColorRgba::TRANSPARENT);
    for image in images {
        canvas::draw_bitmap(&mut out, image, image.dst_x - min_x, image.dst_y - min_y);
    }
    out.dst_x = min_x;
    out.dst_y = min_y;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{NullFontProvider, NullTextRenderer};
    use arib_caption_core::{Caption, CaptionRegion, CaptionType};

    fn caption_with_region(pts: i64, wait: i64) -> Caption {
        let mut c = Caption::new();
        c.pts = pts;
        c.wait_duration = wait;
        c.plane_width = 960;
        c.plane_height = 540;
        c.regions.push(CaptionRegion::new(0, 0, 36, false));
        c
    }

    fn renderer() -> Renderer {
        let mut r = Renderer::new(
            Context::new(),
            CaptionType::Caption,
            Box::new(NullFontProvider),
            Box::new(NullTextRenderer),
        );
        r.set_frame_size(1920, 1080);
        r.set_margins(0, 0, 0, 0);
        r
    }

    #[test]
    fn no_frame_size_is_error() {
        let mut r = Renderer::new(
            Context::new(),
            CaptionType::Caption,
            Box::new(NullFontProvider),
            Box::new(NullTextRenderer),
        );
        r.append_caption(caption_with_region(0, DURATION_INDEFINITE));
        assert_eq!(r.render(0).status, RenderStatus::Error);
    }

    #[test]
    fn selection_window_respects_wait_duration() {
        let mut r = renderer();
        r.append_caption(caption_with_region(1000, 500));
        assert_eq!(r.render(999).status, RenderStatus::NoImage);
        assert_eq!(r.render(1499).status, RenderStatus::NoImage); // empty region -> no image regardless
    }

    #[test]
    fn append_caption_rejects_no_pts() {
        let mut r = renderer();
        assert!(!r.append_caption(caption_with_region(PTS_NOPTS, DURATION_INDEFINITE)));
    }

    #[test]
    fn late_insert_shortens_indefinite_wait_duration() {
        let mut r = renderer();
        r.append_caption(caption_with_region(1000, DURATION_INDEFINITE));
        r.append_caption(caption_with_region(3000, DURATION_INDEFINITE));
        let first = r.store.get(&1000).unwrap();
        assert_eq!(first.wait_duration, 2000);
    }

    #[test]
    fn upper_limit_count_bounds_store_size() {
        let mut r = renderer();
        r.set_storage_policy(StoragePolicy::UpperLimitCount(2));
        for pts in [0, 1000, 2000, 3000] {
            r.append_caption(caption_with_region(pts, 500));
        }
        assert!(r.store.len() <= 2);
    }

    #[test]
    fn caption_area_aspect_fit_matches_scenario() {
        let r = renderer();
        assert_eq!(r.caption_area(960, 540), Some(Rect::new(0, 0, 1920, 1080)));
        assert_eq!(r.caption_area(1440, 1080), Some(Rect::new(240, 0, 1440, 1080)));
    }
}
