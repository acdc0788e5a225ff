//! The C6 decoder: turns a PES payload into zero or one [`Caption`] per call.
//!
//! This is a state machine, not a pure function: control codes accumulate
//! into persistent text attributes (color, style, scale, active position)
//! across `decode()` calls. A single malformed control sequence fails the
//! whole call with `Error`; well-formed input that produces no visible
//! change is `DecodeStatus::NoCaption`, never an error.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use md5::Digest;

use crate::caption::{
    Caption, CaptionChar, CaptionCharType, CaptionFlags, CaptionRegion, CaptionType, CharStyle,
    Drcs, EnclosureStyle, LanguageCode, LanguageId, Profile, DURATION_INDEFINITE, PTS_NOPTS,
};
use crate::color::ColorRgba;
use crate::context::Context;
use crate::tables::codesets::{drcs_codeset_by_f, g_codeset_by_f, CodesetEntry, GraphicSet};
use crate::tables::{charsets, colors, drcs_replacement, kanji, macros};
use crate::{Error, Result};

/// Which caption text encoding a [`Decoder`] interprets statement bodies as.
///
/// `AribStdB24Utf8` is identical in meaning to the Philippines ISDB-T UTF-8
/// variant; see [`EncodingScheme::ISDB_T_PHILIPPINES_UTF8`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingScheme {
    /// Detect from the languages present in caption management data.
    Auto,
    AribStdB24Jis,
    AribStdB24Utf8,
    AbntNbr15606Latin,
}

impl EncodingScheme {
    /// Alias for [`EncodingScheme::AribStdB24Utf8`], used by Philippines
    /// ISDB-T captions, which are UTF-8 encoded identically to the ARIB form.
    #[allow(non_upper_case_globals)]
    pub const ISDB_T_PHILIPPINES_UTF8: EncodingScheme = EncodingScheme::AribStdB24Utf8;
}

/// Outcome of a single [`Decoder::decode`] call.
#[derive(Debug, Clone, Default)]
pub enum DecodeStatus {
    /// Input was structurally malformed; decoder state was left unchanged
    /// aside from consuming the call.
    Error,
    /// Input parsed cleanly but produced no visible caption change (e.g. a
    /// retransmitted management packet, or a zero-length data group).
    #[default]
    NoCaption,
    /// Input parsed and produced a caption snapshot.
    GotCaption(Caption),
}

impl DecodeStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, DecodeStatus::Error)
    }

    pub fn caption(self) -> Option<Caption> {
        match self {
            DecodeStatus::GotCaption(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct LanguageInfo {
    language_id: Option<LanguageId>,
    dmf: u8,
    format: u8,
    tcs: u8,
    iso6392_language_code: LanguageCode,
}

fn language_id_index(id: LanguageId) -> usize {
    match id {
        LanguageId::First => 1,
        LanguageId::Second => 2,
    }
}

fn language_id_from_tag(tag: u8) -> Option<LanguageId> {
    match tag {
        1 => Some(LanguageId::First),
        2 => Some(LanguageId::Second),
        _ => None,
    }
}

/// ARIB STD-B24 / ABNT NBR 15606-1 closed-caption decoder.
///
/// Owns the full control-code interpreter state (graphic-set registers,
/// active position, current text attributes, DRCS maps) across repeated
/// [`Decoder::decode`] calls on successive PES payloads of one elementary
/// stream.
pub struct Decoder {
    context: Context,

    request_encoding: EncodingScheme,
    active_encoding: EncodingScheme,

    caption_type: CaptionType,
    profile: Profile,
    language_id: LanguageId,

    replace_msz_fullwidth_ascii: bool,

    language_infos: Vec<LanguageInfo>,
    current_iso6392_language_code: LanguageCode,
    prev_dgi_group: Option<u8>,

    caption: Option<Caption>,

    gl: usize,
    gr: usize,
    gx: [CodesetEntry; 4],
    drcs_maps: [HashMap<u16, Drcs>; 16],

    pts: i64,

    swf: u8,

    caption_plane_width: i32,
    caption_plane_height: i32,
    display_area_width: i32,
    display_area_height: i32,
    display_area_start_x: i32,
    display_area_start_y: i32,
    active_pos_inited: bool,
    active_pos_x: i32,
    active_pos_y: i32,

    char_width: i32,
    char_height: i32,
    char_horizontal_spacing: i32,
    char_vertical_spacing: i32,
    char_horizontal_scale: f32,
    char_vertical_scale: f32,

    has_underline: bool,
    has_bold: bool,
    has_italic: bool,
    has_stroke: bool,
    stroke_color: ColorRgba,
    enclosure_style: EnclosureStyle,

    has_builtin_sound: bool,
    builtin_sound_id: u8,

    palette: u8,
    text_color: ColorRgba,
    back_color: ColorRgba,
}

const GAIJI_BEGIN_KU: u32 = 84;

fn entry(graphics_set: GraphicSet, bytes: u8) -> CodesetEntry {
    CodesetEntry { graphics_set, bytes }
}

impl Decoder {
    /// Builds a decoder and initializes it to `encoding_scheme`/`caption_type`/
    /// `profile`/`language_id`. Mirrors `Decoder::Initialize` followed
    /// immediately by construction, since Rust has no separate "must call
    /// before use" initializer step.
    pub fn new(
        context: Context,
        encoding_scheme: EncodingScheme,
        caption_type: CaptionType,
        profile: Profile,
        language_id: LanguageId,
    ) -> Self {
        let mut decoder = Decoder {
            context,
            request_encoding: encoding_scheme,
            active_encoding: if encoding_scheme == EncodingScheme::Auto {
                EncodingScheme::AribStdB24Jis
            } else {
                encoding_scheme
            },
            caption_type,
            profile,
            language_id,
            replace_msz_fullwidth_ascii: false,
            language_infos: Vec::new(),
            current_iso6392_language_code: LanguageCode::UNKNOWN,
            prev_dgi_group: None,
            caption: None,
            gl: 0,
            gr: 2,
            gx: [
                entry(GraphicSet::Kanji, 2),
                entry(GraphicSet::Alphanumeric, 1),
                entry(GraphicSet::Hiragana, 1),
                entry(GraphicSet::Macro, 1),
            ],
            drcs_maps: std::array::from_fn(|_| HashMap::new()),
            pts: PTS_NOPTS,
            swf: 7,
            caption_plane_width: 960,
            caption_plane_height: 540,
            display_area_width: 960,
            display_area_height: 540,
            display_area_start_x: 0,
            display_area_start_y: 0,
            active_pos_inited: false,
            active_pos_x: 0,
            active_pos_y: 0,
            char_width: 36,
            char_height: 36,
            char_horizontal_spacing: 4,
            char_vertical_spacing: 24,
            char_horizontal_scale: 1.0,
            char_vertical_scale: 1.0,
            has_underline: false,
            has_bold: false,
            has_italic: false,
            has_stroke: false,
            stroke_color: ColorRgba::TRANSPARENT,
            enclosure_style: EnclosureStyle::empty(),
            has_builtin_sound: false,
            builtin_sound_id: 0,
            palette: 0,
            text_color: colors::DEFAULT_TEXT_COLOR,
            back_color: colors::DEFAULT_BACK_COLOR,
        };
        decoder.reset_internal_state();
        decoder
    }

    /// Convenience constructor using a fresh, logger-less [`Context`].
    pub fn with_defaults() -> Self {
        Self::new(
            Context::new(),
            EncodingScheme::Auto,
            CaptionType::Caption,
            Profile::ProfileA,
            LanguageId::First,
        )
    }

    pub fn set_encoding_scheme(&mut self, encoding_scheme: EncodingScheme) {
        self.request_encoding = encoding_scheme;
        if encoding_scheme == EncodingScheme::Auto {
            let detected = self.detect_encoding_scheme();
            if self.active_encoding != detected {
                self.active_encoding = detected;
                self.reset_internal_state();
            }
        } else if self.active_encoding != encoding_scheme {
            self.active_encoding = encoding_scheme;
            self.reset_internal_state();
        }
    }

    pub fn set_caption_type(&mut self, caption_type: CaptionType) {
        self.caption_type = caption_type;
    }

    pub fn set_profile(&mut self, profile: Profile) {
        self.profile = profile;
        self.reset_writing_format();
    }

    pub fn switch_language(&mut self, language_id: LanguageId) {
        if self.language_id != language_id {
            self.language_id = language_id;
            self.current_iso6392_language_code = self.query_iso6392_language_code(language_id);
        }
    }

    pub fn set_replace_msz_fullwidth_alphanumeric(&mut self, replace: bool) {
        self.replace_msz_fullwidth_ascii = replace;
    }

    /// Looks up the ISO 639-2 code for `language_id`, or
    /// [`LanguageCode::UNKNOWN`] if that language is not present in the
    /// last-seen caption management data.
    pub fn query_iso6392_language_code(&self, language_id: LanguageId) -> LanguageCode {
        if self.language_infos.is_empty() {
            return self.current_iso6392_language_code;
        }
        let index = language_id_index(language_id) - 1;
        match self.language_infos.get(index) {
            Some(info) => info.iso6392_language_code,
            None => LanguageCode::UNKNOWN,
        }
    }

    /// Resets all decoder state, matching `Decoder::Flush`.
    pub fn flush(&mut self) {
        self.reset_internal_state();
    }

    /// Decodes one PES payload. `pts` is in milliseconds; pass
    /// [`PTS_NOPTS`] if unknown.
    pub fn decode(&mut self, pes_data: &[u8], pts: i64) -> DecodeStatus {
        match self.decode_inner(pes_data, pts) {
            Ok(status) => status,
            Err(e) => {
                self.context
                    .log(crate::context::LogLevel::Error, e.to_string());
                DecodeStatus::Error
            }
        }
    }

    fn decode_inner(&mut self, pes_data: &[u8], pts: i64) -> Result<DecodeStatus> {
        if pes_data.len() < 3 {
            return Err(Error::PesTooShort { len: pes_data.len(), need: 3 });
        }

        self.pts = pts;
        let data = pes_data;

        let data_identifier = data[0];
        let private_stream_id = data[1];
        let pes_data_packet_header_length = (data[2] & 0x0F) as usize;

        if data_identifier != 0x80 && data_identifier != 0x81 {
            return Err(Error::DataIdentifierMismatch {
                found: data_identifier,
                expected: self.caption_type.data_identifier(),
            });
        }
        if data_identifier != self.caption_type.data_identifier() {
            return Err(Error::DataIdentifierMismatch {
                found: data_identifier,
                expected: self.caption_type.data_identifier(),
            });
        }
        if private_stream_id != 0xFF {
            return Err(Error::InvalidPrivateStreamId(private_stream_id));
        }

        let data_group_begin = 3 + pes_data_packet_header_length;
        if data_group_begin + 5 > data.len() {
            return Err(Error::DataGroupTruncated {
                offset: data_group_begin,
                need: 5,
            });
        }

        let data_group_id = (data[data_group_begin] & 0b1111_1100) >> 2;
        let data_group_size =
            BigEndian::read_u16(&data[data_group_begin + 3..data_group_begin + 5]) as usize;

        if data_group_size == 0 {
            return Ok(DecodeStatus::NoCaption);
        }

        if data_group_begin + 5 + data_group_size > data.len() {
            return Err(Error::DataGroupTruncated {
                offset: data_group_begin + 5,
                need: data_group_size,
            });
        }

        let dgi_id = data_group_id & 0x0F;
        // The reference computes `(data_group_id & 0xF0) >> 8` here, which is
        // always zero because `data_group_id` only ever carries 6 significant
        // bits; the group number is really the top two of those six bits.
        // Reproduced corrected rather than literally, see DESIGN.md.
        let dgi_group = (data_group_id & 0x30) >> 4;

        // `Caption::new()` defaults `wait_duration` to `DURATION_INDEFINITE`,
        // which would overflow the `+=` accumulation in the TIME control
        // code handler below; start at 0 instead and let the finalization
        // step at the end of this function promote an untouched 0 to
        // indefinite.
        self.caption = Some(Caption {
            pts: PTS_NOPTS,
            ..Caption::default()
        });

        let body = &data[data_group_begin + 5..data_group_begin + 5 + data_group_size];

        if dgi_id == 0 {
            if self.prev_dgi_group == Some(dgi_group) {
                // ARIB TR-B14 4.2.4: same group as the previous management
                // packet means this is a retransmission; ignore it.
                return Ok(DecodeStatus::NoCaption);
            }
            self.prev_dgi_group = Some(dgi_group);
            self.parse_caption_management_data(body)?;
        } else {
            if dgi_id != language_id_index(self.language_id) as u8 {
                return Ok(DecodeStatus::NoCaption);
            }
            self.parse_caption_statement_data(body)?;
        }

        let mut caption = self.caption.take().expect("caption set above");

        if !caption.regions.is_empty() || !caption.flags.is_empty() {
            caption.caption_type = Some(self.caption_type);
            caption.iso6392_language_code = self.current_iso6392_language_code;
            caption.plane_width = self.caption_plane_width as u32;
            caption.plane_height = self.caption_plane_height as u32;
            caption.has_builtin_sound = self.has_builtin_sound;
            caption.builtin_sound_id = self.builtin_sound_id;
            caption.pts = self.pts;
            if caption.wait_duration == 0 {
                caption.wait_duration = DURATION_INDEFINITE;
            }
            Ok(DecodeStatus::GotCaption(caption))
        } else {
            Ok(DecodeStatus::NoCaption)
        }
    }

    fn detect_encoding_scheme(&self) -> EncodingScheme {
        const JPN: LanguageCode = LanguageCode::three_cc(*b"jpn");
        const POR: LanguageCode = LanguageCode::three_cc(*b"por");
        const SPA: LanguageCode = LanguageCode::three_cc(*b"spa");
        const ENG: LanguageCode = LanguageCode::three_cc(*b"eng");
        const TGL: LanguageCode = LanguageCode::three_cc(*b"tgl");

        let (mut has_jpn, mut has_latin, mut has_eng, mut has_tgl) = (false, false, false, false);
        for info in &self.language_infos {
            match info.iso6392_language_code {
                JPN => has_jpn = true,
                POR | SPA => has_latin = true,
                ENG => has_eng = true,
                TGL => has_tgl = true,
                _ => {}
            }
        }
        if has_jpn {
            EncodingScheme::AribStdB24Jis
        } else if has_latin {
            EncodingScheme::AbntNbr15606Latin
        } else if has_eng || has_tgl {
            EncodingScheme::AribStdB24Utf8
        } else {
            EncodingScheme::AribStdB24Jis
        }
    }

    fn reset_graphic_sets(&mut self) {
        if self.active_encoding == EncodingScheme::AbntNbr15606Latin {
            self.gx = [
                entry(GraphicSet::Alphanumeric, 1),
                entry(GraphicSet::Alphanumeric, 1),
                entry(GraphicSet::LatinExtension, 1),
                entry(GraphicSet::LatinSpecial, 1),
            ];
        } else if self.profile == Profile::ProfileA {
            self.gx = [
                entry(GraphicSet::Kanji, 2),
                entry(GraphicSet::Alphanumeric, 1),
                entry(GraphicSet::Hiragana, 1),
                entry(GraphicSet::Macro, 1),
            ];
        } else {
            // Profile C
            self.gx = [
                entry(GraphicSet::Drcs1, 1),
                entry(GraphicSet::Alphanumeric, 1),
                entry(GraphicSet::Kanji, 2),
                entry(GraphicSet::Macro, 1),
            ];
        }
        self.gl = 0;
        self.gr = 2;
    }

    fn reset_writing_format(&mut self) {
        if self.profile == Profile::ProfileA {
            match self.swf {
                5 => {
                    self.caption_plane_width = 1920;
                    self.caption_plane_height = 1080;
                    self.char_width = 36;
                    self.char_height = 36;
                    self.char_horizontal_spacing = 4;
                    self.char_vertical_spacing = 24;
                }
                8 => {
                    self.caption_plane_width = 960;
                    self.caption_plane_height = 540;
                    self.char_width = 36;
                    self.char_height = 36;
                    self.char_horizontal_spacing = 12;
                    self.char_vertical_spacing = 24;
                }
                9 => {
                    self.caption_plane_width = 720;
                    self.caption_plane_height = 480;
                    self.char_width = 36;
                    self.char_height = 36;
                    self.char_horizontal_spacing = 4;
                    self.char_vertical_spacing = 16;
                }
                10 => {
                    self.caption_plane_width = 720;
                    self.caption_plane_height = 480;
                    self.char_width = 36;
                    self.char_height = 36;
                    self.char_horizontal_spacing = 8;
                    self.char_vertical_spacing = 24;
                }
                _ => {
                    // 7 (960x540 horizontal) and any other value.
                    self.caption_plane_width = 960;
                    self.caption_plane_height = 540;
                    self.char_width = 36;
                    self.char_height = 36;
                    self.char_horizontal_spacing = 4;
                    self.char_vertical_spacing = 24;
                }
            }
            self.display_area_width = self.caption_plane_width;
            self.display_area_height = self.caption_plane_height;
        } else {
            // Profile C
            self.caption_plane_width = 320;
            self.caption_plane_height = 180;
            self.display_area_width = 320;
            self.display_area_height = 180;
            self.char_width = 18;
            self.char_height = 18;
            self.char_horizontal_spacing = 2;
            self.char_vertical_spacing = 6;
        }

        if self.active_encoding == EncodingScheme::AbntNbr15606Latin {
            self.char_horizontal_spacing = 2;
            self.char_vertical_spacing = 16;
        }
    }

    fn reset_internal_state(&mut self) {
        self.reset_graphic_sets();
        self.reset_writing_format();

        self.display_area_start_x = 0;
        self.display_area_start_y = 0;
        self.active_pos_inited = false;
        self.active_pos_x = 0;
        self.active_pos_y = 0;

        if self.active_encoding == EncodingScheme::AbntNbr15606Latin {
            self.char_horizontal_scale = 0.5;
            self.char_vertical_scale = 1.0;
        } else {
            self.char_horizontal_scale = 1.0;
            self.char_vertical_scale = 1.0;
        }

        self.has_underline = false;
        self.has_bold = false;
        self.has_italic = false;
        self.has_stroke = false;
        self.stroke_color = ColorRgba::default();
        self.enclosure_style = EnclosureStyle::empty();

        self.has_builtin_sound = false;
        self.builtin_sound_id = 0;

        self.palette = 0;
        self.text_color = colors::lookup(self.palette, 7);
        self.back_color = colors::lookup(self.palette, 8);
    }

    fn parse_caption_management_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 10 {
            return Err(Error::ManagementDataMalformed(
                "data not enough for CaptionManagementData",
            ));
        }

        let tmd = (data[0] & 0b1100_0000) >> 6;
        let mut offset = 1usize;
        if tmd == 0b10 {
            offset += 5; // skip OTM
        }

        let num_languages = data[offset];
        offset += 1;
        if num_languages == 0 || num_languages > 2 {
            return Err(Error::InvalidLanguageCount(num_languages));
        }
        self.language_infos = vec![LanguageInfo::default(); num_languages as usize];

        for _ in 0..num_languages {
            if offset + 5 > data.len() {
                return Err(Error::ManagementDataMalformed(
                    "data not enough for language info",
                ));
            }

            let language_tag = (data[offset] & 0b1110_0000) >> 5;
            let dmf = data[offset] & 0b0000_1111;
            offset += 1;

            if dmf == 0b1100 || dmf == 0b1101 || dmf == 0b1110 {
                offset += 1;
            }

            if offset + 4 > data.len() {
                return Err(Error::ManagementDataMalformed(
                    "data not enough for language info",
                ));
            }

            let iso6392_language_code =
                LanguageCode::three_cc([data[offset], data[offset + 1], data[offset + 2]]);
            offset += 3;
            let format = (data[offset] & 0b1111_0000) >> 4;
            let tcs = (data[offset] & 0b0000_1100) >> 2;
            offset += 1;

            let info = LanguageInfo {
                language_id: language_id_from_tag(language_tag + 1),
                dmf,
                format,
                tcs,
                iso6392_language_code,
            };

            if info.language_id == Some(self.language_id) {
                self.current_iso6392_language_code = info.iso6392_language_code;
                self.swf = info.format.wrapping_sub(1);
                self.reset_graphic_sets();
                self.reset_writing_format();
            }

            if let Some(slot) = self.language_infos.get_mut(language_tag as usize) {
                *slot = info;
            }
        }

        if self.request_encoding == EncodingScheme::Auto {
            let detected = self.detect_encoding_scheme();
            if self.active_encoding != detected {
                self.active_encoding = detected;
                self.reset_internal_state();
            }
        }

        if offset + 3 > data.len() {
            return Err(Error::ManagementDataMalformed(
                "data not enough for data_unit_loop_length",
            ));
        }
        let data_unit_loop_length = BigEndian::read_u24(&data[offset..offset + 3]) as usize;
        offset += 3;

        if data_unit_loop_length == 0 {
            return Ok(());
        }
        if offset + data_unit_loop_length > data.len() {
            return Err(Error::ManagementDataMalformed(
                "data not enough for data_unit_loop",
            ));
        }

        self.parse_data_unit(&data[offset..offset + data_unit_loop_length])
    }

    fn parse_caption_statement_data(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 4 {
            return Err(Error::StatementDataMalformed(
                "data not enough for CaptionStatementData",
            ));
        }

        let tmd = (data[0] & 0b1100_0000) >> 6;
        let mut offset = 1usize;
        if tmd == 0b01 || tmd == 0b10 {
            offset += 5;
        }

        if offset + 4 > data.len() {
            return Err(Error::StatementDataMalformed(
                "data not enough for CaptionStatementData",
            ));
        }

        let data_unit_loop_length = BigEndian::read_u24(&data[offset..offset + 3]) as usize;
        offset += 3;

        if data_unit_loop_length == 0 {
            return Ok(());
        }
        if offset + data_unit_loop_length > data.len() {
            return Err(Error::StatementDataMalformed(
                "data not enough for data_unit_loop",
            ));
        }

        self.parse_data_unit(&data[offset..offset + data_unit_loop_length])
    }

    fn parse_data_unit(&mut self, data: &[u8]) -> Result<()> {
        if data.len() < 5 {
            return Err(Error::DataUnitTruncated { offset: 0 });
        }

        let mut offset = 0usize;
        while offset < data.len() {
            let unit_separator = data[offset];
            let data_unit_parameter = data[offset + 1];
            let data_unit_size = BigEndian::read_u24(&data[offset + 2..offset + 5]) as usize;

            if unit_separator != 0x1F {
                return Err(Error::InvalidUnitSeparator(unit_separator));
            }

            if data_unit_size == 0 {
                return Ok(());
            }
            if offset + 5 + data_unit_size > data.len() {
                return Err(Error::DataUnitTruncated { offset });
            }

            let body = &data[offset + 5..offset + 5 + data_unit_size];
            match data_unit_parameter {
                0x20 => self.parse_statement_body(body)?,
                0x30 => self.parse_drcs(body, 1)?,
                0x31 => self.parse_drcs(body, 2)?,
                _ => {}
            }

            offset += 5 + data_unit_size;
        }

        Ok(())
    }

    fn parse_statement_body(&mut self, data: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < data.len() {
            let ch = data[offset];
            let remaining = &data[offset..];

            let consumed = if self.active_encoding == EncodingScheme::AribStdB24Utf8 {
                if ch <= 0x1F {
                    self.handle_c0(remaining)?
                } else if ch == 0x7F {
                    self.handle_c1(remaining)?
                } else if ch == 0xC2
                    && remaining.len() > 1
                    && remaining[1] >= 0x80
                    && remaining[1] <= 0x9F
                {
                    1 + self.handle_c1(&remaining[1..])?
                } else {
                    self.handle_utf8(remaining)?
                }
            } else if ch <= 0x20 {
                self.handle_c0(remaining)?
            } else if ch < 0x7F {
                self.handle_glgr(remaining, self.gl)?
            } else if ch <= 0xA0 {
                self.handle_c1(remaining)?
            } else if ch < 0xFF {
                self.handle_glgr(remaining, self.gr)?
            } else {
                return Err(Error::ControlCodeParseFailure { byte: ch, offset });
            };

            if consumed == 0 {
                return Err(Error::ControlCodeParseFailure { byte: ch, offset });
            }
            offset += consumed;
        }
        Ok(())
    }

    fn parse_drcs(&mut self, data: &[u8], byte_count: u8) -> Result<()> {
        if data.is_empty() {
            return Err(Error::DrcsTruncated { code_index: 0, font_index: 0 });
        }
        let number_of_code = data[0];
        let mut offset = 1usize;

        for code_index in 0..number_of_code {
            if offset + 3 > data.len() {
                return Err(Error::DrcsTruncated { code_index, font_index: 0 });
            }
            let character_code = BigEndian::read_u16(&data[offset..offset + 2]);
            let number_of_font = data[offset + 2];
            offset += 3;

            for font_index in 0..number_of_font {
                if offset + 4 > data.len() {
                    return Err(Error::DrcsTruncated { code_index, font_index });
                }
                let mode = data[offset] & 0x0F;
                offset += 1;

                if mode == 0b0000 || mode == 0b0001 {
                    if offset + 3 > data.len() {
                        return Err(Error::DrcsTruncated { code_index, font_index });
                    }
                    let depth = data[offset].wrapping_add(2);
                    let width = data[offset + 1];
                    let height = data[offset + 2];
                    offset += 3;

                    // Counts cleared low bits of `depth`, not log2(depth);
                    // this only coincides with log2 because transmitted
                    // depths are always powers of two in practice, exactly
                    // as upstream computes it.
                    let mut n = depth as u32;
                    let mut depth_bits = 0u32;
                    while n != 0 {
                        if n & 1 == 0 {
                            depth_bits += 1;
                        }
                        n >>= 1;
                    }
                    let depth_bits = depth_bits.max(1);

                    let bitmap_size =
                        (width as usize) * (height as usize) * (depth_bits as usize) / 8;
                    if offset + bitmap_size > data.len() {
                        return Err(Error::DrcsTruncated { code_index, font_index });
                    }

                    let pixels = data[offset..offset + bitmap_size].to_vec();
                    offset += bitmap_size;

                    let digest: [u8; 16] = md5::Md5::digest(&pixels).into();

                    let (alternative_text, alternative_ucs4) =
                        match drcs_replacement::lookup(&digest) {
                            Some((text, ucs4)) => (text.to_string(), ucs4),
                            None => {
                                self.context.log(
                                    crate::context::LogLevel::Warning,
                                    format!(
                                        "cannot convert unrecognized DRCS pattern {digest:02x?} to Unicode"
                                    ),
                                );
                                (String::new(), 0)
                            }
                        };

                    let drcs = Drcs {
                        width: width as u32,
                        height: height as u32,
                        depth: depth as u32,
                        depth_bits,
                        pixels,
                        md5: digest,
                        alternative_text,
                        alternative_ucs4,
                    };

                    if byte_count == 1 {
                        let index = ((character_code & 0x0F00) >> 8) as u8 + 0x40;
                        let ch = (character_code & 0x00FF) & 0x7F;
                        let resolved = drcs_codeset_by_f(index)
                            .ok_or(Error::UnknownDesignator(index))?;
                        let map_index = resolved
                            .graphics_set
                            .drcs_index()
                            .ok_or(Error::UnknownDesignator(index))?;
                        self.drcs_maps[map_index].insert(ch, drcs);
                    } else {
                        let ch = character_code & 0x7F7F;
                        self.drcs_maps[0].insert(ch, drcs);
                    }
                } else {
                    if offset + 4 > data.len() {
                        return Err(Error::DrcsTruncated { code_index, font_index });
                    }
                    let geometric_data_length =
                        BigEndian::read_u16(&data[offset + 2..offset + 4]) as usize;
                    offset += 4 + geometric_data_length;
                    if offset > data.len() {
                        return Err(Error::DrcsTruncated { code_index, font_index });
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_c0(&mut self, data: &[u8]) -> Result<usize> {
        let remain = data.len();
        let b = data[0];
        let bytes = match b {
            0x00 | 0x07 => 1, // NUL, BEL
            0x08 => {
                self.move_relative_active_pos(-1, 0);
                1
            }
            0x09 => {
                self.move_relative_active_pos(1, 0);
                1
            }
            0x0A => {
                self.move_relative_active_pos(0, 1);
                1
            }
            0x0B => {
                self.move_relative_active_pos(0, -1);
                1
            }
            0x0C => {
                // Clear screen
                self.reset_internal_state();
                if let Some(caption) = self.caption.as_mut() {
                    caption.flags |= CaptionFlags::CLEAR_SCREEN;
                }
                1
            }
            0x0D => {
                if let Some(caption) = self.caption.as_mut() {
                    caption.text.push('\n');
                }
                self.move_active_pos_to_newline();
                1
            }
            0x0E => {
                self.gl = 1;
                1
            }
            0x0F => {
                self.gl = 0;
                1
            }
            0x16 => {
                if remain < 2 {
                    return Ok(0);
                }
                let step = (data[1] & 0b0011_1111) as i32;
                self.move_relative_active_pos(step, 0);
                2
            }
            0x18 => 1, // CAN
            0x19 => {
                // SS2
                if remain < 2 {
                    return Ok(0);
                }
                1 + self.handle_glgr(&data[1..], 2)?
            }
            0x1B => {
                if remain < 2 {
                    return Ok(0);
                }
                1 + self.handle_esc(&data[1..])?
            }
            0x1C => {
                if remain < 3 {
                    return Ok(0);
                }
                let y = (data[1] & 0b0011_1111) as i32;
                let x = (data[2] & 0b0011_1111) as i32;
                self.set_absolute_active_pos(x, y);
                3
            }
            0x1D => {
                // SS3
                if remain < 2 {
                    return Ok(0);
                }
                1 + self.handle_glgr(&data[1..], 3)?
            }
            0x1E | 0x1F => 1, // RS, US
            0x20 => {
                // SP
                if self.active_encoding == EncodingScheme::AbntNbr15606Latin
                    || self.active_encoding == EncodingScheme::AribStdB24Utf8
                {
                    self.push_character(0x0020, 0);
                } else {
                    self.push_character(0x3000, 0);
                }
                self.move_relative_active_pos(1, 0);
                1
            }
            _ => 1,
        };
        Ok(bytes)
    }

    fn handle_esc(&mut self, data: &[u8]) -> Result<usize> {
        let remain = data.len();
        match data[0] {
            0x6E => {
                self.gl = 2;
                Ok(1)
            }
            0x6F => {
                self.gl = 3;
                Ok(1)
            }
            0x7E => {
                self.gr = 1;
                Ok(1)
            }
            0x7D => {
                self.gr = 2;
                Ok(1)
            }
            0x7C => {
                self.gr = 3;
                Ok(1)
            }
            0x24 => {
                if remain < 2 {
                    return Ok(0);
                }
                if data[1] >= 0x28 && data[1] <= 0x2B {
                    if remain < 3 {
                        return Ok(0);
                    }
                    let gx_index = (data[1] - 0x28) as usize;
                    if data[2] == 0x20 {
                        if remain < 4 {
                            return Ok(0);
                        }
                        self.gx[gx_index] =
                            drcs_codeset_by_f(data[3]).ok_or(Error::UnknownDesignator(data[3]))?;
                        Ok(4)
                    } else {
                        self.gx[gx_index] =
                            g_codeset_by_f(data[2]).ok_or(Error::UnknownDesignator(data[2]))?;
                        Ok(3)
                    }
                } else {
                    self.gx[0] = g_codeset_by_f(data[1]).ok_or(Error::UnknownDesignator(data[1]))?;
                    Ok(2)
                }
            }
            f if (0x28..=0x2B).contains(&f) => {
                if remain < 2 {
                    return Ok(0);
                }
                let gx_index = (f - 0x28) as usize;
                if data[1] == 0x20 {
                    if remain < 3 {
                        return Ok(0);
                    }
                    self.gx[gx_index] =
                        drcs_codeset_by_f(data[2]).ok_or(Error::UnknownDesignator(data[2]))?;
                    Ok(3)
                } else {
                    self.gx[gx_index] =
                        g_codeset_by_f(data[1]).ok_or(Error::UnknownDesignator(data[1]))?;
                    Ok(2)
                }
            }
            _ => Ok(0),
        }
    }

    fn handle_c1(&mut self, data: &[u8]) -> Result<usize> {
        let remain = data.len();
        let bytes = match data[0] {
            0x7F => 1, // DEL
            0x80 => {
                self.text_color = colors::lookup(self.palette, 0);
                1
            }
            0x81 => {
                self.text_color = colors::lookup(self.palette, 1);
                1
            }
            0x82 => {
                self.text_color = colors::lookup(self.palette, 2);
                1
            }
            0x83 => {
                self.text_color = colors::lookup(self.palette, 3);
                1
            }
            0x84 => {
                self.text_color = colors::lookup(self.palette, 4);
                1
            }
            0x85 => {
                self.text_color = colors::lookup(self.palette, 5);
                1
            }
            0x86 => {
                self.text_color = colors::lookup(self.palette, 6);
                1
            }
            0x87 => {
                self.text_color = colors::lookup(self.palette, 7);
                1
            }
            0x90 => {
                // COL
                if remain < 2 {
                    return Ok(0);
                }
                if data[1] == 0x20 {
                    if remain < 3 {
                        return Ok(0);
                    }
                    self.palette = data[2] & 0x0F;
                    3
                } else if data[1] >= 0x48 && data[1] <= 0x7F {
                    match data[1] & 0xF0 {
                        0x40 => self.text_color = colors::lookup(self.palette, data[1] & 0x0F),
                        0x50 => self.back_color = colors::lookup(self.palette, data[1] & 0x0F),
                        _ => {}
                    }
                    2
                } else {
                    return Err(Error::ControlCodeParseFailure { byte: data[1], offset: 1 });
                }
            }
            0x91 => {
                // FLC
                if remain < 2 {
                    return Ok(0);
                }
                2
            }
            0x88 => {
                self.char_horizontal_scale = 0.5;
                self.char_vertical_scale = 0.5;
                1
            }
            0x89 => {
                self.char_horizontal_scale = 0.5;
                self.char_vertical_scale = 1.0;
                1
            }
            0x8A => {
                self.char_horizontal_scale = 1.0;
                self.char_vertical_scale = 1.0;
                1
            }
            0x8B => {
                // SZX
                if remain < 2 {
                    return Ok(0);
                }
                match data[1] {
                    0x41 => self.char_vertical_scale = 2.0,
                    0x44 => self.char_horizontal_scale = 2.0,
                    0x45 => {
                        self.char_horizontal_scale = 2.0;
                        self.char_vertical_scale = 2.0;
                    }
                    _ => {}
                }
                2
            }
            0x92 => {
                // CDC
                if remain < 2 {
                    return Ok(0);
                }
                if data[1] == 0x20 {
                    if remain < 3 {
                        return Ok(0);
                    }
                    3
                } else {
                    2
                }
            }
            0x94 => {
                // WMM
                if remain < 2 {
                    return Ok(0);
                }
                2
            }
            0x9D => {
                // TIME
                if remain < 2 {
                    return Ok(0);
                }
                if data[1] == 0x20 {
                    if remain < 3 {
                        return Ok(0);
                    }
                    let p2 = (data[2] & 0b0011_1111) as i64;
                    if let Some(caption) = self.caption.as_mut() {
                        caption.wait_duration += p2 * 100;
                        caption.flags |= CaptionFlags::WAIT_DURATION;
                    }
                    3
                } else if data[1] == 0x28 {
                    3
                } else {
                    return Err(Error::ControlCodeParseFailure { byte: data[1], offset: 1 });
                }
            }
            0x95 => {
                // MACRO, not used per ARIB TR-B14
                return Err(Error::ControlCodeParseFailure { byte: 0x95, offset: 0 });
            }
            0x98 => {
                // RPC; repeat-expansion is not implemented.
                // TODO: expand the repeated character run instead of
                // discarding the repeat count.
                if remain < 2 {
                    return Ok(0);
                }
                2
            }
            0x9A => {
                self.has_underline = true;
                1
            }
            0x99 => {
                self.has_underline = false;
                1
            }
            0x97 => {
                // HLC
                if remain < 2 {
                    return Ok(0);
                }
                self.enclosure_style = EnclosureStyle::from_bits_truncate((data[1] & 0x0F) as u32);
                2
            }
            0x9B => {
                // CSI
                if remain < 2 {
                    return Ok(0);
                }
                1 + self.handle_csi(&data[1..])?
            }
            0x93 => 2, // POL
            _ => 1,
        };
        Ok(bytes)
    }

    fn handle_csi(&mut self, data: &[u8]) -> Result<usize> {
        let remain = data.len();
        let mut param1: u32 = 0;
        let mut param2: u32 = 0;
        let mut param_count = 0usize;
        let mut offset = 0usize;

        while offset < remain {
            let b = data[offset];
            if (0x30..=0x39).contains(&b) {
                if param_count <= 1 {
                    param2 = param2 * 10 + (b & 0x0F) as u32;
                }
            } else if b == 0x20 {
                if param_count == 0 {
                    param1 = param2;
                }
                param_count += 1;
                break;
            } else if b == 0x3B {
                if param_count == 0 {
                    param1 = param2;
                    param2 = 0;
                }
                param_count += 1;
            }
            offset += 1;
        }

        offset += 1;
        if offset >= remain {
            return Err(Error::ControlCodeParseFailure { byte: 0x9B, offset });
        }

        match data[offset] {
            0x53 => {
                // SWF
                if param_count == 1 {
                    self.swf = param1 as u8;
                }
                self.reset_writing_format();
            }
            0x54 => {} // CCC
            0x56 => {
                // SDF
                self.display_area_width = param1 as i32;
                self.display_area_height = param2 as i32;
            }
            0x57 => {
                // SSM
                self.char_width = param1 as i32;
                self.char_height = param2 as i32;
            }
            0x58 => self.char_horizontal_spacing = param1 as i32, // SHS
            0x59 => self.char_vertical_spacing = param1 as i32,   // SVS
            0x5B | 0x5C | 0x5D | 0x5E => {} // PLD, PLU, GAA, SRC
            0x5F => {
                // SDP
                self.display_area_start_x = param1 as i32;
                if param_count >= 2 {
                    self.display_area_start_y = param2 as i32;
                }
                if !self.active_pos_inited {
                    self.set_absolute_active_pos(0, 0);
                }
            }
            0x61 => {
                // ACPS
                self.set_absolute_active_coordinate_dot(param1 as i32, param2 as i32);
            }
            0x62 => {} // TCC
            0x63 => {
                // ORN
                if param1 == 0 {
                    self.has_stroke = false;
                } else if param1 == 1 && param_count >= 2 {
                    let p2 = param2 / 100;
                    let p3 = param2 % 100;
                    if p2 >= 8 || p3 >= 16 {
                        return Err(Error::ControlCodeParseFailure { byte: 0x63, offset });
                    }
                    self.has_stroke = true;
                    self.stroke_color = colors::lookup(p2 as u8, p3 as u8);
                }
            }
            0x64 => {
                // MDF
                match param1 {
                    0 => {
                        self.has_bold = false;
                        self.has_italic = false;
                    }
                    1 => self.has_bold = true,
                    2 => self.has_italic = true,
                    3 => {
                        self.has_bold = true;
                        self.has_italic = true;
                    }
                    _ => {}
                }
            }
            0x65 | 0x66 | 0x67 => {} // CFS, XCS, SCR
            0x68 => {
                // PRA
                self.has_builtin_sound = true;
                self.builtin_sound_id = param1 as u8;
            }
            0x42 | 0x69 | 0x6A | 0x6E | 0x6F => {} // GSM, ACS, UED, RCS, SCS
            _ => {}
        }

        Ok(offset + 1)
    }

    fn handle_glgr(&mut self, data: &[u8], register: usize) -> Result<usize> {
        let remain = data.len();
        let ch = data[0] & 0x7F;
        if ch < 0x21 || ch >= 0x7F {
            return Ok(0);
        }

        let entry = self.gx[register];
        let mut ch2 = 0u8;
        if entry.bytes == 2 {
            if remain < 2 {
                return Ok(0);
            }
            ch2 = data[1] & 0x7F;
            if ch2 < 0x21 || ch2 >= 0x7F {
                return Ok(0);
            }
        }

        use GraphicSet::*;
        match entry.graphics_set {
            Hiragana | ProportionalHiragana => {
                let ucs4 = charsets::lookup(&charsets::HIRAGANA, ch);
                self.push_character(ucs4, 0);
                self.move_relative_active_pos(1, 0);
            }
            Katakana | ProportionalKatakana => {
                let ucs4 = charsets::lookup(&charsets::KATAKANA, ch);
                self.push_character(ucs4, 0);
                self.move_relative_active_pos(1, 0);
            }
            JisX0201Katakana => {
                let ucs4 = charsets::lookup(&charsets::JIS_X0201_KATAKANA, ch);
                self.push_character(ucs4, 0);
                self.move_relative_active_pos(1, 0);
            }
            Kanji | JisX0213_2004Kanji1 | JisX0213_2004Kanji2 | AdditionalSymbols => {
                let ku = (ch - 0x21) as u32;
                let ten = (ch2 - 0x21) as u32;

                let (mut ucs4, mut pua) = (0u32, 0u32);
                if ku < GAIJI_BEGIN_KU {
                    ucs4 = kanji::kanji_lookup((ku + 1) as u8, (ten + 1) as u8);
                    if (0xFF01..=0xFF5E).contains(&ucs4)
                        && self.replace_msz_fullwidth_ascii
                        && self.char_horizontal_scale * 2.0 == self.char_vertical_scale
                    {
                        ucs4 = (ucs4 & 0xFF) + 0x20;
                    }
                } else {
                    let (u, p) = kanji::additional_symbol_lookup(
                        (ku - GAIJI_BEGIN_KU + 1) as u8,
                        (ten + 1) as u8,
                    );
                    ucs4 = u;
                    pua = p;
                    if pua == ucs4 || !(0xE000..=0xF8FF).contains(&pua) {
                        pua = 0;
                    }
                }
                self.push_character(ucs4, pua);
                self.move_relative_active_pos(1, 0);
            }
            Alphanumeric | ProportionalAlphanumeric => {
                let ucs4 = if self.active_encoding == EncodingScheme::AbntNbr15606Latin {
                    charsets::lookup(&charsets::ALPHANUMERIC_LATIN, ch)
                } else if self.replace_msz_fullwidth_ascii
                    && self.char_horizontal_scale * 2.0 == self.char_vertical_scale
                {
                    charsets::lookup(&charsets::ALPHANUMERIC_HALFWIDTH, ch)
                } else {
                    charsets::lookup(&charsets::ALPHANUMERIC_FULLWIDTH, ch)
                };
                self.push_character(ucs4, 0);
                self.move_relative_active_pos(1, 0);
            }
            LatinExtension => {
                let ucs4 = charsets::lookup(&charsets::LATIN_EXTENSION, ch);
                self.push_character(ucs4, 0);
                self.move_relative_active_pos(1, 0);
            }
            LatinSpecial => {
                let ucs4 = charsets::lookup(&charsets::LATIN_SPECIAL, ch);
                self.push_character(ucs4, 0);
                self.move_relative_active_pos(1, 0);
            }
            Macro => {
                let key = ch;
                if (0x60..=0x6F).contains(&key) {
                    let seq = macros::default_macro(key);
                    if !seq.is_empty() {
                        self.parse_statement_body(seq)?;
                    }
                }
            }
            other if other.drcs_index().is_some() => {
                let map_index = other.drcs_index().unwrap();
                let mut key = ch as u16;
                if entry.bytes == 2 {
                    key = (key << 8) | ch2 as u16;
                }

                match self.drcs_maps[map_index].get(&key) {
                    None => self.push_character(0x3013, 0),
                    Some(drcs) => {
                        let code = ((map_index as u32) << 16) | key as u32;
                        let drcs = drcs.clone();
                        self.push_drcs_character(code, drcs);
                    }
                }
                self.move_relative_active_pos(1, 0);
            }
            _ => {}
        }

        Ok(entry.bytes as usize)
    }

    fn handle_utf8(&mut self, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let (ucs4, consumed) = decode_utf8_codepoint(data);
        self.push_character(ucs4, 0);
        self.move_relative_active_pos(1, 0);
        Ok(consumed)
    }

    fn push_character(&mut self, ucs4: u32, pua: u32) {
        let text = char::from_u32(ucs4).map(|c| c.to_string()).unwrap_or_default();

        let is_ruby = self.is_ruby_mode();
        if let Some(caption) = self.caption.as_mut() {
            if !is_ruby {
                if let Some(c) = char::from_u32(ucs4) {
                    caption.text.push(c);
                }
            }
        }

        let caption_char = CaptionChar {
            char_type: CaptionCharType::Text,
            codepoint: ucs4,
            pua_codepoint: pua,
            text,
            drcs_code: 0,
            x: 0,
            y: 0,
            char_width: 0,
            char_height: 0,
            char_horizontal_spacing: 0,
            char_vertical_spacing: 0,
            char_horizontal_scale: 0.0,
            char_vertical_scale: 0.0,
            text_color: ColorRgba::default(),
            back_color: ColorRgba::default(),
            stroke_color: ColorRgba::default(),
            style: CharStyle::empty(),
            enclosure_style: EnclosureStyle::empty(),
        };
        let caption_char = self.apply_caption_char_common_properties(caption_char);
        self.push_caption_char(caption_char);
    }

    fn push_drcs_character(&mut self, code: u32, drcs: Drcs) {
        let is_ruby = self.is_ruby_mode();
        let (char_type, text, codepoint) = if drcs.alternative_text.is_empty() {
            if let Some(caption) = self.caption.as_mut() {
                caption.text.push('\u{3013}');
            }
            (CaptionCharType::Drcs, String::new(), 0)
        } else {
            if !is_ruby {
                if let Some(caption) = self.caption.as_mut() {
                    caption.text.push_str(&drcs.alternative_text);
                }
            }
            (
                CaptionCharType::DrcsReplaced,
                drcs.alternative_text.clone(),
                drcs.alternative_ucs4,
            )
        };

        let caption_char = CaptionChar {
            char_type,
            codepoint,
            pua_codepoint: 0,
            text,
            drcs_code: code,
            x: 0,
            y: 0,
            char_width: 0,
            char_height: 0,
            char_horizontal_spacing: 0,
            char_vertical_spacing: 0,
            char_horizontal_scale: 0.0,
            char_vertical_scale: 0.0,
            text_color: ColorRgba::default(),
            back_color: ColorRgba::default(),
            stroke_color: ColorRgba::default(),
            style: CharStyle::empty(),
            enclosure_style: EnclosureStyle::empty(),
        };
        let caption_char = self.apply_caption_char_common_properties(caption_char);

        if let Some(caption) = self.caption.as_mut() {
            caption.drcs_map.entry(code).or_insert(drcs);
        }

        self.push_caption_char(caption_char);
    }

    fn apply_caption_char_common_properties(&self, mut caption_char: CaptionChar) -> CaptionChar {
        caption_char.x = self.active_pos_x;
        caption_char.y = self.active_pos_y - self.section_height();
        caption_char.char_width = self.char_width as u32;
        caption_char.char_height = self.char_height as u32;
        caption_char.char_horizontal_spacing = self.char_horizontal_spacing as u32;
        caption_char.char_vertical_spacing = self.char_vertical_spacing as u32;
        caption_char.char_horizontal_scale = self.char_horizontal_scale;
        caption_char.char_vertical_scale = self.char_vertical_scale;
        caption_char.text_color = self.text_color;
        caption_char.back_color = self.back_color;

        if self.has_underline {
            caption_char.style |= CharStyle::UNDERLINE;
        }
        if self.has_bold {
            caption_char.style |= CharStyle::BOLD;
        }
        if self.has_italic {
            caption_char.style |= CharStyle::ITALIC;
        }
        if self.has_stroke {
            caption_char.style |= CharStyle::STROKE;
            caption_char.stroke_color = self.stroke_color;
        }
        caption_char.enclosure_style = self.enclosure_style;

        caption_char
    }

    fn push_caption_char(&mut self, caption_char: CaptionChar) {
        if self.need_new_caption_region() {
            self.make_new_caption_region();
        }
        let caption = self.caption.as_mut().expect("caption set for call duration");
        let region = caption.regions.last_mut().expect("region just ensured");
        region.width += caption_char.section_width();
        region.chars.push(caption_char);
    }

    fn need_new_caption_region(&self) -> bool {
        let caption = match self.caption.as_ref() {
            Some(c) => c,
            None => return true,
        };
        let prev_region = match caption.regions.last() {
            Some(r) => r,
            None => return true,
        };
        let prev_char = match prev_region.chars.last() {
            Some(c) => c,
            None => return false,
        };

        if self.active_pos_x != prev_char.x + prev_char.section_width() as i32 {
            return true;
        }
        if self.active_pos_y - self.section_height() != prev_char.y {
            return true;
        }
        if self.section_height() as u32 != prev_char.section_height() {
            return true;
        }
        false
    }

    fn make_new_caption_region(&mut self) {
        let is_ruby = self.is_ruby_mode();
        let x = self.active_pos_x;
        let y = self.active_pos_y - self.section_height();
        let height = self.section_height() as u32;

        let caption = self.caption.as_mut().expect("caption set for call duration");
        if caption.regions.is_empty() || !caption.regions.last().unwrap().chars.is_empty() {
            caption.regions.push(CaptionRegion::new(x, y, height, is_ruby));
        }
        let region = caption.regions.last_mut().unwrap();
        region.x = x;
        region.y = y;
        region.height = height;
        if is_ruby {
            region.is_ruby = true;
        }
    }

    fn is_ruby_mode(&self) -> bool {
        if self.active_encoding != EncodingScheme::AribStdB24Jis {
            return false;
        }
        (self.char_horizontal_scale == 0.5 && self.char_vertical_scale == 0.5)
            || (self.profile == Profile::ProfileA && self.char_width == 18 && self.char_height == 18)
    }

    fn section_width(&self) -> i32 {
        (((self.char_width + self.char_horizontal_spacing) as f32) * self.char_horizontal_scale)
            .floor() as i32
    }

    fn section_height(&self) -> i32 {
        (((self.char_height + self.char_vertical_spacing) as f32) * self.char_vertical_scale)
            .floor() as i32
    }

    fn set_absolute_active_pos(&mut self, x: i32, y: i32) {
        self.active_pos_inited = true;
        self.active_pos_x = self.display_area_start_x + x * self.section_width();
        self.active_pos_y = self.display_area_start_y + (y + 1) * self.section_height();
    }

    fn set_absolute_active_coordinate_dot(&mut self, x: i32, y: i32) {
        self.active_pos_inited = true;
        self.active_pos_x = x;
        self.active_pos_y = y;
    }

    fn move_relative_active_pos(&mut self, mut x: i32, mut y: i32) {
        if self.active_pos_x < 0 || self.active_pos_y < 0 {
            self.set_absolute_active_pos(0, 0);
        }
        self.active_pos_inited = true;

        while x < 0 {
            self.active_pos_x -= self.section_width();
            x += 1;
            if self.active_pos_x < self.display_area_start_x {
                self.active_pos_x =
                    self.display_area_start_x + self.display_area_width - self.section_width();
                y -= 1;
            }
        }
        while x > 0 {
            self.active_pos_x += self.section_width();
            x -= 1;
            if self.active_pos_x >= self.display_area_start_x + self.display_area_width {
                self.active_pos_x = self.display_area_start_x;
                y += 1;
            }
        }
        // Vertical wrap is intentionally asymmetric: wrapping up re-enters at
        // the display area's bottom edge, wrapping down re-enters one
        // section below the top -- not the same point in both directions.
        while y < 0 {
            self.active_pos_y -= self.section_height();
            y += 1;
            if self.active_pos_y < self.display_area_start_y {
                self.active_pos_y = self.display_area_start_y + self.display_area_height;
            }
        }
        while y > 0 {
            self.active_pos_y += self.section_height();
            y -= 1;
            if self.active_pos_y > self.display_area_start_y + self.display_area_height {
                self.active_pos_y = self.display_area_start_y + self.section_height();
            }
        }
    }

    fn move_active_pos_to_newline(&mut self) {
        if self.active_pos_x < 0 || self.active_pos_y < 0 {
            self.set_absolute_active_pos(0, 0);
        }
        self.active_pos_inited = true;
        self.active_pos_x = self.display_area_start_x;
        self.active_pos_y += self.section_height();
    }
}

/// Decodes one UTF-8 codepoint, returning `(codepoint, bytes consumed)`.
/// Falls back to consuming a single byte as U+FFFD on malformed input so a
/// corrupt UTF-8 stream never stalls the statement-body loop.
fn decode_utf8_codepoint(data: &[u8]) -> (u32, usize) {
    let len = match data[0] {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return (0xFFFD, 1),
    };
    if data.len() < len {
        return (0xFFFD, 1);
    }
    match std::str::from_utf8(&data[..len]) {
        Ok(s) => match s.chars().next() {
            Some(c) => (c as u32, len),
            None => (0xFFFD, 1),
        },
        Err(_) => (0xFFFD, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pes_wrap(body: &[u8]) -> Vec<u8> {
        // data_identifier=0x80 (Caption), private_stream_id=0xFF,
        // PES_data_packet_header_length=0 (byte 2 low nibble).
        let mut out = vec![0x80, 0xFF, 0x00];
        // data_group_id byte: dgi_id in low 4 bits, group in bits 4-5.
        out.push(0x00 << 2); // dgi_id=0 (management data), group=0
        out.push(0x00); // data_group_link_number
        out.push(0x00); // last_data_group_link_number
        let size = body.len() as u16;
        out.push((size >> 8) as u8);
        out.push((size & 0xFF) as u8);
        out.extend_from_slice(body);
        out
    }

    fn statement_pes(body: &[u8]) -> Vec<u8> {
        let mut out = vec![0x80, 0xFF, 0x00];
        out.push(0x01 << 2); // dgi_id=1 (first language statement data)
        out.push(0x00);
        out.push(0x00);
        let size = body.len() as u16;
        out.push((size >> 8) as u8);
        out.push((size & 0xFF) as u8);
        out.extend_from_slice(body);
        out
    }

    fn management_body(num_languages: u8, lang: &[u8; 3], data_units: &[u8]) -> Vec<u8> {
        let mut out = vec![0x00]; // TMD=0
        out.push(num_languages);
        // language_tag=0, DMF=0b1000 (arbitrary non-extension value)
        out.push(0b000_1000);
        out.extend_from_slice(lang);
        out.push(0x08 << 4); // format=8 => SWF=7
        let loop_len = data_units.len() as u32;
        out.push(((loop_len >> 16) & 0xFF) as u8);
        out.push(((loop_len >> 8) & 0xFF) as u8);
        out.push((loop_len & 0xFF) as u8);
        out.extend_from_slice(data_units);
        out
    }

    fn statement_body(data_units: &[u8]) -> Vec<u8> {
        let mut out = vec![0x00]; // TMD=0
        let loop_len = data_units.len() as u32;
        out.push(((loop_len >> 16) & 0xFF) as u8);
        out.push(((loop_len >> 8) & 0xFF) as u8);
        out.push((loop_len & 0xFF) as u8);
        out.extend_from_slice(data_units);
        out
    }

    fn data_unit(statement: &[u8]) -> Vec<u8> {
        let mut out = vec![0x1F, 0x20];
        let len = statement.len() as u32;
        out.push(((len >> 16) & 0xFF) as u8);
        out.push(((len >> 8) & 0xFF) as u8);
        out.push((len & 0xFF) as u8);
        out.extend_from_slice(statement);
        out
    }

    #[test]
    fn pes_too_short_is_error() {
        let mut d = Decoder::with_defaults();
        assert!(d.decode(&[0x80, 0xFF], 0).is_error());
    }

    #[test]
    fn zero_length_data_group_is_no_caption() {
        let mut d = Decoder::with_defaults();
        let pes = vec![0x80, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(d.decode(&pes, 0), DecodeStatus::NoCaption));
    }

    #[test]
    fn management_data_sets_language_and_is_no_caption_alone() {
        let mut d = Decoder::with_defaults();
        let body = management_body(1, b"jpn", &[]);
        let pes = pes_wrap(&management_body(1, b"jpn", &[]));
        let _ = body;
        let status = d.decode(&pes, 1234);
        assert!(matches!(status, DecodeStatus::NoCaption));
        assert_eq!(
            d.query_iso6392_language_code(LanguageId::First),
            LanguageCode::three_cc(*b"jpn")
        );
    }

    #[test]
    fn retransmitted_management_data_is_ignored() {
        let mut d = Decoder::with_defaults();
        let pes = pes_wrap(&management_body(1, b"jpn", &[]));
        assert!(matches!(d.decode(&pes, 0), DecodeStatus::NoCaption));
        assert!(matches!(d.decode(&pes, 0), DecodeStatus::NoCaption));
    }

    #[test]
    fn simple_text_statement_produces_caption_with_region() {
        let mut d = Decoder::with_defaults();
        // Push plain alphanumeric 'A' (0x41) via GL (G0 = Kanji by default in
        // Profile A, so designate G0 to Alphanumeric first).
        let designate_g0_alphanumeric: &[u8] = &[0x1B, 0x28, 0x4A];
        let mut stmt = Vec::new();
        stmt.extend_from_slice(designate_g0_alphanumeric);
        stmt.push(0x41); // 'A'
        let du = data_unit(&stmt);
        let pes = statement_pes(&statement_body(&du));

        let status = d.decode(&pes, 5000);
        match status {
            DecodeStatus::GotCaption(caption) => {
                assert_eq!(caption.pts, 5000);
                assert_eq!(caption.regions.len(), 1);
                assert_eq!(caption.regions[0].chars.len(), 1);
                assert_eq!(caption.regions[0].chars[0].codepoint, 0xFF21); // fullwidth 'A'
            }
            other => panic!("expected GotCaption, got {other:?}"),
        }
    }

    #[test]
    fn clear_screen_sets_clear_screen_flag() {
        let mut d = Decoder::with_defaults();
        let stmt: &[u8] = &[0x0C]; // CS
        let du = data_unit(stmt);
        let pes = statement_pes(&statement_body(&du));
        match d.decode(&pes, 0) {
            DecodeStatus::GotCaption(caption) => {
                assert!(caption.flags.contains(CaptionFlags::CLEAR_SCREEN));
            }
            other => panic!("expected GotCaption, got {other:?}"),
        }
    }

    #[test]
    fn time_control_accumulates_wait_duration() {
        let mut d = Decoder::with_defaults();
        // TIME (0x9D) 0x20 p2=5 -> +500ms, plus a visible char so the caption
        // is non-empty.
        let designate_g0_alphanumeric: &[u8] = &[0x1B, 0x28, 0x4A];
        let mut stmt = Vec::new();
        stmt.extend_from_slice(designate_g0_alphanumeric);
        stmt.push(0x41);
        stmt.extend_from_slice(&[0x9D, 0x20, 0x05]);
        let du = data_unit(&stmt);
        let pes = statement_pes(&statement_body(&du));
        match d.decode(&pes, 0) {
            DecodeStatus::GotCaption(caption) => {
                assert_eq!(caption.wait_duration, 500);
                assert!(caption.flags.contains(CaptionFlags::WAIT_DURATION));
            }
            other => panic!("expected GotCaption, got {other:?}"),
        }
    }

    #[test]
    fn active_position_forward_advances_region_x() {
        let mut d = Decoder::with_defaults();
        let designate_g0_alphanumeric: &[u8] = &[0x1B, 0x28, 0x4A];
        let mut stmt = Vec::new();
        stmt.extend_from_slice(designate_g0_alphanumeric);
        stmt.push(0x41);
        stmt.push(0x41);
        let du = data_unit(&stmt);
        let pes = statement_pes(&statement_body(&du));
        match d.decode(&pes, 0) {
            DecodeStatus::GotCaption(caption) => {
                assert_eq!(caption.regions.len(), 1);
                let chars = &caption.regions[0].chars;
                assert_eq!(chars.len(), 2);
                assert_eq!(chars[1].x, chars[0].x + chars[0].section_width() as i32);
            }
            other => panic!("expected GotCaption, got {other:?}"),
        }
    }

    #[test]
    fn unknown_designator_is_error() {
        let mut d = Decoder::with_defaults();
        let stmt: &[u8] = &[0x1B, 0x28, 0xFF]; // bogus G0 final byte
        let du = data_unit(stmt);
        let pes = statement_pes(&statement_body(&du));
        assert!(d.decode(&pes, 0).is_error());
    }

    #[test]
    fn encoding_scheme_alias_matches() {
        assert_eq!(
            EncodingScheme::ISDB_T_PHILIPPINES_UTF8,
            EncodingScheme::AribStdB24Utf8
        );
    }
}
