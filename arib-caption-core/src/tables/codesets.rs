//! Graphic-set designator tables: which final byte of an `ESC $? F` or
//! `ESC F` sequence selects which [`GraphicSet`], and how many bytes per
//! character that set uses.

/// A selectable graphic character set, loaded into one of the four
/// G0-G3 registers by a designator escape sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicSet {
    Kanji,
    Alphanumeric,
    LatinExtension,
    LatinSpecial,
    Hiragana,
    Katakana,
    MosaicA,
    MosaicB,
    MosaicC,
    MosaicD,
    ProportionalAlphanumeric,
    ProportionalHiragana,
    ProportionalKatakana,
    JisX0201Katakana,
    JisX0213_2004Kanji1,
    JisX0213_2004Kanji2,
    AdditionalSymbols,
    Drcs0,
    Drcs1,
    Drcs2,
    Drcs3,
    Drcs4,
    Drcs5,
    Drcs6,
    Drcs7,
    Drcs8,
    Drcs9,
    Drcs10,
    Drcs11,
    Drcs12,
    Drcs13,
    Drcs14,
    Drcs15,
    Macro,
}

impl GraphicSet {
    pub fn is_drcs(self) -> bool {
        matches!(
            self,
            GraphicSet::Drcs0
                | GraphicSet::Drcs1
                | GraphicSet::Drcs2
                | GraphicSet::Drcs3
                | GraphicSet::Drcs4
                | GraphicSet::Drcs5
                | GraphicSet::Drcs6
                | GraphicSet::Drcs7
                | GraphicSet::Drcs8
                | GraphicSet::Drcs9
                | GraphicSet::Drcs10
                | GraphicSet::Drcs11
                | GraphicSet::Drcs12
                | GraphicSet::Drcs13
                | GraphicSet::Drcs14
                | GraphicSet::Drcs15
        )
    }

    /// Index of this DRCS set within `drcs_maps_[0..16]`, if it is one.
    pub fn drcs_index(self) -> Option<usize> {
        use GraphicSet::*;
        Some(match self {
            Drcs0 => 0,
            Drcs1 => 1,
            Drcs2 => 2,
            Drcs3 => 3,
            Drcs4 => 4,
            Drcs5 => 5,
            Drcs6 => 6,
            Drcs7 => 7,
            Drcs8 => 8,
            Drcs9 => 9,
            Drcs10 => 10,
            Drcs11 => 11,
            Drcs12 => 12,
            Drcs13 => 13,
            Drcs14 => 14,
            Drcs15 => 15,
            _ => return None,
        })
    }
}

/// A resolved graphic-set designation: which set, and how many bytes (1 or 2)
/// identify a character within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodesetEntry {
    pub graphics_set: GraphicSet,
    pub bytes: u8,
}

const fn entry(graphics_set: GraphicSet, bytes: u8) -> CodesetEntry {
    CodesetEntry { graphics_set, bytes }
}

/// Looks up the non-DRCS graphic set designated by final byte `f` of a
/// `ESC $ F` / `ESC $ ( F` / `ESC ( F` sequence.
pub fn g_codeset_by_f(f: u8) -> Option<CodesetEntry> {
    use GraphicSet::*;
    Some(match f {
        0x42 => entry(Kanji, 2),
        0x4A => entry(Alphanumeric, 1),
        0x4B => entry(LatinExtension, 1),
        0x4C => entry(LatinSpecial, 1),
        0x30 => entry(Hiragana, 1),
        0x31 => entry(Katakana, 1),
        0x32 => entry(MosaicA, 1),
        0x33 => entry(MosaicB, 1),
        0x34 => entry(MosaicC, 1),
        0x35 => entry(MosaicD, 1),
        0x36 => entry(ProportionalAlphanumeric, 1),
        0x37 => entry(ProportionalHiragana, 1),
        0x38 => entry(ProportionalKatakana, 1),
        0x49 => entry(JisX0201Katakana, 1),
        0x39 => entry(JisX0213_2004Kanji1, 2),
        0x3A => entry(JisX0213_2004Kanji2, 2),
        0x3B => entry(AdditionalSymbols, 2),
        _ => return None,
    })
}

/// Looks up the DRCS graphic set designated by final byte `f` of a
/// `ESC $ ( F` / `ESC ( F` DRCS designation sequence.
pub fn drcs_codeset_by_f(f: u8) -> Option<CodesetEntry> {
    use GraphicSet::*;
    Some(match f {
        0x40 => entry(Drcs0, 2),
        0x41 => entry(Drcs1, 1),
        0x42 => entry(Drcs2, 1),
        0x43 => entry(Drcs3, 1),
        0x44 => entry(Drcs4, 1),
        0x45 => entry(Drcs5, 1),
        0x46 => entry(Drcs6, 1),
        0x47 => entry(Drcs7, 1),
        0x48 => entry(Drcs8, 1),
        0x49 => entry(Drcs9, 1),
        0x4A => entry(Drcs10, 1),
        0x4B => entry(Drcs11, 1),
        0x4C => entry(Drcs12, 1),
        0x4D => entry(Drcs13, 1),
        0x4E => entry(Drcs14, 1),
        0x4F => entry(Drcs15, 1),
        0x70 => entry(Macro, 1),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kanji_is_two_byte() {
        let e = g_codeset_by_f(0x42).unwrap();
        assert_eq!(e.graphics_set, GraphicSet::Kanji);
        assert_eq!(e.bytes, 2);
    }

    #[test]
    fn drcs_0_is_two_byte_rest_one_byte() {
        assert_eq!(drcs_codeset_by_f(0x40).unwrap().bytes, 2);
        assert_eq!(drcs_codeset_by_f(0x4F).unwrap().bytes, 1);
        assert_eq!(drcs_codeset_by_f(0x4F).unwrap().graphics_set, GraphicSet::Drcs15);
    }

    #[test]
    fn unknown_final_byte_is_none() {
        assert!(g_codeset_by_f(0xFF).is_none());
        assert!(drcs_codeset_by_f(0x00).is_none());
    }
}
