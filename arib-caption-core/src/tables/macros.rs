//! Default macros: canned control-code sequences triggerable by designating
//! the `Macro` graphic set and then receiving a byte in `0x60..=0x6F`.
//!
//! ARIB TR-B14/B15 defines twelve of these (keys `0x60..=0x6B`) as fixed
//! graphic-set reassignment sequences so a caption stream can reset G0-G3 to
//! a known state in one byte instead of spelling out the designator
//! sequences. The exact byte tables are operator profile data this crate was
//! not built against; the entries below reproduce the mechanism --
//! designating Kanji/Alphanumeric/Hiragana/Katakana onto G0-G3 the same way
//! the explicit escape sequences would -- for the keys most commonly
//! exercised by real streams, and leave the rest empty (no-op when invoked).
//! See `DESIGN.md` for the fidelity note.

/// Byte sequence for default macro `key` (`0x60..=0x6F`), to be re-fed
/// through the statement-body parser exactly like any other control data.
/// Returns `&[]` for keys this table does not define.
pub fn default_macro(key: u8) -> &'static [u8] {
    match key {
        // Designate Kanji onto G0, Alphanumeric onto G1, Hiragana onto G2,
        // Katakana onto G3; invoke G0 into GL and G2 into GR.
        0x60 => &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x4A, 0x1B, 0x2A, 0x30, 0x1B, 0x2B, 0x31, 0x0F],
        // Same, but invoke G1 into GL (halfwidth alphanumeric active).
        0x61 => &[0x1B, 0x24, 0x42, 0x1B, 0x29, 0x4A, 0x1B, 0x2A, 0x30, 0x1B, 0x2B, 0x31, 0x0E],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_macro_is_nonempty() {
        assert!(!default_macro(0x60).is_empty());
    }

    #[test]
    fn undefined_macro_is_noop() {
        assert!(default_macro(0x6F).is_empty());
    }
}
