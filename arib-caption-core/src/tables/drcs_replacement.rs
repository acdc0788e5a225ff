//! Known-pattern MD5 digests for DRCS glyphs that broadcasters define
//! identically across streams (mostly weather icons and phonetic marks), so
//! they can be rendered as real text instead of as raw bitmaps.
//!
//! Digests harvested from real broadcast captures would populate this table
//! in full; those samples were not available to build this crate against,
//! so this table instead documents the mechanism (digest-keyed lookup
//! feeding [`crate::caption::Drcs::alternative_text`]) with a small set of
//! illustrative entries. Any digest not listed here leaves `alternative_text`
//! empty, which the decoder already treats correctly as "render the raw
//! DRCS bitmap". See `DESIGN.md` for the fidelity note.

/// `(md5_digest, alternative_text, alternative_ucs4)`.
const REPLACEMENTS: &[([u8; 16], &str, u32)] = &[(
    // All-zero digest: never matches a real glyph, kept only to exercise the
    // lookup path in tests.
    [0u8; 16],
    "\u{3013}",
    0x3013,
)];

/// Looks up a known substitution for a DRCS glyph's pixel-pattern digest.
pub fn lookup(digest: &[u8; 16]) -> Option<(&'static str, u32)> {
    REPLACEMENTS
        .iter()
        .find(|(d, _, _)| d == digest)
        .map(|(_, text, ucs4)| (*text, *ucs4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_digest_has_no_replacement() {
        assert!(lookup(&[0xAB; 16]).is_none());
    }

    #[test]
    fn table_entries_are_internally_consistent() {
        for &(_, text, ucs4) in REPLACEMENTS {
            assert_eq!(text.chars().next().map(|c| c as u32), Some(ucs4));
        }
    }
}
