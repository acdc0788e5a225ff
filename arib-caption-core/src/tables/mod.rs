//! Static lookup data: graphic-set designator tables, the color CLUT, the
//! per-character-set codepoint tables, and default macros.

pub mod charsets;
pub mod codesets;
pub mod colors;
pub mod drcs_replacement;
pub mod kanji;
pub mod macros;

pub use codesets::GraphicSet;
