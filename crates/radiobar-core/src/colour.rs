//! Hex colour codes from the feed's `colour` field.
//!
//! Accepted forms are `RRGGBB` and `RRGGBBAA`, with an optional leading `#`
//! and surrounding whitespace.  Anything else resolves to [`Colour::DEFAULT`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colour {
    /// Fallback for unparseable codes: an opaque slate grey (`#3C3C50`).
    pub const DEFAULT: Colour = Colour::rgb(0x3c, 0x3c, 0x50);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    /// Parse a hex code, returning `None` when it is not 6 or 8 hex digits.
    pub fn parse(code: &str) -> Option<Self> {
        let trimmed = code.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
        if !matches!(hex.len(), 6 | 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let (r, g, b) = (byte(0)?, byte(2)?, byte(4)?);
        let a = if hex.len() == 8 { byte(6)? } else { 0xff };
        Some(Self { r, g, b, a })
    }

    /// Parse a hex code, falling back to [`Colour::DEFAULT`].
    pub fn parse_or_default(code: &str) -> Self {
        Self::parse(code).unwrap_or(Self::DEFAULT)
    }

    /// Perceived brightness in 0..=255, used to pick readable text on top.
    pub fn luma(&self) -> u8 {
        let l = 0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32;
        l.round().clamp(0.0, 255.0) as u8
    }
}

impl Default for Colour {
    fn default() -> Self {
        Self::DEFAULT
    }
}
