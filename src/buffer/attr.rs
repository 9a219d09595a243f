//! Packed cell attributes
//!
//! Two encodings share the same style vocabulary:
//!
//! - low-color: 4 attribute bytes `[fg index, bg index, style, special]`
//! - HD: 10 attribute bytes `[fg RGBA, bg RGBA, style, misc]`
//!
//! The unpacked mirrors `Attr`/`AttrHd` round-trip losslessly through
//! `encode`/`decode`. The full-width lead/trail markers live in the
//! special/misc byte but belong to the *cell*, not the attribute: the cell
//! codec owns those bits and the attribute codecs mask them out.

use serde::{Deserialize, Serialize};

/// Style bitmask values, shared by both encodings.
pub mod style {
    pub const BOLD: u8 = 1;
    pub const DIM: u8 = 2;
    pub const ITALIC: u8 = 4;
    pub const UNDERLINE: u8 = 8;
    pub const BLINK: u8 = 16;
    pub const INVERSE: u8 = 32;
    pub const HIDDEN: u8 = 64;
    pub const STRIKE: u8 = 128;
}

/// Special/misc bitmask values.
pub mod special {
    pub const FG_TRANSPARENCY: u8 = 1;
    pub const BG_TRANSPARENCY: u8 = 2;
    pub const STYLE_TRANSPARENCY: u8 = 4;
    pub const CHAR_TRANSPARENCY: u8 = 8;
    /// All four transparency planes at once.
    pub const TRANSPARENCY: u8 = 15;
    /// First cell of a full-width glyph pair.
    pub const LEADING_FULLWIDTH: u8 = 16;
    /// Second cell of a full-width glyph pair.
    pub const TRAILING_FULLWIDTH: u8 = 32;

    pub const FULLWIDTH: u8 = LEADING_FULLWIDTH | TRAILING_FULLWIDTH;
}

/// Unpacked low-color attribute: indexed colors plus style and transparency
/// flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    /// Foreground palette index.
    pub fg: u8,
    /// Background palette index.
    pub bg: u8,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strike: bool,
    pub fg_transparency: bool,
    pub bg_transparency: bool,
    pub style_transparency: bool,
    pub char_transparency: bool,
}

impl Default for Attr {
    fn default() -> Self {
        Self {
            fg: Attr::DEFAULT_FG,
            bg: Attr::DEFAULT_BG,
            bold: false,
            dim: false,
            italic: false,
            underline: false,
            blink: false,
            inverse: false,
            hidden: false,
            strike: false,
            fg_transparency: false,
            bg_transparency: false,
            style_transparency: false,
            char_transparency: false,
        }
    }
}

impl Attr {
    pub const DEFAULT_FG: u8 = 7;
    pub const DEFAULT_BG: u8 = 0;

    /// Size of the packed encoding in bytes.
    pub const SIZE: usize = 4;

    /// Fully transparent attribute, skipped entirely by blending draws.
    pub fn transparent() -> Self {
        Self {
            fg_transparency: true,
            bg_transparency: true,
            style_transparency: true,
            char_transparency: true,
            ..Self::default()
        }
    }

    /// True iff every transparency plane is set.
    pub fn is_fully_transparent(&self) -> bool {
        self.fg_transparency
            && self.bg_transparency
            && self.style_transparency
            && self.char_transparency
    }

    fn style_byte(&self) -> u8 {
        let mut s = 0;
        if self.bold {
            s |= style::BOLD;
        }
        if self.dim {
            s |= style::DIM;
        }
        if self.italic {
            s |= style::ITALIC;
        }
        if self.underline {
            s |= style::UNDERLINE;
        }
        if self.blink {
            s |= style::BLINK;
        }
        if self.inverse {
            s |= style::INVERSE;
        }
        if self.hidden {
            s |= style::HIDDEN;
        }
        if self.strike {
            s |= style::STRIKE;
        }
        s
    }

    fn special_byte(&self) -> u8 {
        let mut s = 0;
        if self.fg_transparency {
            s |= special::FG_TRANSPARENCY;
        }
        if self.bg_transparency {
            s |= special::BG_TRANSPARENCY;
        }
        if self.style_transparency {
            s |= special::STYLE_TRANSPARENCY;
        }
        if self.char_transparency {
            s |= special::CHAR_TRANSPARENCY;
        }
        s
    }

    /// Pack into the 4-byte wire form.
    pub fn encode(&self) -> [u8; 4] {
        [self.fg, self.bg, self.style_byte(), self.special_byte()]
    }

    /// Unpack from the 4-byte wire form. Full-width markers in the special
    /// byte are ignored; they are cell state, not attribute state.
    pub fn decode(bytes: [u8; 4]) -> Self {
        let s = bytes[2];
        let sp = bytes[3];
        Self {
            fg: bytes[0],
            bg: bytes[1],
            bold: s & style::BOLD != 0,
            dim: s & style::DIM != 0,
            italic: s & style::ITALIC != 0,
            underline: s & style::UNDERLINE != 0,
            blink: s & style::BLINK != 0,
            inverse: s & style::INVERSE != 0,
            hidden: s & style::HIDDEN != 0,
            strike: s & style::STRIKE != 0,
            fg_transparency: sp & special::FG_TRANSPARENCY != 0,
            bg_transparency: sp & special::BG_TRANSPARENCY != 0,
            style_transparency: sp & special::STYLE_TRANSPARENCY != 0,
            char_transparency: sp & special::CHAR_TRANSPARENCY != 0,
        }
    }
}

/// An RGBA color channel quadruple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Unpacked HD attribute: RGBA color planes plus style and transparency
/// flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrHd {
    pub fg: Rgba,
    pub bg: Rgba,
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strike: bool,
    pub style_transparency: bool,
    pub char_transparency: bool,
}

impl Default for AttrHd {
    fn default() -> Self {
        Self {
            fg: Rgba::opaque(229, 229, 229),
            bg: Rgba::opaque(0, 0, 0),
            bold: false,
            dim: false,
            italic: false,
            underline: false,
            blink: false,
            inverse: false,
            hidden: false,
            strike: false,
            style_transparency: false,
            char_transparency: false,
        }
    }
}

impl AttrHd {
    /// Size of the packed encoding in bytes.
    pub const SIZE: usize = 10;

    /// Attribute skipped entirely by blending draws: both alpha planes zero.
    pub fn transparent() -> Self {
        Self {
            fg: Rgba::new(0, 0, 0, 0),
            bg: Rgba::new(0, 0, 0, 0),
            style_transparency: true,
            char_transparency: true,
            ..Self::default()
        }
    }

    fn style_byte(&self) -> u8 {
        let mut s = 0;
        if self.bold {
            s |= style::BOLD;
        }
        if self.dim {
            s |= style::DIM;
        }
        if self.italic {
            s |= style::ITALIC;
        }
        if self.underline {
            s |= style::UNDERLINE;
        }
        if self.blink {
            s |= style::BLINK;
        }
        if self.inverse {
            s |= style::INVERSE;
        }
        if self.hidden {
            s |= style::HIDDEN;
        }
        if self.strike {
            s |= style::STRIKE;
        }
        s
    }

    fn misc_byte(&self) -> u8 {
        let mut s = 0;
        if self.style_transparency {
            s |= special::STYLE_TRANSPARENCY;
        }
        if self.char_transparency {
            s |= special::CHAR_TRANSPARENCY;
        }
        s
    }

    /// Pack into the 10-byte wire form.
    pub fn encode(&self) -> [u8; 10] {
        [
            self.fg.r,
            self.fg.g,
            self.fg.b,
            self.fg.a,
            self.bg.r,
            self.bg.g,
            self.bg.b,
            self.bg.a,
            self.style_byte(),
            self.misc_byte(),
        ]
    }

    /// Unpack from the 10-byte wire form, ignoring full-width markers.
    pub fn decode(bytes: [u8; 10]) -> Self {
        let s = bytes[8];
        let m = bytes[9];
        Self {
            fg: Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            bg: Rgba::new(bytes[4], bytes[5], bytes[6], bytes[7]),
            bold: s & style::BOLD != 0,
            dim: s & style::DIM != 0,
            italic: s & style::ITALIC != 0,
            underline: s & style::UNDERLINE != 0,
            blink: s & style::BLINK != 0,
            inverse: s & style::INVERSE != 0,
            hidden: s & style::HIDDEN != 0,
            strike: s & style::STRIKE != 0,
            style_transparency: m & special::STYLE_TRANSPARENCY != 0,
            char_transparency: m & special::CHAR_TRANSPARENCY != 0,
        }
    }
}

/// A 256-entry color register table.
///
/// Owned by whoever needs it and passed by reference into the escape
/// encoder and the nearest-color search; there is no ambient global table.
/// Registers can be rewritten at runtime (OSC 4) and restored to their
/// xterm defaults.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: [(u8, u8, u8); 256],
}

impl Default for Palette {
    fn default() -> Self {
        Self::xterm()
    }
}

impl Palette {
    /// The standard xterm 256-color palette: 16 named colors, a 6x6x6 color
    /// cube, and a 24-step grayscale ramp.
    pub fn xterm() -> Self {
        let mut colors = [(0u8, 0u8, 0u8); 256];
        for (i, slot) in colors.iter_mut().enumerate() {
            *slot = Self::xterm_entry(i as u8);
        }
        Self { colors }
    }

    fn xterm_entry(index: u8) -> (u8, u8, u8) {
        match index {
            0 => (0, 0, 0),
            1 => (205, 0, 0),
            2 => (0, 205, 0),
            3 => (205, 205, 0),
            4 => (0, 0, 238),
            5 => (205, 0, 205),
            6 => (0, 205, 205),
            7 => (229, 229, 229),
            8 => (127, 127, 127),
            9 => (255, 0, 0),
            10 => (0, 255, 0),
            11 => (255, 255, 0),
            12 => (92, 92, 255),
            13 => (255, 0, 255),
            14 => (0, 255, 255),
            15 => (255, 255, 255),
            16..=231 => {
                let n = index - 16;
                let r = n / 36;
                let g = (n % 36) / 6;
                let b = n % 6;
                let ramp = |v: u8| if v == 0 { 0 } else { 55 + v * 40 };
                (ramp(r), ramp(g), ramp(b))
            }
            232..=255 => {
                let gray = 8 + (index - 232) * 10;
                (gray, gray, gray)
            }
        }
    }

    /// Look up a register.
    #[inline]
    pub fn get(&self, index: u8) -> (u8, u8, u8) {
        self.colors[index as usize]
    }

    /// Overwrite a register.
    #[inline]
    pub fn set(&mut self, index: u8, r: u8, g: u8, b: u8) {
        self.colors[index as usize] = (r, g, b);
    }

    /// Restore a register to its xterm default.
    #[inline]
    pub fn reset_index(&mut self, index: u8) {
        self.colors[index as usize] = Self::xterm_entry(index);
    }

    /// Index of the register closest to an RGB value (squared-distance).
    pub fn nearest(&self, r: u8, g: u8, b: u8) -> u8 {
        let mut best = 0usize;
        let mut best_dist = i64::MAX;
        for (i, &(cr, cg, cb)) in self.colors.iter().enumerate() {
            let dr = cr as i64 - r as i64;
            let dg = cg as i64 - g as i64;
            let db = cb as i64 - b as i64;
            let dist = dr * dr + dg * dg + db * db;
            if dist < best_dist {
                best_dist = dist;
                best = i;
                if dist == 0 {
                    break;
                }
            }
        }
        best as u8
    }
}
