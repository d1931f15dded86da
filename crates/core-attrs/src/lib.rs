//! Packed terminal attribute representation.
//!
//! An `Attributes` value packs an optional foreground colour, an optional
//! background colour, an optional bold flag and an optional underline flag
//! into a single `u64` so it stays cheap to copy through the rendering path.
//! Colours are either an 8-bit palette index or a 5-bit-per-channel RGB
//! triple; each field additionally carries a "present" bit so callers can
//! distinguish "unset" from "explicitly default".

use bitflags::bitflags;

/// Palette index that means "terminal default" (xterm256's 231 happens to
/// alias old-school colour 15, white).
pub const DEFAULT_CODE: u8 = 231;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Present: u8 {
        const FG        = 0b0001;
        const BG        = 0b0010;
        const BOLD      = 0b0100;
        const UNDERLINE = 0b1000;
    }
}

/// A colour value: either a palette index or a 5-bit-per-channel RGB triple.
///
/// `Rgb` stores channels already truncated to 5 bits (0..=31), matching the
/// packed wire representation; use [`Colour::from_rgb888`] to truncate a
/// full 8-bit triple and [`Colour::as_888`] to expand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Palette(u8),
    Rgb(u8, u8, u8),
}

impl Colour {
    pub fn from_rgb888(r: u8, g: u8, b: u8) -> Self {
        Colour::Rgb(r >> 3, g >> 3, b >> 3)
    }

    /// Expand to full 8-bit channels. Returns `None` for palette colours;
    /// palette-to-RGB resolution is a terminal/theme concern outside this crate.
    pub fn as_888(&self) -> Option<[u8; 3]> {
        match *self {
            Colour::Rgb(r, g, b) => Some([(r << 3) | (r & 7), (g << 3) | (g & 7), (b << 3) | (b & 7)]),
            Colour::Palette(_) => None,
        }
    }

    fn pack(self) -> u16 {
        match self {
            Colour::Palette(v) => v as u16,
            Colour::Rgb(r, g, b) => {
                0x8000 | (r as u16 & 0x1F) | ((g as u16 & 0x1F) << 5) | ((b as u16 & 0x1F) << 10)
            }
        }
    }

    fn unpack(v: u16) -> Self {
        if v & 0x8000 != 0 {
            let r = (v & 0x1F) as u8;
            let g = ((v >> 5) & 0x1F) as u8;
            let b = ((v >> 10) & 0x1F) as u8;
            Colour::Rgb(r, g, b)
        } else {
            Colour::Palette((v & 0xFF) as u8)
        }
    }
}

impl Default for Colour {
    fn default() -> Self {
        Colour::Palette(0)
    }
}

/// A single attribute field paired with whether it is present, and (for
/// colours) whether it resolves to the terminal-default sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColourAttr {
    pub value: Colour,
    pub present: bool,
    pub is_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoolAttr {
    pub value: bool,
    pub present: bool,
}

/// Packed fg/bg/bold/underline attribute value. Guaranteed to fit in 64 bits.
#[derive(Debug, Clone, Copy)]
pub struct Attributes {
    fg: Colour,
    bg: Colour,
    bold: bool,
    underline: bool,
    present: Present,
}

impl Default for Attributes {
    /// All fields absent (the "no opinion" attribute used as a merge base).
    fn default() -> Self {
        Self {
            fg: Colour::default(),
            bg: Colour::default(),
            bold: false,
            underline: false,
            present: Present::empty(),
        }
    }
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// All fields present: default-coded fg/bg, bold off, underline off.
    pub fn defaults() -> Self {
        let mut a = Self::new();
        a.reset_fg();
        a.reset_bg();
        a.set_bold(false);
        a.set_underline(false);
        a
    }

    pub fn reset_fg(&mut self) {
        self.fg = Colour::Palette(DEFAULT_CODE);
        self.present |= Present::FG;
    }

    pub fn reset_bg(&mut self) {
        self.bg = Colour::Palette(DEFAULT_CODE);
        self.present |= Present::BG;
    }

    pub fn set_fg(&mut self, mut value: u8) {
        if value == DEFAULT_CODE {
            value = 15;
        }
        self.fg = Colour::Palette(value);
        self.present |= Present::FG;
    }

    pub fn set_bg(&mut self, mut value: u8) {
        if value == DEFAULT_CODE {
            value = 15;
        }
        self.bg = Colour::Palette(value);
        self.present |= Present::BG;
    }

    pub fn set_fg_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.fg = Colour::from_rgb888(r, g, b);
        self.present |= Present::FG;
    }

    pub fn set_bg_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.bg = Colour::from_rgb888(r, g, b);
        self.present |= Present::BG;
    }

    pub fn set_bold(&mut self, state: bool) {
        self.bold = state;
        self.present |= Present::BOLD;
    }

    pub fn set_underline(&mut self, state: bool) {
        self.underline = state;
        self.present |= Present::UNDERLINE;
    }

    pub fn get_fg(&self) -> ColourAttr {
        ColourAttr {
            value: self.fg,
            present: self.present.contains(Present::FG),
            is_default: self.fg == Colour::Palette(DEFAULT_CODE),
        }
    }

    pub fn get_bg(&self) -> ColourAttr {
        ColourAttr {
            value: self.bg,
            present: self.present.contains(Present::BG),
            is_default: self.bg == Colour::Palette(DEFAULT_CODE),
        }
    }

    pub fn get_bold(&self) -> BoolAttr {
        BoolAttr {
            value: self.bold,
            present: self.present.contains(Present::BOLD),
        }
    }

    pub fn get_underline(&self) -> BoolAttr {
        BoolAttr {
            value: self.underline,
            present: self.present.contains(Present::UNDERLINE),
        }
    }

    /// `b`'s present fields override `a`'s; the result's present-mask is the union.
    pub fn merge(a: Attributes, b: Attributes) -> Attributes {
        Attributes {
            fg: if b.present.contains(Present::FG) { b.fg } else { a.fg },
            bg: if b.present.contains(Present::BG) { b.bg } else { a.bg },
            bold: if b.present.contains(Present::BOLD) { b.bold } else { a.bold },
            underline: if b.present.contains(Present::UNDERLINE) {
                b.underline
            } else {
                a.underline
            },
            present: a.present | b.present,
        }
    }

    /// Keeps only the fields of `to` that differ in value from `from`.
    pub fn diff(from: Attributes, to: Attributes) -> Attributes {
        let mut changed = Present::empty();
        if to.fg != from.fg {
            changed |= Present::FG;
        }
        if to.bg != from.bg {
            changed |= Present::BG;
        }
        if to.bold != from.bold {
            changed |= Present::BOLD;
        }
        if to.underline != from.underline {
            changed |= Present::UNDERLINE;
        }
        Attributes {
            present: to.present & changed,
            ..to
        }
    }

    /// Pack into the 64-bit wire representation.
    pub fn to_bits(self) -> u64 {
        let mut bits = 0u64;
        bits |= self.fg.pack() as u64;
        bits |= (self.bg.pack() as u64) << 16;
        bits |= (self.bold as u64) << 32;
        bits |= (self.underline as u64) << 33;
        bits |= (self.present.bits() as u64) << 36;
        bits
    }

    /// Parse the 64-bit wire representation produced by [`Attributes::to_bits`].
    pub fn from_bits(bits: u64) -> Self {
        let fg = Colour::unpack((bits & 0xFFFF) as u16);
        let bg = Colour::unpack(((bits >> 16) & 0xFFFF) as u16);
        let bold = (bits >> 32) & 1 != 0;
        let underline = (bits >> 33) & 1 != 0;
        let present = Present::from_bits_truncate(((bits >> 36) & 0xF) as u8);
        Self {
            fg,
            bg,
            bold,
            underline,
            present,
        }
    }
}

/// Comparing attributes ignores fields absent on either side.
impl PartialEq for Attributes {
    fn eq(&self, other: &Self) -> bool {
        let cmp = |present: bool, a_eq: bool| !present || a_eq;
        cmp(
            self.present.contains(Present::FG) && other.present.contains(Present::FG),
            self.fg == other.fg,
        ) && cmp(
            self.present.contains(Present::BG) && other.present.contains(Present::BG),
            self.bg == other.bg,
        ) && cmp(
            self.present.contains(Present::BOLD) && other.present.contains(Present::BOLD),
            self.bold == other.bold,
        ) && cmp(
            self.present.contains(Present::UNDERLINE) && other.present.contains(Present::UNDERLINE),
            self.underline == other.underline,
        )
    }
}
