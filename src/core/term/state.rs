//! Color state tracking
//!
//! Maps SGR parameter lists onto foreground/background colors and keeps
//! the per-session color state between chunks.

use serde::{Deserialize, Serialize};

/// Color definition (RGB), written as `#rrggbb` in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb`
    pub fn from_hex(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Convert to crossterm Color
    pub fn to_crossterm(self) -> crossterm::style::Color {
        crossterm::style::Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_hex(&text).ok_or_else(|| format!("invalid color {:?}, expected #rrggbb", text))
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Eight-entry palette shared by the foreground (30-37) and background (40-47) tables.
pub const PALETTE: [Color; 8] = [
    Color::new(0x00, 0x00, 0x00), // black
    Color::new(0xf4, 0x43, 0x36), // red
    Color::new(0x4c, 0xaf, 0x50), // green
    Color::new(0xff, 0xa0, 0x00), // yellow
    Color::new(0x21, 0x96, 0xf3), // blue
    Color::new(0xe8, 0x5a, 0xad), // magenta
    Color::new(0x26, 0xc6, 0xda), // cyan
    Color::new(0xa1, 0x88, 0x7f), // white
];

#[allow(dead_code)]
pub const RED: Color = PALETTE[1];
#[allow(dead_code)]
pub const GREEN: Color = PALETTE[2];
pub const YELLOW: Color = PALETTE[3];

/// Look up a foreground code (30-37)
pub fn foreground_color(code: u16) -> Option<Color> {
    match code {
        30..=37 => Some(PALETTE[usize::from(code - 30)]),
        _ => None,
    }
}

/// Look up a background code (40-47)
pub fn background_color(code: u16) -> Option<Color> {
    match code {
        40..=47 => Some(PALETTE[usize::from(code - 40)]),
        _ => None,
    }
}

/// Foreground/background colors in effect for a stream.
///
/// `None` means "no color": the rendering surface falls back to its own default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorState {
    pub foreground: Option<Color>,
    pub background: Option<Color>,
}

impl ColorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.foreground = None;
        self.background = None;
    }

    /// Apply one SGR parameter list, left to right, and return the new snapshot.
    ///
    /// An empty list behaves like `0`. Codes outside the color tables are ignored.
    pub fn apply_sgr(&mut self, codes: &[u16]) -> ColorState {
        if codes.is_empty() {
            self.reset();
            return *self;
        }

        for &code in codes {
            match code {
                0 => self.reset(),
                30..=37 => self.foreground = foreground_color(code),
                39 => self.foreground = None,
                40..=47 => self.background = background_color(code),
                49 => self.background = None,
                _ => {
                    tracing::trace!("Ignoring SGR code {}", code);
                }
            }
        }

        *self
    }
}
