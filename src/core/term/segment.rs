//! Color segmentation
//!
//! Slices scanned text into runs that share one color pair.

use super::parser::{EscapeToken, TokenKind};
use super::state::{Color, ColorState};

/// A run of text drawn with one foreground/background pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColoredSegment<T = String> {
    pub foreground: Option<Color>,
    pub background: Option<Color>,
    pub text: T,
}

impl<T> ColoredSegment<T> {
    pub fn new(colors: ColorState, text: T) -> Self {
        Self {
            foreground: colors.foreground,
            background: colors.background,
            text,
        }
    }

    pub fn colors(&self) -> ColorState {
        ColorState {
            foreground: self.foreground,
            background: self.background,
        }
    }

    /// Same colors, different text
    pub fn with_text<U>(&self, text: U) -> ColoredSegment<U> {
        ColoredSegment::new(self.colors(), text)
    }
}

/// Split `text` at the token boundaries, updating `state` token by token.
///
/// Each run carries the colors in effect before the token that ends it.
/// The final run (possibly empty) is always emitted, so text without any
/// token yields exactly one segment.
pub fn segment<'a>(
    text: &'a [u8],
    tokens: &[EscapeToken],
    state: &mut ColorState,
) -> Vec<ColoredSegment<&'a [u8]>> {
    let mut segments = Vec::with_capacity(tokens.len() + 1);
    let mut pos = 0;

    for token in tokens {
        if token.start > pos {
            segments.push(ColoredSegment::new(*state, &text[pos..token.start]));
        }
        if let TokenKind::Sgr(codes) = &token.kind {
            state.apply_sgr(codes);
        }
        pos = token.end;
    }

    segments.push(ColoredSegment::new(*state, &text[pos..]));
    segments
}
