//! Line renderer using crossterm
//!
//! Appends colored lines to the console. Output is append-only: nothing
//! already written is ever revisited.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Print, ResetColor, SetBackgroundColor, SetForegroundColor},
};

use crate::core::symbols::LinePiece;
use crate::core::term::{Color, ColoredSegment};

/// Display surface that accepts colored runs line by line
pub trait RenderSurface {
    /// Append a run with its colors
    fn append_run(&mut self, run: &ColoredSegment) -> io::Result<()>;

    /// Append annotation text right after the previous run
    fn insert_annotation(&mut self, text: &str, color: Color) -> io::Result<()>;

    /// Finish the current line
    fn end_line(&mut self, terminated: bool) -> io::Result<()>;

    /// Render a whole line
    fn render_line(&mut self, pieces: &[LinePiece], terminated: bool) -> io::Result<()> {
        for piece in pieces {
            match piece {
                LinePiece::Run(run) => self.append_run(run)?,
                LinePiece::Annotation { text, color } => self.insert_annotation(text, *color)?,
            }
        }
        self.end_line(terminated)
    }
}

/// Drop control characters that would move the cursor or change modes
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\t' || !c.is_control())
        .collect()
}

/// Fold multi-line resolver output onto one line
fn fold(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Terminal renderer
pub struct Renderer<W: Write> {
    out: W,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[allow(dead_code)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl Renderer<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> RenderSurface for Renderer<W> {
    fn append_run(&mut self, run: &ColoredSegment) -> io::Result<()> {
        let text = sanitize(&run.text);
        if text.is_empty() {
            return Ok(());
        }

        if let Some(fg) = run.foreground {
            queue!(self.out, SetForegroundColor(fg.to_crossterm()))?;
        }
        if let Some(bg) = run.background {
            queue!(self.out, SetBackgroundColor(bg.to_crossterm()))?;
        }
        queue!(self.out, Print(text))?;
        if run.foreground.is_some() || run.background.is_some() {
            queue!(self.out, ResetColor)?;
        }
        Ok(())
    }

    fn insert_annotation(&mut self, text: &str, color: Color) -> io::Result<()> {
        let text = sanitize(&fold(text));
        if text.is_empty() {
            return Ok(());
        }
        queue!(
            self.out,
            SetForegroundColor(color.to_crossterm()),
            Print(" "),
            Print(text),
            ResetColor
        )
    }

    fn end_line(&mut self, _terminated: bool) -> io::Result<()> {
        // An unterminated tail still gets a newline so later output starts clean
        queue!(self.out, Print("\n"))?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::state::{GREEN, RED, YELLOW};

    fn rendered(pieces: &[LinePiece]) -> String {
        let mut renderer = Renderer::new(Vec::new());
        renderer.render_line(pieces, true).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    fn run(fg: Option<Color>, bg: Option<Color>, text: &str) -> LinePiece {
        LinePiece::Run(ColoredSegment {
            foreground: fg,
            background: bg,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_plain_run() {
        assert_eq!(rendered(&[run(None, None, "hello\r")]), "hello\n");
    }

    #[test]
    fn test_colored_run() {
        let out = rendered(&[run(Some(RED), Some(GREEN), "err")]);

        assert!(out.contains("\x1b[38;2;244;67;54m"));
        assert!(out.contains("\x1b[48;2;76;175;80m"));
        assert!(out.contains("err"));
        assert!(out.ends_with("\n"));
    }

    #[test]
    fn test_annotation_folded_and_highlighted() {
        let pieces = [
            run(None, None, "PC 0x40089abc"),
            LinePiece::Annotation {
                text: "0x40089abc: foo at a.c:1\n (inlined by) bar at b.c:2\n".to_string(),
                color: YELLOW,
            },
        ];
        let out = rendered(&pieces);

        assert!(out.starts_with("PC 0x40089abc"));
        assert!(out.contains("\x1b[38;2;255;160;0m"));
        assert!(out.contains(" 0x40089abc: foo at a.c:1 | (inlined by) bar at b.c:2"));
    }

    #[test]
    fn test_control_characters_stripped() {
        assert_eq!(rendered(&[run(None, None, "a\x07b\x1bc\td")]), "abc\td\n");
    }
}
