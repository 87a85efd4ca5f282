//! Line reconstruction
//!
//! Regroups colored runs by line feed for append-only rendering. The last,
//! unterminated line stays open until a later chunk terminates it.

use super::segment::ColoredSegment;

/// One terminal line as colored runs, without its line feed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub runs: Vec<ColoredSegment>,
    /// False only for a line flushed at session teardown
    pub terminated: bool,
}

impl Line {
    /// Plain text of the line
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|run| run.text.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct LineReconstructor {
    open: Vec<ColoredSegment>,
}

impl LineReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append segments and return every line they complete
    pub fn push<I>(&mut self, segments: I) -> Vec<Line>
    where
        I: IntoIterator<Item = ColoredSegment>,
    {
        let mut lines = Vec::new();

        for segment in segments {
            let mut rest = segment.text.as_str();
            while let Some(idx) = rest.find('\n') {
                let head = &rest[..idx];
                if !head.is_empty() {
                    self.open.push(segment.with_text(head.to_string()));
                }
                lines.push(Line {
                    runs: std::mem::take(&mut self.open),
                    terminated: true,
                });
                rest = &rest[idx + 1..];
            }
            if !rest.is_empty() {
                self.open.push(segment.with_text(rest.to_string()));
            }
        }

        lines
    }

    /// Whether an unterminated line is buffered
    #[allow(dead_code)]
    pub fn has_open_line(&self) -> bool {
        !self.open.is_empty()
    }

    /// Flush the open line, if any
    pub fn finish(&mut self) -> Option<Line> {
        if self.open.is_empty() {
            return None;
        }
        Some(Line {
            runs: std::mem::take(&mut self.open),
            terminated: false,
        })
    }
}
