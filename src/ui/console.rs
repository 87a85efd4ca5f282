//! Rendering context
//!
//! Consumes session events in order, annotates completed lines and hands
//! them to the rendering surface. Symbol lookups happen here, never on the
//! ingestion thread, so a slow resolver only delays what is on screen.

use std::io;

use crate::core::session::{CancelToken, SessionEvent};
use crate::core::symbols::{LinePiece, SymbolAnnotator};

use super::renderer::RenderSurface;

/// What the caller should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The session ended; its tail has been rendered
    Closed { session: u64 },
}

pub struct Console<S: RenderSurface> {
    surface: S,
    annotator: Option<SymbolAnnotator>,
    lines_rendered: u64,
}

impl<S: RenderSurface> Console<S> {
    pub fn new(surface: S, annotator: Option<SymbolAnnotator>) -> Self {
        Self {
            surface,
            annotator,
            lines_rendered: 0,
        }
    }

    #[allow(dead_code)]
    pub fn lines_rendered(&self) -> u64 {
        self.lines_rendered
    }

    #[allow(dead_code)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Apply one event. `cancel` belongs to the session that produced it.
    pub fn handle(&mut self, event: SessionEvent, cancel: &CancelToken) -> io::Result<Flow> {
        match event {
            SessionEvent::Lines { lines, .. } => {
                for line in &lines {
                    let pieces = match &self.annotator {
                        Some(annotator) => annotator.annotate(line, cancel),
                        None => LinePiece::plain(line),
                    };
                    self.surface.render_line(&pieces, line.terminated)?;
                    self.lines_rendered += 1;
                }
                Ok(Flow::Continue)
            }
            SessionEvent::Error { session, message } => {
                tracing::error!("Session {} source error: {}", session, message);
                Ok(Flow::Continue)
            }
            SessionEvent::Closed { session, tail } => {
                // No lookups once the session is gone
                if let Some(line) = tail {
                    self.surface.render_line(&LinePiece::plain(&line), line.terminated)?;
                    self.lines_rendered += 1;
                }
                tracing::info!("Session {} closed after {} line(s)", session, self.lines_rendered);
                Ok(Flow::Closed { session })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{Session, SessionOptions};
    use crate::core::symbols::DEFAULT_PATTERN;
    use crate::core::term::state::YELLOW;
    use crate::core::term::{Color, ColoredSegment};
    use regex::Regex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Records what was rendered as text, annotations in brackets
    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
        current: String,
    }

    impl RenderSurface for Recorder {
        fn append_run(&mut self, run: &ColoredSegment) -> io::Result<()> {
            self.current.push_str(&run.text);
            Ok(())
        }

        fn insert_annotation(&mut self, text: &str, _color: Color) -> io::Result<()> {
            self.current.push_str(&format!("[{}]", text));
            Ok(())
        }

        fn end_line(&mut self, _terminated: bool) -> io::Result<()> {
            self.lines.push(std::mem::take(&mut self.current));
            Ok(())
        }
    }

    fn annotator(translation: &'static str) -> SymbolAnnotator {
        let resolver = move |token: &str| -> Option<String> {
            if token == "0x40089abc" {
                Some(translation.to_string())
            } else {
                None
            }
        };
        SymbolAnnotator::new(Regex::new(DEFAULT_PATTERN).unwrap(), Box::new(resolver), YELLOW)
    }

    fn feed(console: &mut Console<Recorder>, chunks: &[&str], cancel: &CancelToken) {
        let mut session = Session::new(1, &SessionOptions::default());
        for chunk in chunks {
            let lines = session.process_chunk(chunk.as_bytes());
            if !lines.is_empty() {
                let event = SessionEvent::Lines { session: 1, lines };
                console.handle(event, cancel).unwrap();
            }
        }
        let flow = console
            .handle(SessionEvent::Closed { session: 1, tail: session.finish() }, cancel)
            .unwrap();
        assert_eq!(flow, Flow::Closed { session: 1 });
    }

    #[test]
    fn test_annotated_backtrace() {
        let mut console = Console::new(Recorder::default(), Some(annotator("app.c:42")));
        feed(
            &mut console,
            &["\x1b[0;31mBacktrace: 0x4008", "9abc:0x3ffb5e10\x1b[0m\n"],
            &CancelToken::new(),
        );

        assert_eq!(console.surface().lines, vec!["Backtrace: 0x40089abc[app.c:42]:0x3ffb5e10"]);
    }

    #[test]
    fn test_unknown_symbol_not_inserted() {
        let resolver = |_: &str| -> Option<String> { None };
        let ann = SymbolAnnotator::new(Regex::new(DEFAULT_PATTERN).unwrap(), Box::new(resolver), YELLOW);
        let mut console = Console::new(Recorder::default(), Some(ann));
        feed(&mut console, &["PC: 0x40089abc\n"], &CancelToken::new());

        assert_eq!(console.surface().lines, vec!["PC: 0x40089abc"]);
    }

    #[test]
    fn test_tail_rendered_without_lookup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let resolver = move |_: &str| -> Option<String> {
            counter.fetch_add(1, Ordering::SeqCst);
            Some("a.c:1".to_string())
        };
        let ann = SymbolAnnotator::new(Regex::new(DEFAULT_PATTERN).unwrap(), Box::new(resolver), YELLOW);
        let mut console = Console::new(Recorder::default(), Some(ann));
        feed(&mut console, &["first 0x40089abc\nprompt 0x40089abc"], &CancelToken::new());

        assert_eq!(console.surface().lines, vec!["first 0x40089abc[a.c:1]", "prompt 0x40089abc"]);
        assert_eq!(console.lines_rendered(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_session_renders_plain() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut console = Console::new(Recorder::default(), Some(annotator("a.c:1")));
        feed(&mut console, &["PC 0x40089abc\n"], &cancel);

        assert_eq!(console.surface().lines, vec!["PC 0x40089abc"]);
    }

    #[test]
    fn test_without_annotator() {
        let mut console = Console::new(Recorder::default(), None);
        feed(&mut console, &["\x1b[32mok\x1b[0m\r\n"], &CancelToken::new());

        assert_eq!(console.surface().lines, vec!["ok\r"]);
    }
}
