//! Symbol annotation
//!
//! Finds address-like tokens in completed lines and asks an external
//! resolver (normally `addr2line` from the target toolchain) for a source
//! location. Translations are spliced into the line right after the token.

use std::path::PathBuf;
use std::process::Command;

use regex::Regex;

use super::session::CancelToken;
use super::term::{Color, ColoredSegment, Line};

/// Default address token: a 32-bit address in the 0x4xxxxxxx range
pub const DEFAULT_PATTERN: &str = "0x4[0-9a-f]{7}";

/// addr2line output when the file is unknown
const UNKNOWN_FILE_MARKER: &str = "?? ??:0";
/// addr2line output when the symbol is unknown
const UNKNOWN_SYMBOL_MARKER: &str = "??:";

/// Translates an address token into a human-readable location
pub trait SymbolResolver {
    /// `None` means "no translation"; failures are never surfaced.
    fn resolve(&self, token: &str) -> Option<String>;
}

impl<F> SymbolResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, token: &str) -> Option<String> {
        self(token)
    }
}

/// Whether resolver output is a usable translation
pub fn is_translation(output: &str) -> bool {
    !output.contains(UNKNOWN_FILE_MARKER) && !output.contains(UNKNOWN_SYMBOL_MARKER)
}

/// Resolver that runs an addr2line-style executable once per token.
///
/// The command line is `<toolchain> <args...> <elf_file> <token>`; the
/// default arguments end in `-e` so the ELF path lands in the right spot.
#[derive(Debug, Clone)]
pub struct Addr2Line {
    toolchain: PathBuf,
    args: Vec<String>,
    elf_file: PathBuf,
}

impl Addr2Line {
    pub fn new(toolchain: impl Into<PathBuf>, cmd_arg: &str, elf_file: impl Into<PathBuf>) -> Self {
        Self {
            toolchain: toolchain.into(),
            args: cmd_arg.split_whitespace().map(str::to_string).collect(),
            elf_file: elf_file.into(),
        }
    }

    fn command(&self, token: &str) -> Command {
        let mut cmd = Command::new(&self.toolchain);
        cmd.args(&self.args).arg(&self.elf_file).arg(token);
        cmd
    }
}

impl SymbolResolver for Addr2Line {
    fn resolve(&self, token: &str) -> Option<String> {
        let output = match self.command(token).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Failed to run {}: {}", self.toolchain.display(), e);
                return None;
            }
        };

        if !output.status.success() {
            tracing::debug!("{} exited with {} for {}", self.toolchain.display(), output.status, token);
            return None;
        }

        let text = String::from_utf8_lossy(&output.stdout);
        if !is_translation(&text) {
            tracing::trace!("No symbol for {}", token);
            return None;
        }
        Some(text.into_owned())
    }
}

/// Piece of a rendered line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePiece {
    Run(ColoredSegment),
    /// Inserted translation, drawn in the highlight color
    Annotation { text: String, color: Color },
}

impl LinePiece {
    /// A line without any annotation
    pub fn plain(line: &Line) -> Vec<LinePiece> {
        line.runs.iter().cloned().map(LinePiece::Run).collect()
    }
}

/// Splices resolver translations into lines
pub struct SymbolAnnotator {
    pattern: Regex,
    resolver: Box<dyn SymbolResolver + Send>,
    highlight: Color,
}

impl std::fmt::Debug for SymbolAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolAnnotator")
            .field("pattern", &self.pattern.as_str())
            .field("highlight", &self.highlight)
            .finish()
    }
}

impl SymbolAnnotator {
    pub fn new(pattern: Regex, resolver: Box<dyn SymbolResolver + Send>, highlight: Color) -> Self {
        Self {
            pattern,
            resolver,
            highlight,
        }
    }

    /// Resolve every token in `line` and return its pieces with translations inserted.
    ///
    /// Stops calling the resolver once `cancel` fires; the rest of the line
    /// is still returned.
    pub fn annotate(&self, line: &Line, cancel: &CancelToken) -> Vec<LinePiece> {
        let text = line.text();
        let mut inserts: Vec<(usize, String)> = Vec::new();

        for m in self.pattern.find_iter(&text) {
            if cancel.is_cancelled() {
                tracing::debug!("Session closed, skipping remaining symbol lookups");
                break;
            }
            if let Some(translation) = self.resolver.resolve(m.as_str()) {
                let translation = translation.trim();
                if !translation.is_empty() && is_translation(translation) {
                    inserts.push((m.end(), translation.to_string()));
                }
            }
        }

        if inserts.is_empty() {
            return LinePiece::plain(line);
        }
        self.splice(line, inserts)
    }

    fn splice(&self, line: &Line, inserts: Vec<(usize, String)>) -> Vec<LinePiece> {
        let mut pieces = Vec::with_capacity(line.runs.len() + inserts.len() * 2);
        let mut inserts = inserts.into_iter().peekable();
        let mut offset = 0;

        for run in &line.runs {
            let run_end = offset + run.text.len();
            let mut cut = 0;

            while let Some((pos, text)) = inserts.next_if(|(pos, _)| *pos <= run_end) {
                let local = pos - offset;
                if local > cut {
                    pieces.push(LinePiece::Run(run.with_text(run.text[cut..local].to_string())));
                }
                pieces.push(LinePiece::Annotation {
                    text,
                    color: self.highlight,
                });
                cut = local;
            }

            if cut < run.text.len() {
                pieces.push(LinePiece::Run(run.with_text(run.text[cut..].to_string())));
            }
            offset = run_end;
        }

        pieces
    }
}
