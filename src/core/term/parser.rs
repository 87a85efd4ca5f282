//! Escape sequence scanner
//!
//! Splits filtered chunk bytes into complete CSI sequences and the text
//! around them, and detects a trailing sequence that is still incomplete so
//! the session can carry it into the next chunk.

const ESC: u8 = 0x1B;

/// What a complete sequence means for the color state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// `ESC [ Pn ; Pn ... m` with purely numeric parameters
    Sgr(Vec<u16>),
    /// Any other complete CSI sequence, identified by its final byte.
    /// Consumed without color effect.
    Control(u8),
}

/// A complete escape sequence located in the scanned bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeToken {
    /// Offset of the introducer byte
    pub start: usize,
    /// Offset one past the final byte
    pub end: usize,
    pub kind: TokenKind,
}

impl EscapeToken {
    /// Raw bytes of the sequence within the scanned input
    #[allow(dead_code)]
    pub fn bytes<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start..self.end]
    }
}

/// Result of scanning one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan<'a> {
    /// Bytes to segment (everything before the remainder)
    pub text: &'a [u8],
    /// Complete sequences in order, offsets relative to `text`
    pub tokens: Vec<EscapeToken>,
    /// Incomplete trailing sequence, empty or starting with ESC
    pub remainder: &'a [u8],
}

#[derive(Clone, Copy, Default, PartialEq, Debug)]
enum ScanState {
    #[default]
    Plain,
    SeenIntroducer,
    SeenBracket,
    InCodes,
}

/// Escape scanner state machine
///
/// The machine is restarted for every chunk; continuity across chunks comes
/// from the session prepending the previous remainder.
#[derive(Debug, Clone, Default)]
pub struct EscapeScanner {
    /// Longest trailing incomplete sequence kept as remainder. Complete
    /// sequences are never capped. `None` carries any pending tail.
    max_pending: Option<usize>,
    state: ScanState,
    seq_start: usize,
    params: Vec<u16>,
    current_param: Option<u16>,
    numeric_only: bool,
}

impl EscapeScanner {
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            max_pending,
            ..Self::default()
        }
    }

    /// Scan `data` for complete sequences and an incomplete trailing one
    pub fn scan<'a>(&mut self, data: &'a [u8]) -> Scan<'a> {
        self.state = ScanState::Plain;
        self.seq_start = 0;
        let mut tokens = Vec::new();

        for (i, &byte) in data.iter().enumerate() {
            if let Some(token) = self.feed(i, byte) {
                tokens.push(token);
            }
        }

        let split = match (self.state, self.max_pending) {
            (ScanState::Plain, _) => data.len(),
            (_, Some(cap)) if data.len() - self.seq_start > cap => {
                tracing::trace!("Pending sequence at {} exceeds {} bytes, treating as text", self.seq_start, cap);
                data.len()
            }
            _ => self.seq_start,
        };
        self.state = ScanState::Plain;

        let (text, remainder) = data.split_at(split);
        Scan { text, tokens, remainder }
    }

    fn enter_introducer(&mut self, pos: usize) {
        self.state = ScanState::SeenIntroducer;
        self.seq_start = pos;
    }

    fn enter_bracket(&mut self) {
        self.state = ScanState::SeenBracket;
        self.params.clear();
        self.current_param = None;
        self.numeric_only = true;
    }

    /// Feed a single byte, returning a token when it completes a sequence
    fn feed(&mut self, pos: usize, byte: u8) -> Option<EscapeToken> {
        match self.state {
            ScanState::Plain => {
                if byte == ESC {
                    self.enter_introducer(pos);
                }
                None
            }
            ScanState::SeenIntroducer => {
                match byte {
                    b'[' => self.enter_bracket(),
                    ESC => self.enter_introducer(pos),
                    // Lone ESC stays in the text
                    _ => self.state = ScanState::Plain,
                }
                None
            }
            ScanState::SeenBracket | ScanState::InCodes => self.codes(pos, byte),
        }
    }

    fn codes(&mut self, pos: usize, byte: u8) -> Option<EscapeToken> {
        match byte {
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                self.current_param = Some(
                    self.current_param.unwrap_or(0).saturating_mul(10).saturating_add(digit),
                );
                self.state = ScanState::InCodes;
            }
            b';' => {
                self.params.push(self.current_param.take().unwrap_or(0));
                self.state = ScanState::InCodes;
            }
            // Remaining parameter bytes (: < = > ?) and intermediates
            0x3A..=0x3F | 0x20..=0x2F => {
                self.numeric_only = false;
                self.state = ScanState::InCodes;
            }
            0x40..=0x7E => {
                if let Some(p) = self.current_param.take() {
                    self.params.push(p);
                }
                let kind = if byte == b'm' && self.numeric_only {
                    TokenKind::Sgr(std::mem::take(&mut self.params))
                } else {
                    TokenKind::Control(byte)
                };
                self.state = ScanState::Plain;
                return Some(EscapeToken {
                    start: self.seq_start,
                    end: pos + 1,
                    kind,
                });
            }
            ESC => {
                // Abandon the current sequence, its bytes become text
                self.enter_introducer(pos);
            }
            _ => {
                self.state = ScanState::Plain;
            }
        }
        None
    }
}
