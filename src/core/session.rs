//! Session management
//!
//! A session is one connection's lifetime: it owns the color state, the
//! escape remainder carried between chunks, the open line and the decoder.
//! The ingestion thread drives a session chunk by chunk and sends finished
//! lines to the rendering side over an ordered channel.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;

use super::term::{
    segment, strip_ignored, ColorState, ColoredSegment, DecodePolicy, EscapeScanner, Line,
    LineReconstructor, Utf8Decoder,
};

/// Default read size of the ingestion thread
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn reader thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Session events, in the order the ingestion thread produced them
#[derive(Debug)]
pub enum SessionEvent {
    /// Lines completed by one chunk
    Lines { session: u64, lines: Vec<Line> },
    /// Reading the source failed; `Closed` follows
    Error { session: u64, message: String },
    /// Source ended or the session was torn down
    Closed { session: u64, tail: Option<Line> },
}

/// Shared flag marking a session as torn down.
///
/// Pending annotation work checks it before each resolver call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-session pipeline settings
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub decode: DecodePolicy,
    /// Cap on a pending escape sequence, `None` for unbounded
    pub max_pending: Option<usize>,
    pub chunk_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            decode: DecodePolicy::default(),
            max_pending: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A colorizing stream session
#[derive(Debug)]
pub struct Session {
    /// Session ID
    pub id: u64,
    colors: ColorState,
    /// Incomplete escape sequence from the previous chunk
    remainder: Vec<u8>,
    scanner: EscapeScanner,
    decoder: Utf8Decoder,
    lines: LineReconstructor,
    cancel: CancelToken,
    chunk_size: usize,
}

impl Session {
    /// Create a new session
    pub fn new(id: u64, options: &SessionOptions) -> Self {
        Self {
            id,
            colors: ColorState::new(),
            remainder: Vec::new(),
            scanner: EscapeScanner::new(options.max_pending),
            decoder: Utf8Decoder::new(options.decode),
            lines: LineReconstructor::new(),
            cancel: CancelToken::new(),
            chunk_size: options.chunk_size.max(1),
        }
    }

    /// Colors that will apply to the next text
    pub fn colors(&self) -> ColorState {
        self.colors
    }

    /// Incomplete sequence waiting for the next chunk
    pub fn remainder(&self) -> &[u8] {
        &self.remainder
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Filter, scan and segment one chunk into decoded colored runs
    pub fn segment_chunk(&mut self, chunk: &[u8]) -> Vec<ColoredSegment> {
        let mut data = std::mem::take(&mut self.remainder);
        data.extend_from_slice(chunk);

        let filtered = strip_ignored(&data);
        let scan = self.scanner.scan(&filtered);
        let runs = segment(scan.text, &scan.tokens, &mut self.colors);

        let segments = runs
            .iter()
            .map(|run| run.with_text(self.decoder.decode(run.text)))
            .collect();

        if !scan.remainder.is_empty() {
            tracing::trace!("Session {}: carrying {} byte(s) of escape sequence", self.id, scan.remainder.len());
        }
        self.remainder = scan.remainder.to_vec();
        segments
    }

    /// Run one chunk through the whole pipeline, returning completed lines
    pub fn process_chunk(&mut self, chunk: &[u8]) -> Vec<Line> {
        let segments = self.segment_chunk(chunk);
        self.lines.push(segments)
    }

    /// End the session: flush the open line, drop color state and remainder
    pub fn finish(mut self) -> Option<Line> {
        let partial = self.decoder.flush();
        if !partial.is_empty() {
            self.lines.push([ColoredSegment::new(self.colors, partial)]);
        }
        if !self.remainder.is_empty() {
            tracing::debug!("Session {}: discarding {} byte(s) of incomplete sequence", self.id, self.remainder.len());
        }
        self.lines.finish()
    }

    /// Start the ingestion thread reading chunks from `source`
    pub fn spawn_reader<R>(self, source: R, tx: Sender<SessionEvent>) -> Result<ReaderHandle, SessionError>
    where
        R: Read + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let id = self.id;

        let thread = thread::Builder::new()
            .name(format!("serterm-reader-{}", id))
            .spawn(move || read_loop(self, source, tx))
            .map_err(SessionError::Spawn)?;

        tracing::debug!("Session {} reader started", id);
        Ok(ReaderHandle {
            id,
            cancel,
            thread: Some(thread),
        })
    }
}

fn read_loop<R: Read>(mut session: Session, mut source: R, tx: Sender<SessionEvent>) {
    let mut buffer = vec![0u8; session.chunk_size];
    let cancel = session.cancel_token();
    let id = session.id;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match source.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                let lines = session.process_chunk(&buffer[..n]);
                if lines.is_empty() {
                    continue;
                }
                if tx.send(SessionEvent::Lines { session: id, lines }).is_err() {
                    // Rendering side is gone
                    cancel.cancel();
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!("Session {}: read error: {}", id, e);
                let _ = tx.send(SessionEvent::Error {
                    session: id,
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    let tail = session.finish();
    let _ = tx.send(SessionEvent::Closed { session: id, tail });
    tracing::debug!("Session {} reader finished", id);
}

/// Handle to a running ingestion thread
#[derive(Debug)]
pub struct ReaderHandle {
    pub id: u64,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Tear the session down. The reader exits at its next chunk boundary.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the reader thread to exit
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        // A reader blocked in read() cannot be interrupted, so it is detached
        self.cancel.cancel();
    }
}

/// Open the byte source: a file or device node, or stdin for `None` / `-`
pub fn open_source(path: Option<&Path>) -> Result<Box<dyn Read + Send>, SessionError> {
    match path {
        None => Ok(Box::new(io::stdin())),
        Some(p) if p == Path::new("-") => Ok(Box::new(io::stdin())),
        Some(p) => {
            let file = File::open(p).map_err(|source| SessionError::Open {
                path: p.to_path_buf(),
                source,
            })?;
            Ok(Box::new(file))
        }
    }
}
