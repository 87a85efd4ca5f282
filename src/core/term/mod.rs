//! Escape-sequence aware text colorizer
//!
//! Pipeline stages, in the order a chunk flows through them:
//!
//! - **filter**: strips private-mode and erase-line sequences
//! - **parser**: finds complete CSI sequences and the incomplete tail
//! - **state**: SGR color resolution and per-session color state
//! - **segment**: colored runs between sequence boundaries
//! - **decode**: best-effort UTF-8 decoding
//! - **lines**: regrouping runs into terminal lines

pub mod decode;
pub mod filter;
pub mod lines;
pub mod parser;
pub mod segment;
pub mod state;

pub use decode::{DecodePolicy, Utf8Decoder};
pub use filter::strip_ignored;
pub use lines::{Line, LineReconstructor};
pub use parser::EscapeScanner;
pub use segment::{segment, ColoredSegment};
pub use state::{Color, ColorState};
