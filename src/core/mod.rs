//! Core stream processing components.
//!
//! - **term**: escape-sequence aware colorizer (filter, scanner, color
//!   state, segmentation, decoding, line reconstruction)
//! - **symbols**: address token annotation via an external resolver
//! - **session**: per-connection state and the ingestion thread
//!
//! # Architecture
//!
//! ```text
//! reader thread                          rendering context
//! ─────────────                          ─────────────────
//! chunk ─► Session                        Console
//!          ├── strip_ignored              ├── SymbolAnnotator ─► addr2line
//!          ├── EscapeScanner ◄ remainder  └── RenderSurface
//!          ├── segment ◄ ColorState
//!          ├── Utf8Decoder
//!          └── LineReconstructor ──Lines──►
//! ```

pub mod session;
pub mod symbols;
pub mod term;
