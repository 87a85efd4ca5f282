//! Best-effort UTF-8 decoding of segment bytes
//!
//! Invalid bytes never stop the stream. A multi-byte character cut by a
//! chunk boundary is held back until the next call.

use serde::{Deserialize, Serialize};

/// What to do with bytes that are not valid UTF-8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// Drop invalid bytes
    #[default]
    Ignore,
    /// Substitute U+FFFD for each invalid sequence
    Replace,
}

/// Stateful UTF-8 decoder
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    policy: DecodePolicy,
    /// Incomplete character from the end of the previous call (at most 3 bytes)
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new(policy: DecodePolicy) -> Self {
        Self {
            policy,
            pending: Vec::new(),
        }
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let joined;
        let mut rest: &[u8] = if self.pending.is_empty() {
            bytes
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(bytes);
            joined = buf;
            &joined
        };

        let mut out = String::with_capacity(rest.len());
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(s) = std::str::from_utf8(valid) {
                        out.push_str(s);
                    }
                    match e.error_len() {
                        Some(len) => {
                            if self.policy == DecodePolicy::Replace {
                                out.push(char::REPLACEMENT_CHARACTER);
                            }
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Drain a held-back partial character
    pub fn flush(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() || self.policy == DecodePolicy::Ignore {
            String::new()
        } else {
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}
