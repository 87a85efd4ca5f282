//! Ignore-sequence filter
//!
//! Strips sequences that carry no color information before the scanner
//! ever sees them: DEC private mode set/reset (`ESC [ ? Pn h` / `ESC [ ? Pn l`)
//! and erase-to-end-of-line (`ESC [ K`).

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::bytes::Regex;

fn ignore_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?-u)\x1b\[(?:\?[0-9;]*[hl]|K)").expect("ignore-sequence pattern is valid")
    })
}

/// Remove every ignore-sequence from `data`.
///
/// Borrows when nothing matched.
pub fn strip_ignored(data: &[u8]) -> Cow<'_, [u8]> {
    ignore_pattern().replace_all(data, &b""[..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_mode_removed() {
        let out = strip_ignored(b"abc\x1b[?25hdef\x1b[?1049l");
        assert_eq!(&*out, b"abcdef");
    }

    #[test]
    fn test_erase_line_removed() {
        let out = strip_ignored(b"\x1b[Kprompt> \x1b[K");
        assert_eq!(&*out, b"prompt> ");
    }

    #[test]
    fn test_color_sequences_kept() {
        let input = b"\x1b[31mred\x1b[0m";
        let out = strip_ignored(input);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(&*out, input);
    }

    #[test]
    fn test_multi_param_private_mode() {
        let out = strip_ignored(b"x\x1b[?1;25hy");
        assert_eq!(&*out, b"xy");
    }

    #[test]
    fn test_incomplete_private_mode_untouched() {
        let out = strip_ignored(b"x\x1b[?25");
        assert_eq!(&*out, b"x\x1b[?25");
    }
}
