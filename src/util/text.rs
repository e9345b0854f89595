use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Display width of a string in terminal columns (CJK-aware).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Single-column ellipsis used when clipping card text.
const ELLIPSIS: char = '…';
const ELLIPSIS_WIDTH: usize = 1;

/// Clips a string to at most `max_width` terminal columns.
///
/// Returns the input unchanged (borrowed) when it already fits. When clipping
/// is needed the result ends in `…`, except at widths too narrow to spend a
/// column on the ellipsis, where as many characters as fit are kept instead.
/// Feed titles are routinely CJK, so all width math is column-based, never
/// byte- or char-count-based.
pub fn fit_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(take_columns(s, max_width));
    }
    let mut out = take_columns(s, max_width - ELLIPSIS_WIDTH);
    out.push(ELLIPSIS);
    Cow::Owned(out)
}

/// Longest prefix of `s` occupying at most `budget` columns.
fn take_columns(s: &str, budget: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Scrubs untrusted feed text before it reaches the terminal.
///
/// Titles, ratings, and episode blurbs come straight from a remote endpoint
/// (possibly via third-party relays), so anything that could drive the
/// terminal is removed:
///
/// - C0 controls and DEL; tab/newline/CR are folded to a single space since
///   cards render on one line
/// - C1 controls (U+0080..U+009F), including the single-char CSI U+009B
/// - ESC-introduced CSI and OSC sequences, swallowed through their terminator
/// - any other bare ESC
///
/// Clean input (the common case) is returned borrowed without allocating.
pub fn scrub_text(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_suspect) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut state = ScrubState::Text;

    for c in s.chars() {
        state = match state {
            ScrubState::Text => match c {
                '\u{1b}' => ScrubState::Esc,
                '\u{9b}' => ScrubState::Csi,
                '\u{9d}' => ScrubState::Osc,
                _ => {
                    push_clean(&mut out, c);
                    ScrubState::Text
                }
            },
            ScrubState::Esc => match c {
                '[' => ScrubState::Csi,
                ']' => ScrubState::Osc,
                // Bare ESC: drop it, process this char normally
                _ => {
                    push_clean(&mut out, c);
                    ScrubState::Text
                }
            },
            ScrubState::Csi => {
                // Parameter and intermediate bytes run until a final byte
                if ('\u{40}'..='\u{7e}').contains(&c) {
                    ScrubState::Text
                } else {
                    ScrubState::Csi
                }
            }
            ScrubState::Osc => match c {
                '\u{07}' => ScrubState::Text,
                '\u{1b}' => ScrubState::OscEsc,
                _ => ScrubState::Osc,
            },
            ScrubState::OscEsc => match c {
                '\\' => ScrubState::Text,
                _ => ScrubState::Osc,
            },
        };
    }

    Cow::Owned(out)
}

#[derive(Clone, Copy)]
enum ScrubState {
    Text,
    Esc,
    Csi,
    Osc,
    OscEsc,
}

fn is_suspect(c: char) -> bool {
    c.is_control() || ('\u{80}'..='\u{9f}').contains(&c)
}

fn push_clean(out: &mut String, c: char) {
    if matches!(c, '\t' | '\n' | '\r') {
        if !out.ends_with(' ') {
            out.push(' ');
        }
    } else if !is_suspect(c) {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_returns_borrowed_when_string_fits() {
        let result = fit_to_width("碟中谍", 10);
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "碟中谍");
    }

    #[test]
    fn fit_clips_ascii_with_ellipsis() {
        assert_eq!(fit_to_width("The Shawshank Redemption", 10), "The Shaws…");
    }

    #[test]
    fn fit_clips_cjk_on_column_boundary() {
        // Each CJK char is 2 columns; budget 5 leaves 4 for text + 1 ellipsis
        assert_eq!(fit_to_width("肖申克的救赎", 5), "肖申…");
        // Budget 6 leaves 5 columns of text, which only fits 2 CJK chars
        assert_eq!(fit_to_width("肖申克的救赎", 6), "肖申…");
    }

    #[test]
    fn fit_narrow_widths_drop_ellipsis() {
        assert_eq!(fit_to_width("Heat", 0), "");
        assert_eq!(fit_to_width("Heat", 1), "H");
        assert_eq!(fit_to_width("热带雨", 1), "");
    }

    #[test]
    fn fit_exact_width_untouched() {
        assert_eq!(fit_to_width("12345", 5), "12345");
    }

    #[test]
    fn scrub_clean_text_is_borrowed() {
        let result = scrub_text("肖申克的救赎 9.7");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn scrub_drops_c0_controls() {
        assert_eq!(scrub_text("a\u{0}b\u{8}c\u{1f}d"), "abcd");
        assert_eq!(scrub_text("del\u{7f}eted"), "deleted");
    }

    #[test]
    fn scrub_folds_line_breaks_to_space() {
        assert_eq!(scrub_text("第一季\n\t更新至8集"), "第一季 更新至8集");
    }

    #[test]
    fn scrub_removes_sgr_sequences() {
        assert_eq!(scrub_text("\u{1b}[31m红\u{1b}[0m"), "红");
    }

    #[test]
    fn scrub_removes_single_char_csi() {
        // U+009B is CSI in one character, no ESC needed
        assert_eq!(scrub_text("a\u{9b}31mb"), "ab");
    }

    #[test]
    fn scrub_removes_osc_title_set() {
        assert_eq!(scrub_text("\u{1b}]0;owned\u{7}safe"), "safe");
        assert_eq!(scrub_text("\u{1b}]0;owned\u{1b}\\safe"), "safe");
    }

    #[test]
    fn scrub_bare_esc_keeps_following_text() {
        assert_eq!(scrub_text("a\u{1b}b"), "ab");
    }

    #[test]
    fn scrub_empty_string() {
        let result = scrub_text("");
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(result, "");
    }
}
