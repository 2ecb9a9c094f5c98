use std::borrow::Cow;

use unicode_width::UnicodeWidthStr;

/// Ellipsis appended when a word-truncated string was cut short.
pub const ELLIPSIS: &str = "...";

/// Calculates the display width of a string in columns.
///
/// Used as the "character length" when checking soft caps on SEO fields, so
/// that wide CJK text is not under-counted.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Collapses every run of whitespace (including newlines and tabs) into a
/// single space and trims both ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keeps leading words of `text` while the result (plus `suffix`) stays within
/// `soft_cap` columns.
///
/// At least one word is always kept, so a single very long word may exceed the
/// cap. Returns the kept words and whether anything was dropped.
pub fn take_words_within(text: &str, max_words: usize, soft_cap: usize, suffix: &str) -> (String, bool) {
    let words: Vec<&str> = text.split_whitespace().collect();
    let suffix_width = display_width(suffix);

    let mut kept = String::new();
    let mut count = 0;
    for word in words.iter().take(max_words) {
        let sep = usize::from(!kept.is_empty());
        let extra = sep + display_width(word);
        if count > 0 && display_width(&kept) + extra + suffix_width > soft_cap {
            break;
        }
        if !kept.is_empty() {
            kept.push(' ');
        }
        kept.push_str(word);
        count += 1;
    }

    (kept, count < words.len())
}

/// Word-boundary truncation that appends [`ELLIPSIS`] only when words are
/// dropped.
///
/// Text that already fits in `max_words` and `soft_cap` is returned as is;
/// the ellipsis width only counts against the cap once truncation is certain.
pub fn truncate_words(text: &str, max_words: usize, soft_cap: usize) -> String {
    let (whole, dropped) = take_words_within(text, max_words, usize::MAX, "");
    if !dropped && display_width(&whole) <= soft_cap {
        return whole;
    }

    let (mut kept, truncated) = take_words_within(text, max_words, soft_cap, ELLIPSIS);
    if truncated {
        kept.push_str(ELLIPSIS);
    }
    kept
}

/// Strip terminal control characters and ANSI escape sequences from text.
///
/// Feed titles end up in log lines and CLI status output, so anything that
/// could drive a terminal is removed.
///
/// Strips:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - ANSI CSI sequences: `\x1b[` ... (terminal byte 0x40-0x7E)
/// - ANSI OSC sequences: `\x1b]` ... (until BEL 0x07 or ST `\x1b\\`)
/// - Bare ESC (0x1b) not followed by `[` or `]`
///
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input contains no control characters (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    let len = bytes.len();

    let is_control = |b: u8| b == 0x7f || (b < 0x20 && b != 0x09 && b != 0x0a && b != 0x0d);

    if !bytes.iter().any(|&b| b == 0x1b || is_control(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        let b = bytes[i];

        if b == 0x1b {
            if i + 1 < len && bytes[i + 1] == b'[' {
                // CSI: skip parameter/intermediate bytes through the final byte
                i += 2;
                while i < len {
                    let c = bytes[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&c) {
                        break;
                    }
                }
            } else if i + 1 < len && bytes[i + 1] == b']' {
                // OSC: skip until BEL or ST
                i += 2;
                while i < len {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && i + 1 < len && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            } else {
                i += 1;
            }
        } else if is_control(b) {
            i += 1;
        } else {
            let start = i;
            i += 1;
            while i < len && bytes[i] != 0x1b && !is_control(bytes[i]) {
                i += 1;
            }
            // SAFETY: we only break on ASCII bytes, which cannot appear
            // mid-codepoint in valid UTF-8, so s[start..i] is valid UTF-8.
            out.push_str(&s[start..i]);
        }
    }

    Cow::Owned(out)
}
