use std::borrow::Cow;

fn is_stripped(c: char) -> bool {
    c.is_control() && !matches!(c, '\t' | '\n' | '\r')
}

/// Removes control characters from text pulled out of a page.
///
/// Preserves: tab, newline, carriage return. Everything else in the Unicode
/// `Cc` category (C0, DEL, C1) is dropped.
///
/// Returns `Cow::Borrowed` when the input has nothing to strip (common case).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|&c| !is_stripped(c)).collect())
}

/// Number of characters in `s` after trimming surrounding whitespace.
///
/// Thresholds on post text count characters, not bytes, so a short post in a
/// multi-byte script is not mistaken for a long one.
pub fn trimmed_char_count(s: &str) -> usize {
    s.trim().chars().count()
}
