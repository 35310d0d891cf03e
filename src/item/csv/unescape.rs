use memchr::memchr;

/// Escape character recognised inside quoted fields.
pub const ESCAPE: char = '\\';

/// Decodes backslash escapes in the raw content of a quoted field.
///
/// `\\`, `\t`, `\n`, `\r` and a backslash followed by `quote` are decoded in a
/// single left-to-right pass. Any other backslash is kept as is.
///
/// # Examples
///
/// ```
/// use lazy_csv::item::csv::unescape::unescape;
///
/// assert_eq!(unescape(r#"Test2 \"Wee\""#, "\""), "Test2 \"Wee\"");
/// assert_eq!(unescape(r"C:\\temp\x", "\""), r"C:\temp\x");
/// ```
pub fn unescape(raw: &str, quote: &str) -> String {
    if memchr(ESCAPE as u8, raw.as_bytes()).is_none() {
        return raw.to_string();
    }

    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(idx) = memchr(ESCAPE as u8, rest.as_bytes()) {
        decoded.push_str(&rest[..idx]);
        let after = &rest[idx + 1..];

        rest = if let Some(tail) = after.strip_prefix(ESCAPE) {
            decoded.push(ESCAPE);
            tail
        } else if let Some(tail) = after.strip_prefix('t') {
            decoded.push('\t');
            tail
        } else if let Some(tail) = after.strip_prefix('n') {
            decoded.push('\n');
            tail
        } else if let Some(tail) = after.strip_prefix('r') {
            decoded.push('\r');
            tail
        } else if let Some(tail) = after.strip_prefix(quote) {
            decoded.push_str(quote);
            tail
        } else {
            decoded.push(ESCAPE);
            after
        };
    }

    decoded.push_str(rest);
    decoded
}
