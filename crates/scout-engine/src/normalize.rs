//! RX text normalization
//!
//! Serial consoles interleave ANSI escape sequences, mixed line endings
//! and stray control bytes with the text the classifier actually cares
//! about. [`normalize`] produces the canonical form every other engine
//! stage consumes; [`clean_for_evidence`] is the stricter variant
//! applied to raw probe bytes before they are shown or logged.

use std::sync::LazyLock;

use regex::Regex;

static ANSI_CSI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").unwrap_or_else(|err| panic!("ANSI pattern: {err}"))
});

/// Strip ANSI CSI sequences, unify line endings and drop NULs.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let cleaned = ANSI_CSI.replace_all(input, "");
    cleaned
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "")
}

/// Normalize raw bytes, repairing invalid UTF-8 with the replacement
/// character first.
pub fn normalize_bytes(input: &[u8]) -> String {
    normalize(&String::from_utf8_lossy(input))
}

/// The last non-empty whitespace-trimmed line of the buffer, or "".
pub fn extract_last_prompt_line(rx: &str) -> String {
    rx.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Convert raw probe bytes to display-safe text.
///
/// Keeps printable ASCII, `\r` `\n` `\t`, ESC (so ANSI sequences survive
/// for later stripping) and U+0080..U+FFFC; every other control byte
/// becomes a space. Invalid UTF-8 decodes to the replacement character,
/// which falls outside the kept range and also becomes a space.
pub fn clean_for_evidence(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .chars()
        .map(|c| match c {
            '\r' | '\n' | '\t' | '\x1b' => c,
            ' '..='~' => c,
            c if ('\u{80}'..'\u{FFFD}').contains(&c) => c,
            _ => ' ',
        })
        .collect()
}
