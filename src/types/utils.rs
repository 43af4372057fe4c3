//! Shared helpers for page-key segments and titles.

/// Convert an arbitrary grouping name into a stable page-key segment.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; path separators and
/// namespace separators (`::`, `/`) become `.`; anything else becomes `-`.
pub fn key_segment(name: &str) -> String {
    let replaced = name.trim().replace("::", ".").replace('/', ".");
    let mut out = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches(|c| c == '-' || c == '.').to_string()
}

/// Human-readable title for a grouping name
pub fn humanize(name: &str) -> String {
    let last = name.rsplit("::").next().unwrap_or(name);
    let last = last.rsplit('.').next().unwrap_or(last);
    last.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalize the first character of a string.
#[inline]
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
    }
}
