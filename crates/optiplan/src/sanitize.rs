//! Helpers for sanitizing data before it enters tracing span attributes
//! or file names.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Keeps the first four characters of a tracking token.
///
/// - `3f2a9c0d1e...` → `3f2a****`
/// - tokens of four characters or fewer are fully masked
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", prefix)
    }
}

/// Makes a free-text value safe as one file name component:
/// spaces become `_` and `/` becomes `-`.
pub fn filename_component(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            c => c,
        })
        .collect()
}
