//! Shared key handling for storage backends.
//!
//! Object keys never start with `/`. Container URLs end in exactly one `/`.

/// Strip leading `/` from an object key.
pub fn normalize_key(key: &str) -> &str {
    key.trim_start_matches('/')
}

/// Destination key of a copy: the explicit name, else the source key.
/// Leading `/` is stripped in both cases.
pub fn destination_key(key: &str, new_key: Option<&str>) -> String {
    match new_key {
        Some(name) if !name.is_empty() => normalize_key(name).to_string(),
        _ => normalize_key(key).to_string(),
    }
}

pub fn ensure_trailing_slash(url: &str) -> String {
    format!("{}/", url.trim_end_matches('/'))
}

/// Keys must not contain `..` segments or empty segments once normalized.
pub fn is_safe_key(key: &str) -> bool {
    let key = normalize_key(key);
    !key.is_empty()
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}
