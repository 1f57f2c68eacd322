use std::path::Path;

/// Longest extension carried over from the client's filename into a key.
const MAX_EXTENSION_LEN: usize = 16;

/// Reduces a client-supplied filename to its last path component with
/// control characters and path separators replaced.
///
/// The result is only used in log lines and error messages; nothing on disk
/// or in the store is named after it.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if filename.contains("..") {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| if c.is_control() || c == ':' { '_' } else { c })
        .collect();

    if sanitized.is_empty() {
        "unnamed".to_string()
    } else {
        sanitized
    }
}

/// Returns the extension of `filename` including the leading dot, or an
/// empty string when there is none.
///
/// Extensions that are not plain ASCII alphanumerics (or unreasonably long)
/// are dropped rather than copied into an object key.
pub fn file_extension(filename: &str) -> String {
    let name = sanitize_filename(filename);
    let Some(ext) = Path::new(&name).extension().and_then(|e| e.to_str()) else {
        return String::new();
    };

    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        tracing::debug!("Dropping unusable extension of {}", name);
        return String::new();
    }

    format!(".{}", ext)
}
