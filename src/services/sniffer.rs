use std::collections::BTreeSet;

/// Number of leading bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 261;

/// MIME types accepted by default.
pub const DEFAULT_SUPPORTED_TYPES: &[&str] =
    &["image/gif", "video/mp4", "video/webm", "video/x-msvideo"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SniffResult {
    /// Detected MIME type, `None` when the prefix matches no known signature.
    pub mime: Option<&'static str>,
    /// Whether the detected type is on the allow-list.
    pub supported: bool,
}

/// Classifies byte prefixes against an immutable allow-list of MIME types.
#[derive(Debug, Clone)]
pub struct ContentSniffer {
    supported: BTreeSet<String>,
}

impl Default for ContentSniffer {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPORTED_TYPES.iter().copied())
    }
}

impl ContentSniffer {
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: supported
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    /// Classifies `prefix`. Only the first [`SNIFF_LEN`] bytes are looked at.
    pub fn classify(&self, prefix: &[u8]) -> SniffResult {
        let head = &prefix[..prefix.len().min(SNIFF_LEN)];
        let mime = infer::get(head).map(|kind| kind.mime_type());
        let supported = mime.is_some_and(|m| self.supported.contains(m));

        SniffResult { mime, supported }
    }
}
