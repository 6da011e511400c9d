//! Source Fetch Abstraction
//!
//! Turns a source identifier into the encoded bytes of an audio file. This is
//! the only network surface the engine has.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Where a source identifier points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `http://` or `https://` URL.
    Remote,
    /// `file://` URL or a plain filesystem path.
    LocalFile,
}

impl SourceKind {
    /// Classify a source identifier by its scheme.
    pub fn classify(uri: &str) -> Self {
        let lower = uri.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::Remote
        } else {
            Self::LocalFile
        }
    }
}

/// Extract a lowercase file extension from a source identifier, ignoring any
/// query string or fragment. Decoders use it as a format hint.
pub fn extension_hint(uri: &str) -> Option<String> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let name = path.rsplit(['/', '\\']).next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Byte fetch capability.
///
/// Implementations must fail (never return an empty body) when the source is
/// unreachable, so the engine can surface a load failure.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Fetch the full encoded contents of `uri`.
    async fn fetch(&self, uri: String) -> Result<Bytes>;
}
