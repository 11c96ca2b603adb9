//! Artifact references.
//!
//! An artifact is either a local file owned by the pipeline (ephemeral) or an
//! object persisted to external storage (durable). References are replaced,
//! never mutated in place.

use std::fmt;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Kind of media an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Video,
    Gif,
    Image,
    Audio,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video",
            ArtifactKind::Gif => "gif",
            ArtifactKind::Image => "image",
            ArtifactKind::Audio => "audio",
        }
    }

    /// File extension used for locally rendered artifacts of this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "mp4",
            ArtifactKind::Gif => "gif",
            ArtifactKind::Image => "jpg",
            ArtifactKind::Audio => "mp3",
        }
    }

    /// MIME type used when persisting an artifact of this kind.
    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::Gif => "image/gif",
            ArtifactKind::Image => "image/jpeg",
            ArtifactKind::Audio => "audio/mpeg",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an artifact lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Persisted to external object storage, addressed by a stable URI.
    Durable,
    /// Local file owned by the pipeline.
    Ephemeral,
}

/// Opaque artifact locator plus kind and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactRef {
    /// Local path (ephemeral) or URI (durable)
    pub locator: String,
    pub kind: ArtifactKind,
    pub provenance: Provenance,
}

impl ArtifactRef {
    /// Reference to a local, pipeline-owned file.
    pub fn ephemeral(path: impl AsRef<Path>, kind: ArtifactKind) -> Self {
        Self {
            locator: path.as_ref().to_string_lossy().into_owned(),
            kind,
            provenance: Provenance::Ephemeral,
        }
    }

    /// Reference to a persisted object.
    pub fn durable(uri: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            locator: uri.into(),
            kind,
            provenance: Provenance::Durable,
        }
    }

    /// Classify a caller-supplied source locator.
    ///
    /// Absolute URLs with a network scheme are durable; anything else is
    /// treated as a local path.
    pub fn source(locator: impl Into<String>) -> Self {
        let locator = locator.into();
        if is_remote_locator(&locator) {
            Self::durable(locator, ArtifactKind::Video)
        } else {
            Self {
                locator,
                kind: ArtifactKind::Video,
                provenance: Provenance::Ephemeral,
            }
        }
    }

    pub fn is_durable(&self) -> bool {
        self.provenance == Provenance::Durable
    }

    /// Local filesystem path, if this reference is ephemeral.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.provenance {
            Provenance::Ephemeral => Some(PathBuf::from(&self.locator)),
            Provenance::Durable => None,
        }
    }

    /// The durable counterpart of this artifact after it has been persisted.
    pub fn promote(&self, uri: impl Into<String>) -> Self {
        Self::durable(uri, self.kind)
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.locator)
    }
}

fn is_remote_locator(locator: &str) -> bool {
    match Url::parse(locator) {
        Ok(url) => matches!(url.scheme(), "http" | "https" | "s3" | "r2" | "gs"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_classification() {
        let remote = ArtifactRef::source("https://cdn.example.com/v1.mp4");
        assert!(remote.is_durable());
        assert!(remote.local_path().is_none());

        let local = ArtifactRef::source("/tmp/uploads/v1.mp4");
        assert!(!local.is_durable());
        assert_eq!(local.local_path(), Some(PathBuf::from("/tmp/uploads/v1.mp4")));
    }

    #[test]
    fn test_promote_keeps_kind() {
        let gif = ArtifactRef::ephemeral("/tmp/work/preview.gif", ArtifactKind::Gif);
        let durable = gif.promote("https://media.example.com/gifs/a.gif");
        assert_eq!(durable.kind, ArtifactKind::Gif);
        assert_eq!(durable.provenance, Provenance::Durable);
        // the original reference is untouched
        assert_eq!(gif.provenance, Provenance::Ephemeral);
    }
}
