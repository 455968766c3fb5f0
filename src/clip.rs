//! Clip references and device-local blob storage
//!
//! A [`ClipBlob`] is the device-owned analog of a browser object URL: a
//! temp-file-backed playable resource that must be revoked (or dropped)
//! when no longer displayed. [`MediaClip`] is the opaque playable handle
//! the pipelines pass around, either a local blob or a remote reference.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use uuid::Uuid;

/// Clip reference errors
#[derive(Error, Debug)]
pub enum ClipError {
    #[error("clip blob was revoked")]
    Revoked,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A device-local playable blob
///
/// Backed by a temp file that is deleted on [`ClipBlob::revoke`] or on
/// drop. Holding blobs across repeated retakes without revoking them is
/// the leak the explicit lifecycle exists to prevent.
#[derive(Debug)]
pub struct ClipBlob {
    id: Uuid,
    file: Option<NamedTempFile>,
    len: u64,
}

impl ClipBlob {
    /// Create a blob from in-memory bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ClipError> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(Self {
            id: Uuid::new_v4(),
            file: Some(file),
            len: bytes.len() as u64,
        })
    }

    /// Create a blob by copying an existing file (e.g. an encoder output)
    pub fn from_file(path: &Path) -> Result<Self, ClipError> {
        let file = NamedTempFile::new()?;
        let len = std::fs::copy(path, file.path())?;
        Ok(Self {
            id: Uuid::new_v4(),
            file: Some(file),
            len,
        })
    }

    /// Stable identifier for this blob
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path to the playable file, if not yet revoked
    pub fn path(&self) -> Result<&Path, ClipError> {
        self.file
            .as_ref()
            .map(|f| f.path())
            .ok_or(ClipError::Revoked)
    }

    /// Size of the blob in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_revoked(&self) -> bool {
        self.file.is_none()
    }

    /// Release the backing file; idempotent
    pub fn revoke(&mut self) {
        if let Some(file) = self.file.take() {
            tracing::debug!("Revoking clip blob {} ({} bytes)", self.id, self.len);
            drop(file);
        }
    }
}

/// Where a clip's playable data lives
#[derive(Debug)]
pub enum ClipSource {
    /// Produced on this device; owned by the holder
    Local(ClipBlob),
    /// Fetched from storage; consumed read-only
    Remote(String),
}

/// An opaque, playable video+audio resource
#[derive(Debug)]
pub struct MediaClip {
    source: ClipSource,
    duration_hint: Option<f64>,
}

impl MediaClip {
    pub fn local(blob: ClipBlob) -> Self {
        Self {
            source: ClipSource::Local(blob),
            duration_hint: None,
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            source: ClipSource::Remote(url.into()),
            duration_hint: None,
        }
    }

    pub fn with_duration_hint(mut self, seconds: f64) -> Self {
        self.duration_hint = Some(seconds);
        self
    }

    /// Optional duration hint, in seconds
    pub fn duration_hint(&self) -> Option<f64> {
        self.duration_hint
    }

    /// Locator handed to decoders: a filesystem path or a URL
    pub fn playable_ref(&self) -> Result<String, ClipError> {
        match &self.source {
            ClipSource::Local(blob) => Ok(blob.path()?.to_string_lossy().into_owned()),
            ClipSource::Remote(url) => Ok(url.clone()),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, ClipSource::Local(_))
    }

    /// Revoke the underlying blob for local clips; no-op for remote ones
    pub fn revoke(&mut self) {
        if let ClipSource::Local(blob) = &mut self.source {
            blob.revoke();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_and_revoke() {
        let mut blob = ClipBlob::from_bytes(b"fragmentdata").unwrap();
        assert_eq!(blob.len(), 12);
        let path = blob.path().unwrap().to_path_buf();
        assert!(path.exists());

        blob.revoke();
        assert!(blob.is_revoked());
        assert!(!path.exists());
        assert!(matches!(blob.path(), Err(ClipError::Revoked)));

        // Second revoke is a no-op
        blob.revoke();
    }

    #[test]
    fn drop_releases_backing_file() {
        let path;
        {
            let blob = ClipBlob::from_bytes(b"x").unwrap();
            path = blob.path().unwrap().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn clip_playable_ref() {
        let clip = MediaClip::remote("https://example.com/a.mp4").with_duration_hint(10.0);
        assert_eq!(clip.playable_ref().unwrap(), "https://example.com/a.mp4");
        assert_eq!(clip.duration_hint(), Some(10.0));

        let blob = ClipBlob::from_bytes(b"data").unwrap();
        let mut local = MediaClip::local(blob);
        assert!(local.is_local());
        assert!(local.playable_ref().is_ok());
        local.revoke();
        assert!(local.playable_ref().is_err());
    }
}
