//! Download surface
//!
//! Saves a finished blob to a user-visible destination with a sanitized
//! filename. No server round-trip: the blob already lives on the device.

use crate::clip::{ClipBlob, ClipError};
use crate::mux::EncodeTarget;
use std::path::{Path, PathBuf};

/// Build the keepsake filename for an event
///
/// Keeps alphanumerics, collapses everything else into single
/// underscores.
pub fn compilation_filename(event_name: &str, target: &EncodeTarget) -> String {
    let mut sanitized = String::with_capacity(event_name.len());
    let mut last_was_separator = true;
    for c in event_name.chars() {
        if c.is_ascii_alphanumeric() {
            sanitized.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            sanitized.push('_');
            last_was_separator = true;
        }
    }
    let trimmed = sanitized.trim_end_matches('_');
    let stem = if trimmed.is_empty() { "event" } else { trimmed };
    format!("{}_keepsake.{}", stem, target.container.extension())
}

/// Copy a blob into `dest_dir` under `file_name`
///
/// The browser-style "trigger save": the blob stays valid afterwards and
/// can be saved again.
pub fn trigger_save(
    blob: &ClipBlob,
    dest_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, ClipError> {
    std::fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(file_name);
    std::fs::copy(blob.path()?, &dest)?;
    tracing::info!("Saved {} bytes to {:?}", blob.len(), dest);
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn filenames_are_sanitized() {
        let target = EncodeTarget::default();
        assert_eq!(
            compilation_filename("Nana's 80th Birthday!", &target),
            "nana_s_80th_birthday_keepsake.mp4"
        );
        assert_eq!(compilation_filename("", &target), "event_keepsake.mp4");
        assert_eq!(
            compilation_filename("///", &target),
            "event_keepsake.mp4"
        );
    }

    #[test]
    fn extension_follows_container() {
        let target = EncodeTarget {
            container: crate::mux::TargetContainer::Webm,
            codec: crate::mux::TargetCodec::Vp9,
            ..EncodeTarget::default()
        };
        assert!(compilation_filename("party", &target).ends_with(".webm"));
    }

    #[test]
    fn save_copies_and_blob_survives() {
        let dir = tempdir().unwrap();
        let blob = ClipBlob::from_bytes(b"final keepsake").unwrap();

        let saved = trigger_save(&blob, dir.path(), "party_keepsake.mp4").unwrap();
        assert_eq!(std::fs::read(&saved).unwrap(), b"final keepsake");
        assert!(blob.path().is_ok());

        // Saving twice overwrites cleanly
        let again = trigger_save(&blob, dir.path(), "party_keepsake.mp4").unwrap();
        assert_eq!(saved, again);
    }

    #[test]
    fn revoked_blob_cannot_be_saved() {
        let dir = tempdir().unwrap();
        let mut blob = ClipBlob::from_bytes(b"x").unwrap();
        blob.revoke();
        assert!(trigger_save(&blob, dir.path(), "a.mp4").is_err());
    }
}
