// Uploaded-image storage.
//
// Files live under `<root>/recipes/<uuid>.<ext>` and are served back at
// `/media/...`. Acceptance is by content sniffing, never by the client's
// filename or declared content type.
use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// The upload was not an acceptable image; message is client-facing.
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Identifies the image format from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }
}

pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("recipes"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates and writes an upload; returns the stored path relative to
    /// the media root. Nothing is written when validation fails.
    pub async fn save_recipe_image(&self, bytes: &[u8]) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Rejected(
                "The submitted file is empty.".to_string(),
            ));
        }
        let format = ImageFormat::sniff(bytes).ok_or_else(|| {
            MediaError::Rejected(
                "Upload a valid image. The file you uploaded was either not an image or a \
                 corrupted image."
                    .to_string(),
            )
        })?;

        let relative = format!("recipes/{}.{}", Uuid::new_v4(), format.extension());
        tokio::fs::write(self.root.join(&relative), bytes).await?;
        Ok(relative)
    }

    /// Best-effort removal of a previously stored file. Paths outside the
    /// media root are refused.
    pub async fn remove(&self, relative: &str) {
        let candidate = Path::new(relative);
        if candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            tracing::warn!(path = relative, "refusing to remove path outside media root");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(candidate)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = relative, error = %e, "failed to remove media file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_BYTES: &[u8] = &[
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
    ];

    #[test]
    fn test_sniff_recognizes_common_formats() {
        assert_eq!(ImageFormat::sniff(PNG_BYTES), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a-rest"), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
    }

    #[test]
    fn test_sniff_rejects_non_images() {
        assert_eq!(ImageFormat::sniff(b"not an image"), None);
        assert_eq!(ImageFormat::sniff(b""), None);
        // RIFF container that is not WebP (e.g. WAV)
        assert_eq!(ImageFormat::sniff(b"RIFF\x00\x00\x00\x00WAVEfmt "), None);
    }

    #[tokio::test]
    async fn test_save_writes_file_and_returns_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path()).unwrap();

        let relative = media.save_recipe_image(PNG_BYTES).await.unwrap();
        assert!(relative.starts_with("recipes/"));
        assert!(relative.ends_with(".png"));
        assert!(dir.path().join(&relative).exists());
    }

    #[tokio::test]
    async fn test_save_rejects_empty_and_garbage_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path()).unwrap();

        let err = media.save_recipe_image(b"").await.unwrap_err();
        assert!(matches!(err, MediaError::Rejected(_)));

        let err = media.save_recipe_image(b"plain text").await.unwrap_err();
        assert!(matches!(err, MediaError::Rejected(_)));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("recipes"))
            .unwrap()
            .collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_remove_refuses_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let media = MediaStore::new(dir.path().join("root")).unwrap();

        let outside = dir.path().join("secret.txt");
        std::fs::write(&outside, b"keep me").unwrap();

        media.remove("../secret.txt").await;
        assert!(outside.exists());
    }
}
