//! Cover image ingestion and storage
//!
//! Uploaded covers are validated against a MIME allowlist, resized to a
//! fixed canvas, and persisted under the public image directory. Removal
//! of stale files is always best-effort and never fails a request.

use crate::core::error::{GrimoireError, Result};
use bytes::Bytes;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};

/// Width of the stored cover canvas in pixels
pub const COVER_WIDTH: u32 = 500;
/// Height of the stored cover canvas in pixels
pub const COVER_HEIGHT: u32 = 800;

/// Accepted upload MIME types and their stored file extensions
const MIME_TYPES: &[(&str, &str)] = &[
    ("image/jpg", "jpg"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
];

/// A single uploaded image file, as read from a multipart field
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub original_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Stores uploaded cover images on the local filesystem
pub struct ImageStore {
    image_dir: PathBuf,
    temp_dir: PathBuf,
}

impl ImageStore {
    /// Create a new ImageStore rooted at the given directories
    pub fn new(image_dir: PathBuf, temp_dir: PathBuf) -> Self {
        Self { image_dir, temp_dir }
    }

    /// Validate, resize and persist an uploaded cover image.
    ///
    /// The raw upload is first written to the temp directory, then decoded
    /// and resized to the fixed canvas in a blocking task. The temp original
    /// is removed fire-and-forget once the resized file is stored. Returns
    /// the stored filename.
    pub async fn store(&self, upload: ImageUpload) -> Result<String> {
        let extension = extension_for(&upload.content_type).ok_or_else(|| {
            GrimoireError::Validation(format!(
                "Unsupported image type: {} (expected jpg, jpeg or png)",
                upload.content_type
            ))
        })?;

        let filename = derive_filename(
            &upload.original_name,
            extension,
            chrono::Utc::now().timestamp_millis(),
        );

        // Keep the raw upload on disk while processing
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let original_path = self.temp_dir.join(&filename);
        tokio::fs::write(&original_path, &upload.data).await?;

        tokio::fs::create_dir_all(&self.image_dir).await?;
        let target_path = self.image_dir.join(&filename);
        let data = upload.data.clone();

        // Decode and resize in a blocking task to avoid stalling the async runtime
        tokio::task::spawn_blocking(move || -> Result<()> {
            let img = image::load_from_memory(&data)
                .map_err(|e| GrimoireError::Image(format!("Failed to decode image: {}", e)))?;
            let resized = img.resize_exact(COVER_WIDTH, COVER_HEIGHT, FilterType::Lanczos3);
            resized
                .save(&target_path)
                .map_err(|e| GrimoireError::Image(format!("Failed to write image: {}", e)))?;
            Ok(())
        })
        .await
        .map_err(|e| GrimoireError::Internal(format!("Image task panicked: {}", e)))??;

        tracing::info!(filename = %filename, "Cover image stored");

        // The resized copy is the one that matters; the original can go
        remove_file_detached(original_path);

        Ok(filename)
    }

    /// Build the public URL for a stored filename
    pub fn public_url(base_url: &str, filename: &str) -> String {
        format!("{}/images/{}", base_url, filename)
    }

    /// Best-effort removal of a stored image given its public URL.
    ///
    /// Failures are logged, never propagated.
    pub fn delete_by_url(&self, image_url: &str) {
        match image_url.split("/images/").nth(1) {
            Some(filename) if !filename.is_empty() => {
                remove_file_detached(self.image_dir.join(filename));
            }
            _ => {
                tracing::warn!(url = %image_url, "Could not derive image filename from URL");
            }
        }
    }
}

/// Remove a file in a detached task; log on failure instead of surfacing it
fn remove_file_detached(path: PathBuf) {
    tokio::spawn(async move {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove image file");
        }
    });
}

/// Map an accepted MIME type to the stored file extension
fn extension_for(content_type: &str) -> Option<&'static str> {
    MIME_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

/// Derive a stored filename from the original upload name.
///
/// Whitespace is collapsed to underscores and a millisecond timestamp is
/// appended. Collisions within the same millisecond are a tolerated
/// limitation.
fn derive_filename(original: &str, extension: &str, millis: i64) -> String {
    let stem = Path::new(original)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("cover");

    let name = stem.split_whitespace().collect::<Vec<_>>().join("_");
    let name = if name.is_empty() { "cover" } else { name.as_str() };

    format!("{}{}.{}", name, millis, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;
    use tempfile::TempDir;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf.into()
    }

    fn test_store(tmp: &TempDir) -> ImageStore {
        ImageStore::new(tmp.path().join("images"), tmp.path().join("temp"))
    }

    #[test]
    fn test_extension_for_allowlist() {
        assert_eq!(extension_for("image/jpg"), Some("jpg"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/gif"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn test_derive_filename_normalizes_whitespace() {
        assert_eq!(
            derive_filename("Cover Art.png", "png", 1712345678901),
            "Cover_Art1712345678901.png"
        );
        assert_eq!(derive_filename("dune.jpeg", "jpg", 42), "dune42.jpg");
        // Degenerate names still produce something usable
        assert_eq!(derive_filename("   .png", "png", 7), "cover7.png");
    }

    #[tokio::test]
    async fn test_store_resizes_to_canvas() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);

        let filename = store
            .store(ImageUpload {
                original_name: "my cover.png".to_string(),
                content_type: "image/png".to_string(),
                data: png_bytes(10, 10),
            })
            .await
            .unwrap();

        assert!(filename.starts_with("my_cover"));
        assert!(filename.ends_with(".png"));

        let stored = image::open(tmp.path().join("images").join(&filename)).unwrap();
        assert_eq!(stored.width(), COVER_WIDTH);
        assert_eq!(stored.height(), COVER_HEIGHT);
    }

    #[tokio::test]
    async fn test_store_rejects_disallowed_mime() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);

        let result = store
            .store(ImageUpload {
                original_name: "anim.gif".to_string(),
                content_type: "image/gif".to_string(),
                data: png_bytes(4, 4),
            })
            .await;

        assert!(matches!(result, Err(GrimoireError::Validation(_))));
    }

    #[tokio::test]
    async fn test_store_rejects_undecodable_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);

        let result = store
            .store(ImageUpload {
                original_name: "broken.png".to_string(),
                content_type: "image/png".to_string(),
                data: Bytes::from_static(b"not an image"),
            })
            .await;

        assert!(matches!(result, Err(GrimoireError::Image(_))));
    }

    #[tokio::test]
    async fn test_delete_by_url_removes_stored_file() {
        let tmp = TempDir::new().unwrap();
        let store = test_store(&tmp);

        let filename = store
            .store(ImageUpload {
                original_name: "gone.png".to_string(),
                content_type: "image/png".to_string(),
                data: png_bytes(4, 4),
            })
            .await
            .unwrap();

        let path = tmp.path().join("images").join(&filename);
        assert!(path.exists());

        store.delete_by_url(&format!("http://localhost:4000/images/{}", filename));

        // Deletion is detached; give it a moment to land
        for _ in 0..50 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            ImageStore::public_url("http://localhost:4000", "dune42.jpg"),
            "http://localhost:4000/images/dune42.jpg"
        );
    }
}
