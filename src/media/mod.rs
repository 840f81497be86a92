//! Image upload pipeline
//!
//! Validates an uploaded image, resizes it to a fixed cover-fit box,
//! re-encodes it compactly, and stores it under the public images
//! directory. Raw uploads are never written to disk.

use crate::core::error::{ApiError, Result};
use image::imageops::FilterType;
use rand::Rng;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::task;

/// Accepted upload content types
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Maximum accepted upload size (12 MB)
pub const MAX_IMAGE_BYTES: usize = 12 * 1024 * 1024;

const TARGET_WIDTH: u32 = 450;
const TARGET_HEIGHT: u32 = 600;
const JPEG_QUALITY: u8 = 80;

/// Store for processed book cover images
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Create the store, ensuring the images directory exists
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(ApiError::Io)?;
        Ok(Self { dir })
    }

    /// Directory processed images are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate, resize, and store an uploaded image.
    ///
    /// Returns the generated filename. The image is cropped to fill a
    /// 450x600 box and re-encoded as JPEG at quality 80; the original
    /// bytes are discarded.
    pub async fn process_upload(&self, data: Vec<u8>, content_type: &str) -> Result<String> {
        if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
            return Err(ApiError::Validation("Invalid image format".to_string()));
        }

        if data.len() > MAX_IMAGE_BYTES {
            return Err(ApiError::Validation("Image exceeds 12 MB limit".to_string()));
        }

        let encoded = task::spawn_blocking(move || -> Result<Vec<u8>> {
            let img = image::load_from_memory(&data)
                .map_err(|e| ApiError::Internal(format!("Failed to decode image: {}", e)))?;

            let resized = img.resize_to_fill(TARGET_WIDTH, TARGET_HEIGHT, FilterType::Lanczos3);

            let mut out = Vec::new();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut out), JPEG_QUALITY);
            resized
                .write_with_encoder(encoder)
                .map_err(|e| ApiError::Internal(format!("Failed to encode image: {}", e)))?;

            Ok(out)
        })
        .await
        .map_err(|e| ApiError::Task(format!("Image task panicked: {}", e)))??;

        let filename = format!(
            "{}-{}.jpg",
            chrono::Utc::now().timestamp_millis(),
            rand::thread_rng().gen_range(0..1_000_000_000u32)
        );

        tokio::fs::write(self.dir.join(&filename), encoded)
            .await
            .map_err(ApiError::Io)?;

        tracing::debug!(filename = %filename, "Stored processed image");

        Ok(filename)
    }

    /// Best-effort removal of the file a stored image URL points at.
    ///
    /// Failures are logged and swallowed; cleanup never fails the parent
    /// operation.
    pub async fn delete_by_url(&self, image_url: &str) {
        let Some(filename) = filename_from_url(image_url) else {
            tracing::warn!(url = %image_url, "Image URL has no recognizable filename, skipping delete");
            return;
        };

        let path = self.dir.join(filename);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to delete image file");
        }
    }
}

/// Build the public URL for a stored image filename
pub fn public_url(base: &str, filename: &str) -> String {
    format!("{}/images/{}", base.trim_end_matches('/'), filename)
}

/// Extract the stored filename from an image URL, rejecting anything that
/// could escape the images directory
fn filename_from_url(image_url: &str) -> Option<&str> {
    let part = image_url.split("/images/").nth(1)?;
    if part.is_empty() || part.contains('/') || part.contains("..") {
        return None;
    }
    Some(part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 30, 200]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[tokio::test]
    async fn test_process_upload_produces_cover_fit_jpeg() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        let filename = store
            .process_upload(png_bytes(300, 300), "image/png")
            .await
            .unwrap();
        assert!(filename.ends_with(".jpg"));

        let stored = std::fs::read(dir.path().join(&filename)).unwrap();
        let img = image::load_from_memory(&stored).unwrap();
        assert_eq!(img.width(), 450);
        assert_eq!(img.height(), 600);
    }

    #[tokio::test]
    async fn test_rejects_unsupported_content_type() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        let err = store
            .process_upload(png_bytes(10, 10), "image/gif")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_rejects_oversized_upload() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        let err = store
            .process_upload(vec![0u8; MAX_IMAGE_BYTES + 1], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_internal_error() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        let err = store
            .process_upload(vec![1, 2, 3, 4], "image/png")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[tokio::test]
    async fn test_delete_by_url_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        let filename = store
            .process_upload(png_bytes(100, 100), "image/png")
            .await
            .unwrap();
        let path = dir.path().join(&filename);
        assert!(path.exists());

        let url = public_url("http://localhost:4000", &filename);
        store.delete_by_url(&url).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_delete_by_url_swallows_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();

        // Must not panic or error
        store
            .delete_by_url("http://localhost:4000/images/gone.jpg")
            .await;
    }

    #[test]
    fn test_filename_from_url_guards_traversal() {
        assert_eq!(
            filename_from_url("http://h/images/a.jpg"),
            Some("a.jpg")
        );
        assert_eq!(filename_from_url("http://h/images/../etc/passwd"), None);
        assert_eq!(filename_from_url("http://h/images/a/b.jpg"), None);
        assert_eq!(filename_from_url("http://h/covers/a.jpg"), None);
        assert_eq!(filename_from_url("http://h/images/"), None);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://localhost:4000", "a.jpg"),
            "http://localhost:4000/images/a.jpg"
        );
        assert_eq!(
            public_url("http://localhost:4000/", "a.jpg"),
            "http://localhost:4000/images/a.jpg"
        );
    }
}
