//! Photo upload pipeline.
//!
//! A store form may carry one `photo` file. It is accepted only when its
//! declared content type is `image/*` and decodable, resized to
//! [`PhotoUploader::WIDTH`] pixels wide with the height scaled to keep the
//! aspect ratio, and written to the upload directory as
//! `{uuid}.{subtype}`. Only that filename is stored on the store.

use std::io;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while storing a photo.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The declared content type is not `image/*`.
    #[error("That filetype isn't allowed!")]
    NotAnImage(String),

    /// An image type the pipeline cannot decode or encode.
    #[error("unsupported image type: {0}")]
    Unsupported(String),

    /// The bytes did not decode as the declared format.
    #[error("could not read image: {0}")]
    Decode(#[from] image::ImageError),

    /// Writing the resized file failed.
    #[error("could not write photo: {0}")]
    Io(#[from] io::Error),

    /// The blocking resize task panicked or was cancelled.
    #[error("resize task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl UploadError {
    /// Errors caused by what the client sent rather than by the server.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::NotAnImage(_) | Self::Unsupported(_) | Self::Decode(_))
    }
}

/// A file part taken from a multipart form.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// Declared `Content-Type` of the part.
    pub content_type: Option<String>,
    /// Raw file contents.
    pub bytes: Bytes,
}

/// Resizes and writes store photos.
#[derive(Debug, Clone)]
pub struct PhotoUploader {
    dir: PathBuf,
}

impl PhotoUploader {
    /// Width every stored photo is resized to.
    pub const WIDTH: u32 = 800;

    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory photos are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check the declared content type and work out the image format and
    /// file extension.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::NotAnImage` unless the type starts with
    /// `image/`, and `UploadError::Unsupported` for image types the
    /// `image` crate does not handle.
    pub fn accept(content_type: Option<&str>) -> Result<(ImageFormat, String), UploadError> {
        let content_type = content_type.unwrap_or_default().trim().to_ascii_lowercase();
        let Some(subtype) = content_type.strip_prefix("image/") else {
            return Err(UploadError::NotAnImage(content_type));
        };

        let format = ImageFormat::from_mime_type(&content_type)
            .filter(|f| f.reading_enabled() && f.writing_enabled())
            .ok_or_else(|| UploadError::Unsupported(content_type.clone()))?;

        Ok((format, subtype.to_owned()))
    }

    /// Height that keeps the aspect ratio at [`Self::WIDTH`].
    #[must_use]
    pub fn scaled_height(width: u32, height: u32) -> u32 {
        if width == 0 {
            return 1;
        }
        let scaled = (u64::from(height) * u64::from(Self::WIDTH) + u64::from(width) / 2)
            / u64::from(width);
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    }

    /// Store `upload` if there is one.
    ///
    /// Returns the new filename, or `None` when no file (or an empty file
    /// part) was submitted.
    ///
    /// # Errors
    ///
    /// Returns an `UploadError` if the file is not an acceptable image or
    /// cannot be written.
    pub async fn save(&self, upload: Option<PhotoUpload>) -> Result<Option<String>, UploadError> {
        let Some(upload) = upload.filter(|u| !u.bytes.is_empty()) else {
            return Ok(None);
        };

        let (format, extension) = Self::accept(upload.content_type.as_deref())?;
        let filename = format!("{}.{extension}", Uuid::new_v4());
        let path = self.dir.join(&filename);

        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = upload.bytes;
        tokio::task::spawn_blocking(move || resize_and_write(&bytes, format, &path)).await??;

        tracing::info!(filename = %filename, "Photo stored");
        Ok(Some(filename))
    }

    /// Delete a stored photo whose store was never saved.
    pub async fn discard(&self, filename: &str) {
        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => tracing::info!(filename = %filename, "Photo discarded"),
            Err(e) => tracing::warn!(filename = %filename, error = %e, "Failed to discard photo"),
        }
    }
}

fn resize_and_write(bytes: &[u8], format: ImageFormat, path: &Path) -> Result<(), UploadError> {
    let image = image::load_from_memory_with_format(bytes, format)?;
    let height = PhotoUploader::scaled_height(image.width(), image.height());
    let resized = image.resize_exact(PhotoUploader::WIDTH, height, FilterType::Lanczos3);

    // JPEG has no alpha channel.
    let resized = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(resized.to_rgb8())
    } else {
        resized
    };

    resized.save_with_format(path, format)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_accept_checks_content_type() {
        let (format, ext) = PhotoUploader::accept(Some("image/png")).unwrap();
        assert_eq!(format, ImageFormat::Png);
        assert_eq!(ext, "png");

        let (format, ext) = PhotoUploader::accept(Some("image/jpeg")).unwrap();
        assert_eq!(format, ImageFormat::Jpeg);
        assert_eq!(ext, "jpeg");

        assert!(matches!(
            PhotoUploader::accept(Some("application/pdf")),
            Err(UploadError::NotAnImage(_))
        ));
        assert!(matches!(
            PhotoUploader::accept(None),
            Err(UploadError::NotAnImage(_))
        ));
    }

    #[test]
    fn test_scaled_height_keeps_aspect_ratio() {
        assert_eq!(PhotoUploader::scaled_height(1600, 1200), 600);
        assert_eq!(PhotoUploader::scaled_height(400, 100), 200);
        assert_eq!(PhotoUploader::scaled_height(10_000, 1), 1);
    }

    #[tokio::test]
    async fn test_save_without_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = PhotoUploader::new(dir.path().to_path_buf());

        assert!(uploader.save(None).await.unwrap().is_none());
        let empty = PhotoUpload {
            content_type: Some("application/octet-stream".to_owned()),
            bytes: Bytes::new(),
        };
        assert!(uploader.save(Some(empty)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_rejects_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = PhotoUploader::new(dir.path().to_path_buf());
        let upload = PhotoUpload {
            content_type: Some("text/plain".to_owned()),
            bytes: Bytes::from_static(b"hello"),
        };

        let err = uploader.save(Some(upload)).await.unwrap_err();
        assert!(matches!(err, UploadError::NotAnImage(_)));
        assert!(err.is_client_error());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_save_resizes_to_fixed_width() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = PhotoUploader::new(dir.path().to_path_buf());
        let upload = PhotoUpload {
            content_type: Some("image/png".to_owned()),
            bytes: png_bytes(1600, 1200),
        };

        let filename = uploader.save(Some(upload)).await.unwrap().unwrap();
        assert!(filename.ends_with(".png"));
        assert!(Uuid::parse_str(filename.trim_end_matches(".png")).is_ok());

        let stored = image::open(dir.path().join(&filename)).unwrap();
        assert_eq!(stored.width(), 800);
        assert_eq!(stored.height(), 600);
    }

    #[tokio::test]
    async fn test_discard_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let uploader = PhotoUploader::new(dir.path().to_path_buf());
        let upload = PhotoUpload {
            content_type: Some("image/png".to_owned()),
            bytes: png_bytes(100, 50),
        };

        let filename = uploader.save(Some(upload)).await.unwrap().unwrap();
        uploader.discard(&filename).await;
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        // Already gone: only logged.
        uploader.discard(&filename).await;
    }
}
