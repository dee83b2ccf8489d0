//! Upload storage: validation and on-disk layout for photo files.
//!
//! Reference photos live under `persons/<person_id>/`, identification probes
//! under `probes/` until they are either deleted or promoted by
//! auto-training. All paths stored in the database are relative to the
//! uploads root.

use crate::util::hex_string;
use chrono::Utc;
use image::ImageFormat;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

const MIN_DIMENSION: u32 = 50;
const MAX_DIMENSION: u32 = 4000;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("file is empty")]
    Empty,
    #[error("file exceeds the maximum size of {0} bytes")]
    TooLarge(usize),
    #[error("unsupported file extension, allowed: {0}")]
    UnsupportedExtension(String),
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("image could not be decoded")]
    Undecodable,
    #[error("image is {0}x{1}, supported range is {MIN_DIMENSION}x{MIN_DIMENSION} to {MAX_DIMENSION}x{MAX_DIMENSION}")]
    BadDimensions(u32, u32),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A file written below the uploads root.
#[derive(Debug, Clone)]
pub struct SavedFile {
    pub filename: String,
    /// Path relative to the uploads root; this is what the database stores.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub sha256: String,
}

#[derive(Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl UploadStore {
    pub fn new(root: PathBuf, max_bytes: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            root,
            max_bytes,
            allowed_extensions,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_layout(&self) -> Result<(), UploadError> {
        for dir in [
            self.root.clone(),
            self.root.join("persons"),
            self.root.join("probes"),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    /// Size and extension checks; runs before any bytes touch the disk.
    pub fn validate(&self, filename: &str, size: usize) -> Result<(), UploadError> {
        if size == 0 {
            return Err(UploadError::Empty);
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge(self.max_bytes));
        }
        let ext = extension(filename);
        if !ext
            .as_deref()
            .is_some_and(|ext| self.allowed_extensions.iter().any(|a| a == ext))
        {
            return Err(UploadError::UnsupportedExtension(
                self.allowed_extensions.join(", "),
            ));
        }
        Ok(())
    }

    /// Content checks: the bytes must be a JPEG or PNG with sane dimensions.
    pub fn validate_image(bytes: &[u8]) -> Result<(), UploadError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|_| UploadError::Undecodable)?;

        let format = reader.format().ok_or(UploadError::UnsupportedFormat)?;
        if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            return Err(UploadError::UnsupportedFormat);
        }

        let (width, height) = reader
            .into_dimensions()
            .map_err(|_| UploadError::Undecodable)?;
        if width < MIN_DIMENSION
            || height < MIN_DIMENSION
            || width > MAX_DIMENSION
            || height > MAX_DIMENSION
        {
            return Err(UploadError::BadDimensions(width, height));
        }
        Ok(())
    }

    /// Store a reference photo under the person's directory.
    pub async fn save_reference(
        &self,
        person_id: i64,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<SavedFile, UploadError> {
        let filename = generate_filename(&format!("person_{person_id}"), original_filename);
        let relative = format!("persons/{person_id}/{filename}");
        self.write(&relative, &filename, bytes).await
    }

    /// Store an identification probe; deleted after the request unless
    /// auto-training promotes it.
    pub async fn save_probe(
        &self,
        original_filename: &str,
        bytes: &[u8],
    ) -> Result<SavedFile, UploadError> {
        let filename = generate_filename("probe", original_filename);
        let relative = format!("probes/{filename}");
        self.write(&relative, &filename, bytes).await
    }

    /// Move a probe into the matched person's reference directory.
    pub async fn promote_probe(
        &self,
        probe: &SavedFile,
        person_id: i64,
    ) -> Result<SavedFile, UploadError> {
        let filename = generate_filename(&format!("person_{person_id}"), &probe.filename);
        let relative = format!("persons/{person_id}/{filename}");
        let absolute = self.root.join(&relative);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&probe.absolute_path, &absolute).await?;
        Ok(SavedFile {
            filename,
            relative_path: relative,
            absolute_path: absolute,
            sha256: probe.sha256.clone(),
        })
    }

    /// Best-effort file removal; logs and swallows errors.
    pub async fn remove(&self, relative_path: &str) {
        let path = self.root.join(relative_path);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %err, "failed to remove upload");
            }
        }
    }

    /// Best-effort removal of a person's whole reference directory.
    pub async fn remove_person_dir(&self, person_id: i64) {
        let dir = self.root.join("persons").join(person_id.to_string());
        if let Err(err) = tokio::fs::remove_dir_all(&dir).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %dir.display(), error = %err, "failed to remove person directory");
            }
        }
    }

    async fn write(
        &self,
        relative: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<SavedFile, UploadError> {
        let absolute = self.root.join(relative);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&absolute, bytes).await?;

        Ok(SavedFile {
            filename: filename.to_string(),
            relative_path: relative.to_string(),
            absolute_path: absolute,
            sha256: hex_string(&Sha256::digest(bytes)),
        })
    }
}

/// `<prefix>_<timestamp>_<uuid8>.<ext>` — collision-safe and greppable by
/// person.
fn generate_filename(prefix: &str, original_filename: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    let ext = extension(original_filename).unwrap_or_else(|| "jpg".to_string());
    format!("{prefix}_{timestamp}_{}.{ext}", &unique[..8])
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn store(dir: &Path) -> UploadStore {
        UploadStore::new(
            dir.to_path_buf(),
            1024 * 1024,
            vec!["jpg".into(), "jpeg".into(), "png".into()],
        )
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn validate_checks_size_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        assert!(store.validate("face.jpg", 100).is_ok());
        assert!(store.validate("face.JPG", 100).is_ok());
        assert!(matches!(
            store.validate("face.jpg", 0),
            Err(UploadError::Empty)
        ));
        assert!(matches!(
            store.validate("face.jpg", 2 * 1024 * 1024),
            Err(UploadError::TooLarge(_))
        ));
        assert!(matches!(
            store.validate("face.gif", 100),
            Err(UploadError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            store.validate("noextension", 100),
            Err(UploadError::UnsupportedExtension(_))
        ));
    }

    #[test]
    fn validate_image_accepts_reasonable_png() {
        assert!(UploadStore::validate_image(&png_bytes(60, 60)).is_ok());
    }

    #[test]
    fn validate_image_rejects_small_and_garbage() {
        assert!(matches!(
            UploadStore::validate_image(&png_bytes(10, 10)),
            Err(UploadError::BadDimensions(10, 10))
        ));
        assert!(UploadStore::validate_image(b"not an image at all").is_err());
    }

    #[test]
    fn validate_image_rejects_non_photo_formats() {
        let img = RgbImage::new(60, 60);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Bmp).unwrap();
        assert!(matches!(
            UploadStore::validate_image(&out.into_inner()),
            Err(UploadError::UnsupportedFormat)
        ));
    }

    #[test]
    fn generated_filenames_are_unique_and_keep_extension() {
        let a = generate_filename("person_3", "me.PNG");
        let b = generate_filename("person_3", "me.PNG");
        assert!(a.starts_with("person_3_"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn save_and_remove_reference() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_layout().await.unwrap();

        let saved = store
            .save_reference(7, "face.png", &png_bytes(60, 60))
            .await
            .unwrap();
        assert!(saved.relative_path.starts_with("persons/7/"));
        assert!(saved.absolute_path.exists());
        assert_eq!(saved.sha256.len(), 64);

        store.remove(&saved.relative_path).await;
        assert!(!saved.absolute_path.exists());
    }

    #[tokio::test]
    async fn promote_probe_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store.ensure_layout().await.unwrap();

        let probe = store
            .save_probe("unknown.png", &png_bytes(60, 60))
            .await
            .unwrap();
        let promoted = store.promote_probe(&probe, 5).await.unwrap();

        assert!(!probe.absolute_path.exists());
        assert!(promoted.absolute_path.exists());
        assert!(promoted.relative_path.starts_with("persons/5/"));
        assert_eq!(promoted.sha256, probe.sha256);
    }
}
