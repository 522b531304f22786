use image::{DynamicImage, ImageReader};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::processing::ProcessingError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unsupported image type: {0}")]
    InvalidFormat(String),
    #[error("Invalid image name: {0}")]
    InvalidName(String),
    #[error("File too large")]
    FileTooLarge,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Flat directory of images addressed by file name.
#[derive(Clone, Debug)]
pub struct ImageStore {
    root: PathBuf,
    extension: String,
    max_size: usize,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>, max_size: usize) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            max_size,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(
            &config.image_folder,
            &config.accepted_extension,
            config.max_upload_bytes,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Largest accepted upload, in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Names of the accepted images, in the order the directory yields them.
    pub fn list_images(&self) -> Result<Vec<String>, StorageError> {
        let mut images = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if self.has_accepted_extension(name) {
                    images.push(name.to_string());
                }
            }
        }
        Ok(images)
    }

    pub fn resolve_path(&self, image_id: &str) -> PathBuf {
        self.root.join(image_id)
    }

    /// Writes `data` under `image_id`, replacing any existing file.
    pub fn save(&self, image_id: &str, data: &[u8]) -> Result<PathBuf, StorageError> {
        if !self.has_accepted_extension(image_id) {
            return Err(StorageError::InvalidFormat(image_id.to_string()));
        }
        if !is_bare_name(image_id) {
            return Err(StorageError::InvalidName(image_id.to_string()));
        }
        if data.len() > self.max_size {
            return Err(StorageError::FileTooLarge);
        }

        let path = self.resolve_path(image_id);
        fs::write(&path, data)?;
        log::info!("Stored {} ({} bytes)", path.display(), data.len());
        Ok(path)
    }

    pub fn load_image(&self, image_id: &str) -> Result<DynamicImage, ProcessingError> {
        if !is_bare_name(image_id) {
            return Err(ProcessingError::ImageNotFound(image_id.to_string()));
        }
        let path = self.resolve_path(image_id);
        let reader = ImageReader::open(&path)
            .map_err(|_| ProcessingError::ImageNotFound(image_id.to_string()))?
            .with_guessed_format()
            .map_err(|_| ProcessingError::ImageNotFound(image_id.to_string()))?;
        reader.decode().map_err(|source| ProcessingError::Decode {
            image_id: image_id.to_string(),
            source,
        })
    }

    // Listing and upload share this rule: the extension after the last dot,
    // compared without regard to case.
    fn has_accepted_extension(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

fn is_bare_name(image_id: &str) -> bool {
    !image_id.is_empty()
        && Path::new(image_id).file_name().and_then(|n| n.to_str()) == Some(image_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn store_in(dir: &Path) -> ImageStore {
        ImageStore::new(dir, "jpeg", 1024 * 1024)
    }

    #[test]
    fn lists_only_accepted_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.JPEG"), b"x").unwrap();
        fs::write(dir.path().join("b.jpeg"), b"x").unwrap();
        fs::write(dir.path().join("c.png"), b"x").unwrap();
        fs::write(dir.path().join("jpeg"), b"x").unwrap();
        fs::create_dir(dir.path().join("d.jpeg")).unwrap();

        let mut images = store_in(dir.path()).list_images().unwrap();
        images.sort();
        assert_eq!(images, ["a.JPEG", "b.jpeg"]);
    }

    #[test]
    fn listing_follows_directory_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["x.JPEG", "y.JPEG", "z.JPEG"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        let expected: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();

        assert_eq!(store_in(dir.path()).list_images().unwrap(), expected);
    }

    #[test]
    fn save_rejects_other_extensions_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        for name in ["cat.png", "cat.jpg", "cat", "cat.jpeg.txt"] {
            assert!(matches!(
                store.save(name, b"data"),
                Err(StorageError::InvalidFormat(_))
            ));
            assert!(!store.resolve_path(name).exists());
        }
    }

    #[test]
    fn save_rejects_path_components() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir.path().join("inner"));
        fs::create_dir(store.root()).unwrap();

        assert!(matches!(
            store.save("../escape.jpeg", b"data"),
            Err(StorageError::InvalidName(_))
        ));
        assert!(!dir.path().join("escape.jpeg").exists());
    }

    #[test]
    fn save_rejects_oversized_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path(), "jpeg", 4);
        assert!(matches!(
            store.save("big.jpeg", b"12345"),
            Err(StorageError::FileTooLarge)
        ));
    }

    #[test]
    fn uploaded_image_lists_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let payload = b"not really a jpeg".to_vec();

        store.save("cat.jpeg", &payload).unwrap();
        store.save("dog.JPEG", b"woof").unwrap();

        let images = store.list_images().unwrap();
        assert!(images.contains(&"cat.jpeg".to_string()));
        assert!(images.contains(&"dog.JPEG".to_string()));
        assert_eq!(fs::read(store.resolve_path("cat.jpeg")).unwrap(), payload);
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save("cat.jpeg", b"first").unwrap();
        store.save("cat.jpeg", b"second").unwrap();
        assert_eq!(fs::read(store.resolve_path("cat.jpeg")).unwrap(), b"second");
    }

    #[test]
    fn resolve_path_does_not_check_existence() {
        let store = ImageStore::new("/srv/images", "jpeg", 10);
        assert_eq!(
            store.resolve_path("missing.JPEG"),
            PathBuf::from("/srv/images/missing.JPEG")
        );
    }

    #[test]
    fn load_image_decodes_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        RgbImage::from_pixel(3, 2, Rgb([10, 200, 30]))
            .save_with_format(store.resolve_path("green.JPEG"), ImageFormat::Jpeg)
            .unwrap();

        let image = store.load_image("green.JPEG").unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[test]
    fn load_image_reports_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.resolve_path("junk.jpeg"), b"garbage").unwrap();

        assert!(matches!(
            store.load_image("nope.jpeg"),
            Err(ProcessingError::ImageNotFound(_))
        ));
        assert!(store.load_image("junk.jpeg").is_err());
        assert!(matches!(
            store.load_image("../junk.jpeg"),
            Err(ProcessingError::ImageNotFound(_))
        ));
    }
}
