use image::DynamicImage;
use std::path::{Path, PathBuf};

/// Resolves image identifiers against the fixed, read-mostly image
/// directory shipped with the service.
#[derive(Clone)]
pub struct ImageStore {
    image_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode image {0}: {1}")]
    Decode(String, image::ImageError),
    #[error("failed to list image directory: {0}")]
    List(std::io::Error),
}

impl ImageStore {
    pub fn new(image_dir: PathBuf) -> Self {
        Self { image_dir }
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn path_of(&self, image_id: &str) -> PathBuf {
        self.image_dir.join(image_id)
    }

    pub fn resolve(&self, image_id: &str) -> Result<DynamicImage, StoreError> {
        let path = self.path_of(image_id);
        if !path.exists() {
            return Err(StoreError::NotFound(image_id.to_string()));
        }
        image::open(&path).map_err(|e| StoreError::Decode(image_id.to_string(), e))
    }

    /// Every directory entry is assumed to be a displayable image; the
    /// listing is sorted so /info and the select pages stay stable.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = std::fs::read_dir(&self.image_dir).map_err(StoreError::List)?;
        let mut images = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::List)?;
            if let Some(name) = entry.file_name().to_str() {
                images.push(name.to_string());
            }
        }
        images.sort();
        Ok(images)
    }
}
