//! Batch inputs: anything that may or may not turn out to be an image.

pub mod fetch;

use crate::error::GrayscaleError;
use image::{ImageFormat, RgbaImage};
use parking_lot::RwLock;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// One element of a batch.
pub enum ImageSource {
    /// Pixels already in memory, handed over to the batch.
    Loaded(RgbaImage),
    /// Pixels the caller keeps a handle to. The batch works on a snapshot
    /// taken when the item is loaded; later writes through the handle do not
    /// reach the in-flight task.
    Shared(Arc<RwLock<RgbaImage>>),
    /// An image file on disk, decoded when the item is loaded.
    File(PathBuf),
    /// An http(s) URL, downloaded when the item is loaded.
    Url(String),
    /// Encoded image bytes (PNG, JPEG, ...), decoded when the item is loaded.
    Encoded(Vec<u8>),
    /// Something that is not an image. Always skipped.
    Other(String),
}

impl ImageSource {
    /// Eligibility check. Items that fail it are skipped by the dispatcher.
    pub fn is_image(&self) -> bool {
        match self {
            ImageSource::Loaded(_) | ImageSource::Shared(_) => true,
            ImageSource::File(path) => ImageFormat::from_path(path).is_ok(),
            ImageSource::Url(url) => fetch::is_remote_url(url),
            ImageSource::Encoded(bytes) => image::guess_format(bytes).is_ok(),
            ImageSource::Other(_) => false,
        }
    }

    /// Short human-readable label for logs.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Loaded(img) => format!("in-memory {}x{}", img.width(), img.height()),
            ImageSource::Shared(_) => "shared in-memory image".to_string(),
            ImageSource::File(path) => format!("{:?}", path),
            ImageSource::Url(url) => url.clone(),
            ImageSource::Encoded(bytes) => format!("{} encoded bytes", bytes.len()),
            ImageSource::Other(label) => format!("non-image {:?}", label),
        }
    }

    /// Produce the RGBA pixels for this item. May block on disk or network.
    pub fn load(self) -> Result<RgbaImage, GrayscaleError> {
        match self {
            ImageSource::Loaded(img) => Ok(img),
            ImageSource::Shared(handle) => Ok(handle.read().clone()),
            ImageSource::File(path) => {
                let bytes = std::fs::read(&path).map_err(|source| GrayscaleError::Io {
                    path: path.clone(),
                    source,
                })?;
                let format = ImageFormat::from_path(&path)?;
                Ok(image::load_from_memory_with_format(&bytes, format)?.to_rgba8())
            }
            ImageSource::Url(url) => fetch::download_image(&url),
            ImageSource::Encoded(bytes) => Ok(image::load_from_memory(&bytes)?.to_rgba8()),
            ImageSource::Other(label) => Err(GrayscaleError::NotAnImage(label)),
        }
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(img: RgbaImage) -> Self {
        ImageSource::Loaded(img)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::File(path)
    }
}

impl From<Arc<RwLock<RgbaImage>>> for ImageSource {
    fn from(handle: Arc<RwLock<RgbaImage>>) -> Self {
        ImageSource::Shared(handle)
    }
}

/// Classify a command-line style input: http(s) URLs are downloaded,
/// everything else is treated as a file path.
impl From<&str> for ImageSource {
    fn from(input: &str) -> Self {
        if fetch::is_remote_url(input) {
            ImageSource::Url(input.trim().to_string())
        } else {
            ImageSource::File(PathBuf::from(input))
        }
    }
}
