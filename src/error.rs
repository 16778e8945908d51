use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors produced while loading, transforming or rendering one batch item.
#[derive(Debug, Error)]
pub enum GrayscaleError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),

    #[error("{0:?} is not an image")]
    NotAnImage(String),

    #[error("failed to download {url}: {message}")]
    Fetch { url: String, message: String },

    /// The pixel buffer is not `width * height * 4` bytes long.
    #[error("pixel buffer of {len} bytes does not match {width}x{height} RGBA")]
    BufferSize { len: usize, width: u32, height: u32 },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("worker panicked: {0}")]
    WorkerPanic(String),

    #[error("worker exited without replying")]
    WorkerLost,

    #[error("no reply within {0:?}")]
    TimedOut(Duration),
}

/// A batch item that was eligible but did not produce an image.
#[derive(Debug, Error)]
#[error("item {index}: {error}")]
pub struct ItemFailure {
    pub index: usize,
    #[source]
    pub error: GrayscaleError,
}

impl ItemFailure {
    pub fn new(index: usize, error: GrayscaleError) -> Self {
        Self { index, error }
    }
}

/// Best-effort message extraction from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_failure_display() {
        let failure = ItemFailure::new(
            3,
            GrayscaleError::BufferSize {
                len: 7,
                width: 1,
                height: 2,
            },
        );
        assert_eq!(
            failure.to_string(),
            "item 3: pixel buffer of 7 bytes does not match 1x2 RGBA"
        );
    }

    #[test]
    fn test_panic_message() {
        let caught = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "boom 1");

        let caught = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(caught.as_ref()), "static");
    }
}
