pub mod dispatcher;
pub mod pool;
pub mod worker;

use crate::error::{GrayscaleError, ItemFailure};
use image::RgbaImage;
use smallvec::SmallVec;
use std::time::Duration;

/// One image's pixel buffer, owned by whoever is currently working on it.
#[derive(Debug, Clone)]
pub struct Task {
    pub index: usize,
    pub pixels: Vec<u8>, // interleaved RGBA8
    pub width: u32,
    pub height: u32,
}

impl Task {
    /// Build a task, checking that `pixels` holds exactly `width * height` RGBA pixels.
    pub fn new(index: usize, pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, GrayscaleError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(GrayscaleError::BufferSize {
                len: pixels.len(),
                width,
                height,
            });
        }
        Ok(Self {
            index,
            pixels,
            width,
            height,
        })
    }

    /// Take ownership of an image's pixels.
    pub fn from_image(index: usize, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            index,
            pixels: image.into_raw(),
            width,
            height,
        }
    }
}

/// A processed image, ready for display.
#[derive(Clone)]
pub struct GrayscaleOutput {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// `data:image/png;base64,...`
    pub url: String,
    pub image: RgbaImage,
}

impl std::fmt::Debug for GrayscaleOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrayscaleOutput")
            .field("index", &self.index)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("url_len", &self.url.len())
            .finish()
    }
}

/// What the per-item callback receives: one per eligible batch item.
pub type ItemResult = Result<GrayscaleOutput, ItemFailure>;

/// Summary of one `process` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Length of the batch as supplied, skipped items included.
    pub total: usize,
    /// Items that passed the eligibility check.
    pub eligible: usize,
    /// Items delivered as processed images.
    pub delivered: usize,
    /// Indices of items that were not images.
    pub skipped: SmallVec<[usize; 8]>,
    /// Indices of eligible items that failed.
    pub failed: SmallVec<[usize; 8]>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

const WORKERS_ENV: &str = "GRAYBATCH_WORKERS";
const TIMEOUT_ENV: &str = "GRAYBATCH_TIMEOUT_MS";

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Number of pool threads running transforms. Always at least 1.
    pub workers: usize,
    /// Give up on outstanding items after this long. `None` waits forever.
    pub batch_timeout: Option<Duration>,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            batch_timeout: None,
        }
    }
}

impl DispatcherOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.batch_timeout = timeout;
        self
    }

    /// Defaults overridden by `GRAYBATCH_WORKERS` and `GRAYBATCH_TIMEOUT_MS`.
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(raw) = lookup(WORKERS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => options = options.with_workers(n),
                Err(e) => log::warn!("Ignoring {}={:?}: {}", WORKERS_ENV, raw, e),
            }
        }

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(0) => options.batch_timeout = None,
                Ok(ms) => options.batch_timeout = Some(Duration::from_millis(ms)),
                Err(e) => log::warn!("Ignoring {}={:?}: {}", TIMEOUT_ENV, raw, e),
            }
        }

        options
    }
}

/// Outstanding-task counter for one batch. Only the dispatcher touches it.
#[derive(Debug)]
pub(crate) struct Countdown {
    remaining: usize,
}

impl Countdown {
    pub(crate) fn new(remaining: usize) -> Self {
        Self { remaining }
    }

    /// Record one finished task. Returns true exactly once, on the tick that
    /// reaches zero; further ticks are ignored.
    pub(crate) fn tick(&mut self) -> bool {
        match self.remaining.checked_sub(1) {
            Some(rest) => {
                self.remaining = rest;
                rest == 0
            }
            None => false,
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    pub(crate) fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_task_rejects_malformed_buffer() {
        let err = Task::new(0, vec![0; 7], 1, 2).unwrap_err();
        assert!(matches!(
            err,
            GrayscaleError::BufferSize { len: 7, width: 1, height: 2 }
        ));
        assert!(Task::new(0, vec![0; 8], 1, 2).is_ok());
    }

    #[test]
    fn test_task_from_image() {
        let task = Task::from_image(5, RgbaImage::new(3, 2));
        assert_eq!(task.index, 5);
        assert_eq!((task.width, task.height), (3, 2));
        assert_eq!(task.pixels.len(), 3 * 2 * 4);
    }

    #[test]
    fn test_countdown_fires_once_and_never_underflows() {
        let mut countdown = Countdown::new(2);
        assert!(!countdown.tick());
        assert!(countdown.tick());
        assert!(countdown.is_done());
        assert!(!countdown.tick());
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn test_options_from_lookup() {
        let env: HashMap<&str, &str> = [(WORKERS_ENV, "3"), (TIMEOUT_ENV, "250")].into();
        let options = DispatcherOptions::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(options.workers, 3);
        assert_eq!(options.batch_timeout, Some(Duration::from_millis(250)));

        let env: HashMap<&str, &str> = [(WORKERS_ENV, "zero"), (TIMEOUT_ENV, "0")].into();
        let options = DispatcherOptions::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(options.workers, DispatcherOptions::default().workers);
        assert_eq!(options.batch_timeout, None);
    }

    #[test]
    fn test_with_workers_is_at_least_one() {
        assert_eq!(DispatcherOptions::default().with_workers(0).workers, 1);
    }
}
