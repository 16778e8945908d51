//! graybatch - grayscale a batch of images on a bounded pool of background workers
//!
//! ```no_run
//! use graybatch::{Dispatcher, DispatcherOptions, ImageSource, ItemResult};
//!
//! let dispatcher = Dispatcher::new(DispatcherOptions::from_env())?;
//! let batch = vec![ImageSource::from("cat.png"), ImageSource::from("https://example.com/dog.jpg")];
//!
//! dispatcher.process(
//!     batch,
//!     Some(Box::new(|result: ItemResult| match result {
//!         Ok(output) => println!("{}: {}x{}", output.index, output.width, output.height),
//!         Err(failure) => eprintln!("{}", failure),
//!     })),
//!     Some(Box::new(|total: usize| println!("done with {} item(s)", total))),
//! );
//! # Ok::<(), graybatch::GrayscaleError>(())
//! ```

pub mod error;
pub mod pipeline;
pub mod source;
pub mod util;

pub use error::{GrayscaleError, ItemFailure};
pub use pipeline::dispatcher::{Dispatcher, OnComplete, OnItem};
pub use pipeline::{BatchReport, DispatcherOptions, GrayscaleOutput, ItemResult, Task};
pub use source::ImageSource;
