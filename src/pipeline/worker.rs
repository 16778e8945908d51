//! The transform run on pool threads: grayscale the pixels, then render the
//! result into a displayable image.

use super::{GrayscaleOutput, Task};
use crate::error::{panic_message, GrayscaleError};
use crate::util::data_url::png_data_url;
use crate::util::rgb_conversion::rgba8_to_gray_in_place;
use image::RgbaImage;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Signature of the per-task pixel transform.
pub type TransformFn = fn(Task) -> Task;

/// Replace each pixel's R, G and B with its luminance. Alpha is unchanged.
///
/// Pure: touches nothing but the task it owns.
pub fn grayscale(mut task: Task) -> Task {
    rgba8_to_gray_in_place(&mut task.pixels);
    task
}

/// Rebuild an image from a processed task and encode it as a PNG data URL.
pub fn render(task: Task) -> Result<GrayscaleOutput, GrayscaleError> {
    let Task {
        index,
        pixels,
        width,
        height,
    } = task;
    let len = pixels.len();

    let image = RgbaImage::from_raw(width, height, pixels)
        .ok_or(GrayscaleError::BufferSize { len, width, height })?;
    let url = png_data_url(&image)?;

    Ok(GrayscaleOutput {
        index,
        width,
        height,
        url,
        image,
    })
}

/// Full pool job: transform then render. A panic inside `transform` is
/// caught and reported as `WorkerPanic` instead of taking the item down silently.
pub fn run_task(task: Task, transform: TransformFn) -> Result<GrayscaleOutput, GrayscaleError> {
    let start = Instant::now();
    let index = task.index;

    let task = panic::catch_unwind(AssertUnwindSafe(move || transform(task)))
        .map_err(|payload| GrayscaleError::WorkerPanic(panic_message(payload.as_ref())))?;
    let transform_time = start.elapsed();

    let output = render(task)?;
    log::debug!(
        "Item {}: {}x{} transformed in {:?}, rendered in {:?}",
        index,
        output.width,
        output.height,
        transform_time,
        start.elapsed() - transform_time
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_grayscale_keeps_index_and_dimensions() {
        let task = Task::new(4, vec![255, 0, 0, 200], 1, 1).unwrap();
        let out = grayscale(task);
        assert_eq!(out.index, 4);
        assert_eq!((out.width, out.height), (1, 1));
        assert_eq!(out.pixels, vec![87, 87, 87, 200]);
    }

    #[test]
    fn test_run_task_renders_output() {
        let image = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let output = run_task(Task::from_image(1, image.clone()), grayscale).unwrap();

        assert_eq!(output.index, 1);
        assert_eq!((output.width, output.height), (2, 2));
        assert_eq!(output.image, image);
        assert!(output.url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_run_task_reports_panics() {
        fn exploding(_: Task) -> Task {
            panic!("transform exploded")
        }

        let err = run_task(Task::from_image(0, RgbaImage::new(1, 1)), exploding).unwrap_err();
        match err {
            GrayscaleError::WorkerPanic(msg) => assert_eq!(msg, "transform exploded"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
