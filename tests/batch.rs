use graybatch::util::data_url::decode_png_data_url;
use graybatch::{Dispatcher, DispatcherOptions, GrayscaleOutput, ImageSource, ItemResult};
use image::{Rgba, RgbaImage};
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 17 % 256) as u8, (y * 29 % 256) as u8, ((x + y) * 11 % 256) as u8, (x * y % 256) as u8])
    })
}

fn collect(dispatcher: &Dispatcher, batch: Vec<ImageSource>) -> (BTreeMap<usize, GrayscaleOutput>, Option<usize>) {
    let outputs = RefCell::new(BTreeMap::new());
    let completed = RefCell::new(None);
    dispatcher.process(
        batch,
        Some(Box::new(|result: ItemResult| {
            let output = result.expect("item should succeed");
            assert!(outputs.borrow_mut().insert(output.index, output).is_none());
        })),
        Some(Box::new(|total: usize| {
            assert!(completed.borrow_mut().replace(total).is_none());
        })),
    );
    (outputs.into_inner(), completed.into_inner())
}

#[test]
fn files_on_disk_are_grayscaled() {
    let dir = tempfile::tempdir().unwrap();
    let png_path = dir.path().join("gradient.png");
    let notes_path = dir.path().join("notes.txt");
    let source = gradient(16, 9);
    source.save(&png_path).unwrap();
    std::fs::write(&notes_path, "not an image").unwrap();

    let dispatcher = Dispatcher::new(DispatcherOptions::default().with_workers(2)).unwrap();
    let (outputs, completed) = collect(
        &dispatcher,
        vec![ImageSource::File(png_path), ImageSource::File(notes_path)],
    );

    assert_eq!(completed, Some(2));
    assert_eq!(outputs.len(), 1);

    let output = &outputs[&0];
    assert_eq!((output.width, output.height), (16, 9));
    for (before, after) in source.pixels().zip(output.image.pixels()) {
        let [r, g, b, a] = after.0;
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, before.0[3], "alpha must be preserved");
    }

    let png = decode_png_data_url(&output.url).unwrap();
    let from_url = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(&from_url, &output.image);
}

#[test]
fn shared_handle_mutation_after_dispatch_is_not_seen() {
    let handle = Arc::new(RwLock::new(RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))));
    let dispatcher = Dispatcher::new(DispatcherOptions::default().with_workers(1)).unwrap();

    let mutated = RefCell::new(false);
    let outputs = RefCell::new(Vec::new());
    let writer = Arc::clone(&handle);
    dispatcher.process(
        vec![ImageSource::Shared(Arc::clone(&handle))],
        Some(Box::new(|result: ItemResult| {
            // The result exists, so the snapshot was taken before this write.
            writer.write().put_pixel(0, 0, Rgba([0, 255, 0, 255]));
            *mutated.borrow_mut() = true;
            outputs.borrow_mut().push(result.unwrap());
        })),
        None,
    );

    assert!(mutated.into_inner());
    let outputs = outputs.into_inner();
    assert_eq!(outputs[0].image.get_pixel(0, 0), &Rgba([87, 87, 87, 255]));
    assert_eq!(handle.read().get_pixel(0, 0), &Rgba([0, 255, 0, 255]));
}

#[test]
fn grayscaling_output_again_changes_nothing() {
    let dispatcher = Dispatcher::new(DispatcherOptions::default().with_workers(3)).unwrap();
    let inputs: Vec<RgbaImage> = (1..=4).map(|n| gradient(n * 5, n * 3)).collect();

    let (first, _) = collect(&dispatcher, inputs.into_iter().map(ImageSource::Loaded).collect());
    let first_images: Vec<RgbaImage> = first.values().map(|o| o.image.clone()).collect();

    let (second, completed) = collect(
        &dispatcher,
        first_images.iter().cloned().map(ImageSource::Loaded).collect(),
    );

    assert_eq!(completed, Some(4));
    for (index, image) in first_images.iter().enumerate() {
        assert_eq!(&second[&index].image, image);
    }
}
