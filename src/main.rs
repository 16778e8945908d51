//! graybatch CLI - grayscale a set of image files or URLs in one batch

use anyhow::{bail, Context, Result};
use graybatch::{Dispatcher, DispatcherOptions, ImageSource, ItemResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USAGE: &str = "usage: graybatch [--workers N] [--timeout-ms MS] [--out DIR] INPUT...";

struct Args {
    options: DispatcherOptions,
    out_dir: Option<PathBuf>,
    inputs: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut options = DispatcherOptions::from_env();
    let mut out_dir = None;
    let mut inputs = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--workers" => {
                let value = args.next().context("--workers needs a value")?;
                let workers: usize = value
                    .parse()
                    .with_context(|| format!("invalid --workers value {:?}", value))?;
                options = options.with_workers(workers);
            }
            "--timeout-ms" => {
                let value = args.next().context("--timeout-ms needs a value")?;
                let ms: u64 = value
                    .parse()
                    .with_context(|| format!("invalid --timeout-ms value {:?}", value))?;
                let timeout = (ms > 0).then(|| Duration::from_millis(ms));
                options = options.with_batch_timeout(timeout);
            }
            "--out" => {
                out_dir = Some(PathBuf::from(args.next().context("--out needs a directory")?));
            }
            "-h" | "--help" => bail!(USAGE),
            flag if flag.starts_with("--") => bail!("unknown flag {}\n{}", flag, USAGE),
            _ => inputs.push(arg),
        }
    }

    if inputs.is_empty() {
        bail!(USAGE);
    }

    Ok(Args {
        options,
        out_dir,
        inputs,
    })
}

/// `<out>/<stem>-gray.png`, falling back to the item index for URLs.
fn output_path(out_dir: &Path, input: &str, index: usize) -> PathBuf {
    let stem = input
        .rsplit('/')
        .next()
        .and_then(|name| Path::new(name).file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("image-{}", index));
    out_dir.join(format!("{}-gray.png", stem))
}

fn main() -> Result<()> {
    env_logger::init();

    let args = parse_args(std::env::args().skip(1))?;

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
    }

    let dispatcher = Dispatcher::new(args.options.clone())?;
    let batch: Vec<ImageSource> = args.inputs.iter().map(|s| ImageSource::from(s.as_str())).collect();

    let mut write_errors = Vec::new();
    let report = dispatcher.process(
        batch,
        Some(Box::new(|result: ItemResult| match result {
            Ok(output) => {
                let input = &args.inputs[output.index];
                match &args.out_dir {
                    Some(dir) => {
                        let path = output_path(dir, input, output.index);
                        match output.image.save(&path) {
                            Ok(()) => log::info!("{} -> {:?}", input, path),
                            Err(e) => write_errors.push(format!("{:?}: {}", path, e)),
                        }
                    }
                    None => log::info!(
                        "{}: {}x{}, {} byte data URL",
                        input,
                        output.width,
                        output.height,
                        output.url.len()
                    ),
                }
            }
            Err(failure) => log::error!("{}: {}", args.inputs[failure.index], failure.error),
        })),
        Some(Box::new(|total: usize| log::info!("Processed batch of {} input(s)", total))),
    );

    for err in &write_errors {
        log::error!("Failed to write {}", err);
    }

    if !report.skipped.is_empty() {
        log::warn!("Skipped {} input(s) that are not images", report.skipped.len());
    }
    if !report.is_success() || !write_errors.is_empty() {
        bail!(
            "{} of {} image(s) failed",
            report.failed.len() + write_errors.len(),
            report.eligible
        );
    }

    Ok(())
}
