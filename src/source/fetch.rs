use crate::error::GrayscaleError;
use image::RgbaImage;

/// Returns true if `url` uses a scheme we know how to download.
pub fn is_remote_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

/// Download `url` and decode the body as an image.
///
/// Blocking; the dispatcher runs this on the blocking thread pool.
pub fn download_image(url: &str) -> Result<RgbaImage, GrayscaleError> {
    let fetch_err = |message: String| GrayscaleError::Fetch {
        url: url.to_string(),
        message,
    };

    log::info!("Downloading from URL: {}", url);

    let response = reqwest::blocking::get(url).map_err(|e| fetch_err(e.to_string()))?;
    if !response.status().is_success() {
        return Err(fetch_err(format!("HTTP error: {}", response.status())));
    }

    let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
    log::debug!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}
