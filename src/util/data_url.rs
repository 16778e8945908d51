use crate::error::GrayscaleError;
use base64::{engine::general_purpose, Engine};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, GrayscaleError> {
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, ImageFormat::Png)
        .map_err(GrayscaleError::Encode)?;
    Ok(png.into_inner())
}

/// Render an RGBA image as a `data:image/png;base64,...` URL.
pub fn png_data_url(image: &RgbaImage) -> Result<String, GrayscaleError> {
    let png = encode_png(image)?;
    let mut url = String::with_capacity(PNG_DATA_URL_PREFIX.len() + png.len() * 4 / 3 + 4);
    url.push_str(PNG_DATA_URL_PREFIX);
    general_purpose::STANDARD.encode_string(&png, &mut url);
    Ok(url)
}

/// Decode the payload of a PNG data URL back into its bytes.
///
/// Returns `None` if `url` is not a base64 PNG data URL.
pub fn decode_png_data_url(url: &str) -> Option<Vec<u8>> {
    let payload = url.strip_prefix(PNG_DATA_URL_PREFIX)?;
    general_purpose::STANDARD.decode(payload).ok()
}
