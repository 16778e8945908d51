/// Luminance weight of the red channel.
pub const RED_WEIGHT: f32 = 0.34;
/// Luminance weight of the green channel.
pub const GREEN_WEIGHT: f32 = 0.50;
/// Luminance weight of the blue channel.
pub const BLUE_WEIGHT: f32 = 0.16;

/// Convert an f32 channel value in [0, 255] to u8, rounding to nearest and
/// clamping anything out of range.
#[inline]
pub fn f32_to_u8(val: f32) -> u8 {
    val.round().clamp(0.0, 255.0) as u8
}

/// Weighted luminance of one RGB triple.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    f32_to_u8(RED_WEIGHT * r as f32 + GREEN_WEIGHT * g as f32 + BLUE_WEIGHT * b as f32)
}

/// Rewrite interleaved RGBA8 pixels in place so that R, G and B all carry the
/// pixel's luminance. Alpha is left untouched.
///
/// Trailing bytes that do not form a whole pixel are ignored; callers are
/// expected to pass `width * height * 4` bytes.
pub fn rgba8_to_gray_in_place(rgba: &mut [u8]) {
    for pixel in rgba.chunks_exact_mut(4) {
        let gray = luminance(pixel[0], pixel[1], pixel[2]);
        pixel[0] = gray; // R
        pixel[1] = gray; // G
        pixel[2] = gray; // B
    }
}
