use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::domain::DocError;

/// Decoded image reduced to a small RGB grid that fits a popup.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePreview {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub pixels: Vec<[u8; 3]>,
}

impl ImagePreview {
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.grid_width || y >= self.grid_height {
            return None;
        }
        self.pixels.get((y * self.grid_width + x) as usize).copied()
    }
}

fn strip_data_url(payload: &str) -> &str {
    // data:image/png;base64,....
    match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    }
}

/// Decode a base64 image payload and scale it into at most `max_w` x `max_h` pixels.
pub fn decode_preview(payload: &str, max_w: u32, max_h: u32) -> Result<ImagePreview, DocError> {
    let cleaned: String = strip_data_url(payload.trim())
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| DocError::ImageDecode(format!("invalid base64: {e}")))?;

    let format = image::guess_format(&bytes)
        .map_err(|e| DocError::ImageDecode(e.to_string()))?;
    let img = image::load_from_memory_with_format(&bytes, format).map_err(|e| {
        warn!("Failed to decode {} bytes as {format:?}: {e}", bytes.len());
        DocError::ImageDecode(e.to_string())
    })?;

    let (width, height) = (img.width(), img.height());
    let thumb = img
        .resize(max_w.max(1), max_h.max(1), FilterType::Triangle)
        .to_rgb8();
    debug!(
        "Decoded {format:?} image {width}x{height}, preview {}x{}",
        thumb.width(),
        thumb.height()
    );

    Ok(ImagePreview {
        format: format!("{format:?}").to_uppercase(),
        width,
        height,
        grid_width: thumb.width(),
        grid_height: thumb.height(),
        pixels: thumb.pixels().map(|p| p.0).collect(),
    })
}

#[cfg(test)]
pub(crate) fn png_base64(width: u32, height: u32) -> String {
    use std::io::Cursor;
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 40) as u8, (y * 40) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("encode png");
    STANDARD.encode(buf.into_inner())
}
