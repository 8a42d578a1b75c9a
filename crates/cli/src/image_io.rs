//! PNG load/save for pixel buffers.
//!
//! PNG rows run top to bottom; the render target's rows run bottom to top.
//! Both directions flip rows so orientation passes act on the image as seen.

use std::path::Path;

use offscreen_render_core::PixelBuffer;

use crate::error::CliError;

/// Reads a PNG (any color type) as RGBA8 in render-target row order.
pub fn load_png(path: &Path) -> Result<PixelBuffer, CliError> {
    let img = image::open(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    let mut buffer = PixelBuffer::from_rgba(width, height, img.into_raw())?;
    buffer.flip_rows();
    Ok(buffer)
}

/// Writes a render-target-ordered buffer as a PNG.
pub fn save_png(buffer: &PixelBuffer, path: &Path) -> Result<(), CliError> {
    let mut rows = buffer.clone();
    rows.flip_rows();
    let (width, height) = rows.dimensions();
    let img = image::RgbaImage::from_raw(width, height, rows.into_bytes())
        .ok_or_else(|| CliError::Io("RGBA buffer size mismatch".into()))?;
    img.save(path)
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}
