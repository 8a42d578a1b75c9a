//! Tightly packed RGBA8 images moved in and out of the render target.
//!
//! Rows are stored in the order the graphics API reads and writes them:
//! row 0 of the buffer is row 0 of the texture.

use crate::error::RenderError;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A `width x height` RGBA8 image in row-major layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

fn byte_len(width: u32, height: u32) -> Result<usize, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidDimensions { width, height });
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
        .ok_or(RenderError::InvalidDimensions { width, height })
}

impl PixelBuffer {
    /// Creates a zero-filled (transparent black) image.
    ///
    /// Returns `RenderError::InvalidDimensions` if either dimension is zero
    /// or the byte length overflows `usize`.
    pub fn zeroed(width: u32, height: u32) -> Result<Self, RenderError> {
        let len = byte_len(width, height)?;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    /// Wraps existing RGBA8 bytes, validating `data.len() == width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RenderError> {
        let expected = byte_len(width, height)?;
        if data.len() != expected {
            return Err(RenderError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// The pixel at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut px = [0; 4];
        px.copy_from_slice(&self.data[i..i + BYTES_PER_PIXEL]);
        Some(px)
    }

    /// Reverses the row order in place.
    pub fn flip_rows(&mut self) {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let rows = self.height as usize;
        for y in 0..rows / 2 {
            let (top, bottom) = self.data.split_at_mut((rows - 1 - y) * stride);
            top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }

    /// Reverses the pixel order within every row, in place.
    pub fn mirror_columns(&mut self) {
        let stride = self.width as usize * BYTES_PER_PIXEL;
        for row in self.data.chunks_exact_mut(stride) {
            let width = self.width as usize;
            for x in 0..width / 2 {
                let (a, b) = (x * BYTES_PER_PIXEL, (width - 1 - x) * BYTES_PER_PIXEL);
                for c in 0..BYTES_PER_PIXEL {
                    row.swap(a + c, b + c);
                }
            }
        }
    }
}
