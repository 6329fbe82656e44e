//! Captured frames.
//!
//! A `Frame` owns one RGB24 image (three bytes per pixel, row-major, no row
//! padding). Sources produce frames, backends read them, and the renderer
//! annotates them in place.

use anyhow::{anyhow, Result};
use image::RgbImage;

pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Sequence number assigned by the source, starting at 1.
    pub sequence: u64,
}

impl Frame {
    /// Wrap an RGB24 buffer. The length must be `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Uniformly colored frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self> {
        let len = rgb_len(width, height)?;
        let data = rgb.iter().copied().cycle().take(len).collect();
        Self::new(data, width, height, 0)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Lend the buffer to `f` as an `RgbImage` for the `imageproc` drawing
    /// routines. The buffer moves in and back out, nothing is copied.
    pub fn with_image<R>(&mut self, f: impl FnOnce(&mut RgbImage) -> R) -> Option<R> {
        let data = std::mem::take(&mut self.data);
        let mut image = RgbImage::from_raw(self.width, self.height, data)?;
        let out = f(&mut image);
        self.data = image.into_raw();
        Some(out)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        let idx = self.offset(x, y)?;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
    }

    /// Write one pixel; coordinates outside the frame are ignored.
    pub fn put_pixel(&mut self, x: i64, y: i64, rgb: [u8; 3]) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        if let Some(idx) = self.offset(x as u32, y as u32) {
            self.data[idx..idx + 3].copy_from_slice(&rgb);
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 3)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
