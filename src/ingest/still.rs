//! Still image source (`image://<path>`).
//!
//! Decodes a single JPEG/PNG on connect and hands out a fresh copy of it for
//! every frame. Useful for running a real model against a known picture
//! without a camera.

use anyhow::{anyhow, Context, Result};
use image::GenericImageView;
use std::path::PathBuf;

use super::{FrameSource, SourceStats, IMAGE_SCHEME};
use crate::frame::Frame;

pub struct StillImageSource {
    path: PathBuf,
    image: Option<(Vec<u8>, u32, u32)>,
    frame_count: u64,
}

impl StillImageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: None,
            frame_count: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn connect(&mut self) -> Result<()> {
        let image = image::open(&self.path)
            .with_context(|| format!("decode image {}", self.path.display()))?;
        let (width, height) = image.dimensions();
        self.image = Some((image.into_rgb8().into_raw(), width, height));
        log::info!(
            "StillImageSource: loaded {} ({}x{})",
            self.path.display(),
            width,
            height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let (pixels, width, height) = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("{} not loaded", self.path.display()))?;
        self.frame_count += 1;
        Frame::new(pixels.clone(), *width, *height, self.frame_count)
    }

    fn is_healthy(&self) -> bool {
        self.image.is_some()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: format!("{}{}", IMAGE_SCHEME, self.path.display()),
        }
    }

    fn release(&mut self) {
        self.image = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_decoded_image() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("still.png");
        image::RgbImage::from_pixel(6, 4, image::Rgb([10, 20, 30])).save(&path)?;

        let mut source = StillImageSource::new(&path);
        source.connect()?;
        let first = source.next_frame()?;
        let second = source.next_frame()?;

        assert_eq!((first.width, first.height), (6, 4));
        assert_eq!(first.pixel(5, 3), Some([10, 20, 30]));
        assert_eq!(first.pixels(), second.pixels());
        assert_eq!(second.sequence, 2);
        Ok(())
    }

    #[test]
    fn missing_file_fails_on_connect() {
        let mut source = StillImageSource::new("/nonexistent/still.jpg");
        assert!(source.connect().is_err());
        assert!(source.next_frame().is_err());
    }
}
