//! Synthetic frame source (`stub://`).
//!
//! Produces a static gradient background with a bright square that drifts
//! across the frame, so that downstream stages see changing content without a
//! camera attached.

use anyhow::{anyhow, Result};

use super::{CameraConfig, FrameSource, SourceStats};
use crate::frame::Frame;

const SQUARE_SIZE: u32 = 16;

pub struct SyntheticSource {
    config: CameraConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
        }
    }

    fn background(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; width * height * 3];

        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = i % width;
            let y = i / width;
            px[0] = (x * 255 / width.max(1)) as u8;
            px[1] = (y * 255 / height.max(1)) as u8;
            px[2] = 64;
        }
        pixels
    }

    /// White square drifting right 4 px per frame, clipped at the edges.
    fn draw_square(&self, frame: &mut Frame) {
        let span = i64::from(self.config.width.saturating_sub(SQUARE_SIZE).max(1));
        let origin_x = (self.frame_count as i64 * 4) % span;
        let origin_y = i64::from(self.config.height.saturating_sub(SQUARE_SIZE) / 2);
        let size = i64::from(SQUARE_SIZE);
        for y in origin_y..origin_y + size {
            for x in origin_x..origin_x + size {
                frame.put_pixel(x, y, [255, 255, 255]);
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!(
                "synthetic source {} needs a non-zero frame size",
                self.config.device
            ));
        }
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.device,
            self.config.width,
            self.config.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("{} not connected", self.config.device));
        }
        self.frame_count += 1;
        let mut frame = Frame::new(
            self.background(),
            self.config.width,
            self.config.height,
            self.frame_count,
        )?;
        self.draw_square(&mut frame);
        Ok(frame)
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }

    fn release(&mut self) {
        if self.connected {
            log::info!("SyntheticSource: released {}", self.config.device);
        }
        self.connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn produces_sequenced_frames() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.connect()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_eq!((first.width, first.height), (64, 48));
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn content_changes_between_frames() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.connect()?;

        let first = source.next_frame()?;
        let second = source.next_frame()?;
        assert_ne!(first.pixels(), second.pixels());
        Ok(())
    }

    #[test]
    fn square_is_clipped_on_small_frames() -> Result<()> {
        let mut source = SyntheticSource::new(CameraConfig {
            width: 10,
            height: 6,
            ..stub_config()
        });
        source.connect()?;
        let frame = source.next_frame()?;
        // the 16 px square covers the whole 10x6 frame
        assert_eq!(frame.pixel(0, 0), Some([255, 255, 255]));
        assert_eq!(frame.pixel(9, 5), Some([255, 255, 255]));
        Ok(())
    }

    #[test]
    fn requires_connect_and_stops_after_release() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        assert!(source.next_frame().is_err());

        source.connect()?;
        assert!(source.is_healthy());
        source.release();
        assert!(!source.is_healthy());
        assert!(source.next_frame().is_err());
        Ok(())
    }
}
