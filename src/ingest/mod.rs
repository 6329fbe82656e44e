//! Frame ingestion sources.
//!
//! This module provides the sources the detection loop pulls frames from:
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//! - Still images decoded once and repeated, `image://<path>`
//! - Synthetic frames for tests and the demo, `stub://<name>`
//!
//! Every source yields RGB24 `Frame`s with monotonically increasing sequence
//! numbers. Sources are opened with `connect` and closed with `release`;
//! dropping a source also releases the device.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod still;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::frame::Frame;

pub use still::StillImageSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

pub const STUB_SCHEME: &str = "stub://";
pub const IMAGE_SCHEME: &str = "image://";

/// Camera selection and capture format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0"), `stub://name` or `image://path`.
    pub device: String,
    /// Target frame rate (frames per second).
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 10,
            width: 640,
            height: 480,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub device: String,
}

/// A camera-like producer of frames.
pub trait FrameSource {
    /// Open the device. Must be called before `next_frame`.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame, blocking until one is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool;

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;

    /// Stop capturing and close the device.
    fn release(&mut self) {}
}

/// Build the source named by `config.device`.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    if config.device.starts_with(STUB_SCHEME) {
        return Ok(Box::new(SyntheticSource::new(config.clone())));
    }
    if let Some(path) = config.device.strip_prefix(IMAGE_SCHEME) {
        return Ok(Box::new(StillImageSource::new(path)));
    }
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Source::new(config.clone())))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow::anyhow!(
            "camera {} requires the ingest-v4l2 feature",
            config.device
        ))
    }
}
