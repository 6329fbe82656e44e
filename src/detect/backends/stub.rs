use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectorBackend, OutputLayout, RawOutputs};
use crate::frame::Frame;

/// Scripted backend for tests and the demo.
///
/// Replays a list of raw outputs, one entry per frame, wrapping around at the
/// end. With an empty script every frame yields no detections.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    script: Vec<RawOutputs>,
    cursor: usize,
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the same outputs for every frame.
    pub fn with_outputs(outputs: RawOutputs) -> Self {
        Self::scripted(vec![outputs])
    }

    /// Return `script[n % len]` for the n-th frame.
    pub fn scripted(script: Vec<RawOutputs>) -> Self {
        Self {
            script,
            cursor: 0,
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    /// Taken from the first scripted row; script rows use the plain layout.
    fn class_count(&self) -> Option<usize> {
        self.script
            .iter()
            .flatten()
            .flatten()
            .next()
            .and_then(|row| OutputLayout::Plain.class_count(row.len()))
    }

    fn forward(&mut self, frame: &Frame) -> Result<RawOutputs> {
        if frame.width == 0 || frame.height == 0 {
            return Err(anyhow!("stub backend received an empty frame"));
        }
        self.frames_seen += 1;
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let outputs = self.script[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.script.len();
        Ok(outputs)
    }
}
