//! Per-frame detection flow: forward, decode, suppress, render, announce.

use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use crate::decode::DetectionDecoder;
use crate::detect::{DetectorBackend, Detection};
use crate::frame::Frame;
use crate::labels::ClassLabels;
use crate::nms::{self, NmsParams};
use crate::render::Renderer;
use crate::speech::{AnnouncerStats, Announcer};

/// What one frame produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Candidates above the confidence threshold, before suppression.
    pub candidates: usize,
    /// Survivors of suppression, highest score first.
    pub detections: Vec<Detection>,
}

pub struct Pipeline {
    backend: Box<dyn DetectorBackend>,
    decoder: DetectionDecoder,
    labels: ClassLabels,
    nms: NmsParams,
    renderer: Renderer,
    announcer: Option<Announcer>,
    frames_processed: u64,
}

impl Pipeline {
    /// The decoder is bound to the label table, so every class id it emits has
    /// a name.
    pub fn new(
        backend: Box<dyn DetectorBackend>,
        labels: ClassLabels,
        confidence_threshold: f32,
        nms: NmsParams,
    ) -> Self {
        let decoder = DetectionDecoder::new(confidence_threshold).with_num_classes(labels.len());
        Self {
            backend,
            decoder,
            labels,
            nms,
            renderer: Renderer::new(),
            announcer: None,
            frames_processed: 0,
        }
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_announcer(mut self, announcer: Option<Announcer>) -> Self {
        self.announcer = announcer;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn announcer_stats(&self) -> Option<AnnouncerStats> {
        self.announcer.as_ref().map(Announcer::stats)
    }

    /// Warm the backend up and check its class count against the label table,
    /// so a mismatch fails once at startup instead of on every frame.
    pub fn warm_up(&mut self) -> Result<()> {
        self.backend
            .warm_up()
            .with_context(|| format!("{} backend warm-up failed", self.backend.name()))?;
        if let Some(classes) = self.backend.class_count() {
            if classes != self.labels.len() {
                return Err(anyhow!(
                    "model predicts {} classes but the label table has {}",
                    classes,
                    self.labels.len()
                ));
            }
        }
        Ok(())
    }

    /// Run one frame through the detector and annotate it in place.
    pub fn process(&mut self, frame: &mut Frame) -> Result<FrameReport> {
        let started = Instant::now();
        let raw = self
            .backend
            .forward(frame)
            .with_context(|| format!("inference failed on frame {}", frame.sequence))?;
        let candidates = self
            .decoder
            .decode(&raw, frame.width, frame.height)
            .with_context(|| format!("decode failed on frame {}", frame.sequence))?;
        let kept = nms::suppress_candidates(&candidates, self.nms)?;

        let mut detections = Vec::with_capacity(kept.len());
        for candidate in &kept {
            let label = self
                .labels
                .get(candidate.class_id)
                .ok_or_else(|| anyhow!("no label for class {}", candidate.class_id))?;
            detections.push(Detection::from_candidate(candidate, label));
        }

        for detection in &detections {
            self.renderer.draw(frame, detection);
            log::info!(
                "frame {}: {} at ({}, {}) {}x{}",
                frame.sequence,
                detection.caption(),
                detection.bbox.x,
                detection.bbox.y,
                detection.bbox.w,
                detection.bbox.h
            );
            if let Some(announcer) = self.announcer.as_mut() {
                announcer.announce(&detection.label);
            }
        }

        self.frames_processed += 1;
        log::debug!(
            "frame {}: {} candidates, {} kept in {:?}",
            frame.sequence,
            candidates.len(),
            detections.len(),
            started.elapsed()
        );

        Ok(FrameReport {
            candidates: candidates.len(),
            detections,
        })
    }

    /// Drain pending announcements and stop the speech worker.
    pub fn shutdown(mut self) {
        if let Some(announcer) = self.announcer.take() {
            announcer.shutdown();
        }
    }
}
