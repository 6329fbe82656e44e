#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, OutputLayout, RawOutputs};
use crate::frame::Frame;

/// Tract-based backend for ONNX YOLO models.
///
/// Frames are resized (nearest neighbour, no crop) to the square network
/// input, scaled to [0, 1] and fed as a `1x3xSxS` RGB tensor. Every output
/// tensor becomes one output group, split into rows along its last axis.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    layout: OutputLayout,
    class_count: Option<usize>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32, layout: OutputLayout) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be positive"));
        }
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        // symbolic output shapes leave the count to be checked per frame
        let class_count = model
            .model()
            .output_fact(0)
            .ok()
            .and_then(|fact| fact.shape.as_concrete().and_then(|dims| dims.last().copied()))
            .and_then(|row_len| layout.class_count(row_len));

        log::info!(
            "TractBackend: loaded {} (input {}x{}, {:?} layout, {} classes)",
            model_path.display(),
            input_size,
            input_size,
            layout,
            class_count.map_or_else(|| "unknown".to_string(), |n| n.to_string())
        );

        Ok(Self {
            model,
            input_size,
            layout,
            class_count,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let (src_w, src_h) = (frame.width as usize, frame.height as usize);
        if src_w == 0 || src_h == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let pixels = frame.pixels();
        let side = self.input_size as usize;

        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            let sx = x * src_w / side;
            let sy = y * src_h / side;
            let idx = (sy * src_w + sx) * 3 + channel;
            pixels[idx] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn collect_outputs(&self, outputs: TVec<TValue>) -> Result<RawOutputs> {
        if outputs.is_empty() {
            return Err(anyhow!("model produced no outputs"));
        }

        outputs
            .iter()
            .enumerate()
            .map(|(idx, output)| {
                let view = output
                    .to_array_view::<f32>()
                    .with_context(|| format!("model output {} was not f32", idx))?;
                let row_len = *view
                    .shape()
                    .last()
                    .ok_or_else(|| anyhow!("model output {} is a scalar", idx))?;
                let flat: Vec<f32> = view.iter().copied().collect();
                self.layout
                    .rows(&flat, row_len)
                    .with_context(|| format!("model output {}", idx))
            })
            .collect()
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn forward(&mut self, frame: &Frame) -> Result<RawOutputs> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.collect_outputs(outputs)
    }

    fn class_count(&self) -> Option<usize> {
        self.class_count
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = Frame::filled(side, side, [0, 0, 0])?;
        self.forward(&blank).map(|_| ())
    }
}
