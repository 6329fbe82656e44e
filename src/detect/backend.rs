use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::frame::Frame;

/// Raw network output: one group per output layer, one vector per anchor.
///
/// Each vector is `[center_x, center_y, width, height, class scores...]` with
/// the box normalized to the frame.
pub type RawOutputs = Vec<Vec<Vec<f32>>>;

/// Detector backend trait.
///
/// Backends are driven from the single frame loop; `forward` borrows the frame
/// for the duration of the call only.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the network on a frame and return its raw outputs.
    fn forward(&mut self, frame: &Frame) -> Result<RawOutputs>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Class scores per detection vector, when known before the first frame.
    fn class_count(&self) -> Option<usize> {
        None
    }
}

/// Row layout of a model's output tensors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputLayout {
    /// YOLO/Darknet rows: `[cx, cy, w, h, objectness, class scores...]`.
    /// Objectness is dropped and only the class scores are kept.
    #[default]
    Darknet,
    /// Rows already hold `[cx, cy, w, h, class scores...]`.
    Plain,
}

impl OutputLayout {
    /// Class scores carried by a model row of `row_len` values.
    pub fn class_count(self, row_len: usize) -> Option<usize> {
        let box_and_extras = match self {
            OutputLayout::Darknet => 5,
            OutputLayout::Plain => 4,
        };
        row_len.checked_sub(box_and_extras).filter(|&n| n > 0)
    }

    /// Split a flat output tensor into detection vectors of `row_len` values.
    pub fn rows(self, flat: &[f32], row_len: usize) -> Result<Vec<Vec<f32>>> {
        let min_len = match self {
            OutputLayout::Darknet => 6,
            OutputLayout::Plain => 5,
        };
        if row_len < min_len {
            return Err(anyhow!(
                "{:?} rows need at least {} values, model emits {}",
                self,
                min_len,
                row_len
            ));
        }
        if flat.len() % row_len != 0 {
            return Err(anyhow!(
                "output of {} values is not a whole number of {}-value rows",
                flat.len(),
                row_len
            ));
        }

        Ok(flat
            .chunks_exact(row_len)
            .map(|row| match self {
                OutputLayout::Darknet => row[..4].iter().chain(&row[5..]).copied().collect(),
                OutputLayout::Plain => row.to_vec(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn darknet_rows_drop_objectness() -> Result<()> {
        let flat = [0.5, 0.5, 0.2, 0.4, 0.99, 0.1, 0.9, 0.3, 0.3, 0.1, 0.1, 0.5, 0.0, 0.7];
        let rows = OutputLayout::Darknet.rows(&flat, 7)?;
        assert_eq!(rows[0], vec![0.5, 0.5, 0.2, 0.4, 0.1, 0.9]);
        assert_eq!(rows[1], vec![0.3, 0.3, 0.1, 0.1, 0.0, 0.7]);
        Ok(())
    }

    #[test]
    fn plain_rows_pass_through() -> Result<()> {
        let flat = [0.5, 0.5, 0.2, 0.4, 0.9];
        assert_eq!(OutputLayout::Plain.rows(&flat, 5)?, vec![flat.to_vec()]);
        Ok(())
    }

    #[test]
    fn ragged_output_is_rejected() {
        assert!(OutputLayout::Plain.rows(&[0.0; 11], 5).is_err());
        assert!(OutputLayout::Darknet.rows(&[0.0; 10], 5).is_err());
    }

    #[test]
    fn class_count_excludes_box_and_objectness() {
        assert_eq!(OutputLayout::Darknet.class_count(85), Some(80));
        assert_eq!(OutputLayout::Plain.class_count(84), Some(80));
        assert_eq!(OutputLayout::Plain.class_count(4), None);
    }

    #[test]
    fn layout_names_deserialize() {
        let layout: OutputLayout = serde_json::from_str("\"plain\"").unwrap();
        assert_eq!(layout, OutputLayout::Plain);
    }
}
