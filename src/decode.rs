//! Decoding of raw detector output into pixel-space candidates.
//!
//! A detector emits one or more output groups (one per output layer), each a
//! list of fixed-length vectors laid out as
//! `[center_x, center_y, width, height, class scores...]` with box fields
//! normalized to the frame size. `decode` picks the winning class for every
//! vector, drops the ones at or below the confidence threshold and rescales the
//! rest into top-left anchored pixel boxes, ready for suppression.
//!
//! Coordinates are converted with an integer cast (truncation toward zero),
//! not rounding. Group order and within-group order are preserved in the
//! output because suppression breaks score ties by position.

use thiserror::Error;

/// Minimum winning class score, exclusive.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Number of leading box fields before the class scores.
const BOX_FIELDS: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Malformed detection vector or unusable frame dimensions.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl DecodeError {
    fn invalid(reason: impl Into<String>) -> Self {
        DecodeError::InvalidInput {
            reason: reason.into(),
        }
    }
}

/// Axis-aligned box in pixel space. `(x, y)` is the top-left corner and may be
/// negative when the detection hangs over the frame edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Area in square pixels; degenerate boxes have zero area.
    pub fn area(&self) -> i64 {
        i64::from(self.w.max(0)) * i64::from(self.h.max(0))
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = i64::from(self.x).max(i64::from(other.x));
        let top = i64::from(self.y).max(i64::from(other.y));
        let right = (i64::from(self.x) + i64::from(self.w))
            .min(i64::from(other.x) + i64::from(other.w));
        let bottom = (i64::from(self.y) + i64::from(self.h))
            .min(i64::from(other.y) + i64::from(other.h));

        let intersection = (right - left).max(0) * (bottom - top).max(0);
        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            return 0.0;
        }
        (intersection as f64 / union as f64) as f32
    }
}

/// A decoded detection that passed the confidence threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub class_id: usize,
    pub confidence: f32,
}

/// Decoder configuration: the confidence threshold and, optionally, the number
/// of classes the model was trained on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionDecoder {
    confidence_threshold: f32,
    num_classes: Option<usize>,
}

impl DetectionDecoder {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            num_classes: None,
        }
    }

    /// Require every vector to carry exactly `num_classes` scores, so that each
    /// emitted class id is valid for a label table of that length.
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = Some(num_classes);
        self
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn num_classes(&self) -> Option<usize> {
        self.num_classes
    }

    pub fn decode<G, D>(
        &self,
        raw_outputs: &[G],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<Candidate>, DecodeError>
    where
        G: AsRef<[D]>,
        D: AsRef<[f32]>,
    {
        decode_with(
            raw_outputs,
            frame_width,
            frame_height,
            self.confidence_threshold,
            self.num_classes,
        )
    }
}

impl Default for DetectionDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

/// Decode raw network output into pixel-space candidates.
///
/// Fails with [`DecodeError::InvalidInput`] when a frame dimension is zero or
/// any vector is shorter than five entries.
pub fn decode<G, D>(
    raw_outputs: &[G],
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
) -> Result<Vec<Candidate>, DecodeError>
where
    G: AsRef<[D]>,
    D: AsRef<[f32]>,
{
    decode_with(
        raw_outputs,
        frame_width,
        frame_height,
        confidence_threshold,
        None,
    )
}

fn decode_with<G, D>(
    raw_outputs: &[G],
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
    num_classes: Option<usize>,
) -> Result<Vec<Candidate>, DecodeError>
where
    G: AsRef<[D]>,
    D: AsRef<[f32]>,
{
    if frame_width == 0 || frame_height == 0 {
        return Err(DecodeError::invalid(format!(
            "frame dimensions must be positive, got {}x{}",
            frame_width, frame_height
        )));
    }

    let width = f64::from(frame_width);
    let height = f64::from(frame_height);
    let mut candidates = Vec::new();

    for (group_idx, group) in raw_outputs.iter().enumerate() {
        for (row_idx, row) in group.as_ref().iter().enumerate() {
            let row = row.as_ref();
            if row.len() <= BOX_FIELDS {
                return Err(DecodeError::invalid(format!(
                    "detection {}:{} has {} entries, need at least {}",
                    group_idx,
                    row_idx,
                    row.len(),
                    BOX_FIELDS + 1
                )));
            }

            let scores = &row[BOX_FIELDS..];
            if let Some(expected) = num_classes {
                if scores.len() != expected {
                    return Err(DecodeError::invalid(format!(
                        "detection {}:{} has {} class scores, model has {} classes",
                        group_idx,
                        row_idx,
                        scores.len(),
                        expected
                    )));
                }
            }

            let (class_id, confidence) = stable_argmax(scores);
            // NaN never compares greater, so it is dropped here too.
            if !(confidence > confidence_threshold) {
                continue;
            }

            let center_x = truncate(row[0], width);
            let center_y = truncate(row[1], height);
            let w = truncate(row[2], width);
            let h = truncate(row[3], height);

            candidates.push(Candidate {
                bbox: BoundingBox {
                    x: center_x - w / 2,
                    y: center_y - h / 2,
                    w,
                    h,
                },
                class_id,
                confidence,
            });
        }
    }

    Ok(candidates)
}

/// Scale a normalized coordinate and cast toward zero.
fn truncate(normalized: f32, extent: f64) -> i32 {
    (f64::from(normalized) * extent) as i32
}

/// Index and value of the first maximum. `scores` is never empty here.
fn stable_argmax(scores: &[f32]) -> (usize, f32) {
    let mut best = 0;
    let mut best_score = scores[0];
    for (idx, &score) in scores.iter().enumerate().skip(1) {
        if score > best_score {
            best = idx;
            best_score = score;
        }
    }
    (best, best_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(row: Vec<f32>) -> Vec<Vec<Vec<f32>>> {
        vec![vec![row]]
    }

    #[test]
    fn decodes_centered_box_in_portrait_frame() {
        let raw = single(vec![0.5, 0.5, 0.2, 0.4, 0.1, 0.9]);
        let out = decode(&raw, 100, 200, 0.5).unwrap();

        assert_eq!(
            out,
            vec![Candidate {
                bbox: BoundingBox::new(40, 60, 20, 80),
                class_id: 1,
                confidence: 0.9,
            }]
        );
    }

    #[test]
    fn high_threshold_yields_nothing() {
        let raw = single(vec![0.5, 0.5, 0.2, 0.4, 0.1, 0.9]);
        assert!(decode(&raw, 100, 200, 0.95).unwrap().is_empty());
    }

    #[test]
    fn confidence_equal_to_threshold_is_excluded() {
        let raw = single(vec![0.5, 0.5, 0.2, 0.4, 0.25, 0.75]);
        assert!(decode(&raw, 100, 100, 0.75).unwrap().is_empty());
        assert_eq!(decode(&raw, 100, 100, 0.7499).unwrap().len(), 1);
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        let raw = single(vec![0.5, 0.5, 0.2, 0.4, 0.1, 0.9]);
        assert!(matches!(
            decode(&raw, 0, 200, 0.5),
            Err(DecodeError::InvalidInput { .. })
        ));
        assert!(matches!(
            decode(&raw, 100, 0, 0.5),
            Err(DecodeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn short_vectors_are_invalid() {
        let raw = vec![vec![vec![0.5, 0.5, 0.2, 0.4, 0.9], vec![0.5, 0.5, 0.2, 0.4]]];
        let err = decode(&raw, 100, 100, 0.5).unwrap_err();
        assert!(err.to_string().contains("0:1"));
    }

    #[test]
    fn coordinates_truncate_instead_of_rounding() {
        // 0.515625 * 100 = 51.5625 and 0.1015625 * 100 = 10.15625, both exact in f32.
        let raw = single(vec![0.515625, 0.515625, 0.1015625, 0.1015625, 0.0, 0.8]);
        let out = decode(&raw, 100, 100, 0.5).unwrap();

        // Rounding would give center 52 and top-left 47.
        assert_eq!(out[0].bbox, BoundingBox::new(46, 46, 10, 10));
    }

    #[test]
    fn odd_width_uses_integer_halving() {
        let raw = single(vec![0.5, 0.5, 0.25, 0.25, 0.9]);
        let out = decode(&raw, 84, 84, 0.5).unwrap();
        // center 42, w 21: 42 - 21 / 2 == 32. Float halving with
        // truncation, int(42 - 10.5), would give 31 instead.
        assert_eq!(out[0].bbox, BoundingBox::new(32, 32, 21, 21));
    }

    #[test]
    fn box_over_left_edge_has_negative_origin() {
        let raw = single(vec![0.0, 0.0, 0.5, 0.5, 0.9]);
        let out = decode(&raw, 100, 100, 0.5).unwrap();
        assert_eq!(out[0].bbox, BoundingBox::new(-25, -25, 50, 50));
    }

    #[test]
    fn ties_pick_first_class() {
        let raw = single(vec![0.5, 0.5, 0.1, 0.1, 0.2, 0.8, 0.8, 0.1]);
        let out = decode(&raw, 10, 10, 0.5).unwrap();
        assert_eq!(out[0].class_id, 1);
    }

    #[test]
    fn nan_scores_never_pass() {
        let raw = single(vec![0.5, 0.5, 0.1, 0.1, f32::NAN, f32::NAN]);
        assert!(decode(&raw, 10, 10, 0.0).unwrap().is_empty());
    }

    #[test]
    fn order_follows_groups_then_rows() {
        let raw = vec![
            vec![
                vec![0.1, 0.1, 0.1, 0.1, 0.9, 0.0],
                vec![0.2, 0.2, 0.1, 0.1, 0.1, 0.2],
                vec![0.3, 0.3, 0.1, 0.1, 0.0, 0.7],
            ],
            vec![vec![0.4, 0.4, 0.1, 0.1, 0.6, 0.0]],
        ];
        let out = decode(&raw, 100, 100, 0.5).unwrap();
        let centers: Vec<i32> = out.iter().map(|c| c.bbox.x + c.bbox.w / 2).collect();
        assert_eq!(centers, vec![10, 30, 40]);
        assert_eq!(
            out.iter().map(|c| c.class_id).collect::<Vec<_>>(),
            vec![0, 1, 0]
        );
    }

    #[test]
    fn output_is_deterministic_and_bounded() {
        let raw: Vec<Vec<Vec<f32>>> = (0..3)
            .map(|g| {
                (0..20)
                    .map(|i| {
                        let t = (g * 20 + i) as f32 / 60.0;
                        vec![t, 1.0 - t, 0.2, 0.3, t, 1.0 - t, 0.5]
                    })
                    .collect()
            })
            .collect();

        let first = decode(&raw, 640, 480, 0.6).unwrap();
        let second = decode(&raw, 640, 480, 0.6).unwrap();
        assert_eq!(first, second);
        assert!(first.len() <= 60);
        for candidate in &first {
            assert!(candidate.confidence > 0.6);
            assert!(candidate.class_id < 3);
        }
    }

    #[test]
    fn overlapping_detections_are_both_returned() {
        let raw = single(vec![0.5, 0.5, 0.2, 0.2, 0.0, 0.9]);
        let mut rows = raw[0].clone();
        rows.push(vec![0.51, 0.5, 0.2, 0.2, 0.0, 0.8]);
        let out = decode(&[rows], 100, 100, 0.5).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn decoder_checks_class_count() {
        let decoder = DetectionDecoder::default().with_num_classes(3);
        let raw = single(vec![0.5, 0.5, 0.2, 0.4, 0.1, 0.9]);
        assert!(decoder.decode(&raw, 100, 200).is_err());

        let raw = single(vec![0.5, 0.5, 0.2, 0.4, 0.1, 0.9, 0.0]);
        let out = decoder.decode(&raw, 100, 200).unwrap();
        assert_eq!(out[0].class_id, 1);
    }

    #[test]
    fn accepts_borrowed_rows() {
        let row: &[f32] = &[0.5, 0.5, 0.2, 0.4, 0.1, 0.9];
        let group = [row];
        let out = DetectionDecoder::default().decode(&[group], 100, 200).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(20, 20, 10, 10);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(a.iou(&a), 1.0);
        let half = BoundingBox::new(5, 0, 10, 10);
        assert!((a.iou(&half) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(BoundingBox::new(0, 0, 0, 0).iou(&BoundingBox::default()), 0.0);
    }
}
