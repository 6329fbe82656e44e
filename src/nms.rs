//! Greedy non-maximum suppression over decoded candidates.

use anyhow::{anyhow, Result};

use crate::decode::{BoundingBox, Candidate};

pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.4;

/// Suppression thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NmsParams {
    /// Scores at or below this value are never kept.
    pub score_threshold: f32,
    /// A box overlapping an already kept box by more than this is dropped.
    pub iou_threshold: f32,
}

impl Default for NmsParams {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

/// Return the indices of the boxes to keep, highest score first.
///
/// Equal scores keep their input order, so the earlier box wins a tie.
pub fn suppress(
    boxes: &[BoundingBox],
    scores: &[f32],
    score_threshold: f32,
    iou_threshold: f32,
) -> Result<Vec<usize>> {
    if boxes.len() != scores.len() {
        return Err(anyhow!(
            "suppress needs one score per box ({} boxes, {} scores)",
            boxes.len(),
            scores.len()
        ));
    }

    let mut order: Vec<usize> = (0..scores.len())
        .filter(|&idx| scores[idx] > score_threshold)
        .collect();
    // sort_by is stable
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    for idx in order {
        let overlaps = keep
            .iter()
            .any(|&kept| boxes[idx].iou(&boxes[kept]) > iou_threshold);
        if !overlaps {
            keep.push(idx);
        }
    }
    Ok(keep)
}

/// Suppress a candidate list, returning survivors in keep order.
pub fn suppress_candidates(candidates: &[Candidate], params: NmsParams) -> Result<Vec<Candidate>> {
    let boxes: Vec<BoundingBox> = candidates.iter().map(|c| c.bbox).collect();
    let scores: Vec<f32> = candidates.iter().map(|c| c.confidence).collect();
    let keep = suppress(
        &boxes,
        &scores,
        params.score_threshold,
        params.iou_threshold,
    )?;
    Ok(keep.into_iter().map(|idx| candidates[idx]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_highest_of_overlapping_pair() {
        let boxes = [BoundingBox::new(0, 0, 10, 10), BoundingBox::new(1, 0, 10, 10)];
        let keep = suppress(&boxes, &[0.6, 0.9], 0.5, 0.4).unwrap();
        assert_eq!(keep, vec![1]);
    }

    #[test]
    fn keeps_disjoint_boxes_in_score_order() {
        let boxes = [
            BoundingBox::new(0, 0, 10, 10),
            BoundingBox::new(50, 50, 10, 10),
            BoundingBox::new(100, 0, 10, 10),
        ];
        let keep = suppress(&boxes, &[0.7, 0.95, 0.8], 0.5, 0.4).unwrap();
        assert_eq!(keep, vec![1, 2, 0]);
    }

    #[test]
    fn score_threshold_is_exclusive() {
        let boxes = [BoundingBox::new(0, 0, 10, 10)];
        assert!(suppress(&boxes, &[0.5], 0.5, 0.4).unwrap().is_empty());
    }

    #[test]
    fn overlap_at_threshold_is_kept() {
        // IoU is exactly 0.5
        let boxes = [BoundingBox::new(0, 0, 30, 10), BoundingBox::new(10, 0, 30, 10)];
        let keep = suppress(&boxes, &[0.9, 0.8], 0.1, 0.5).unwrap();
        assert_eq!(keep, vec![0, 1]);
    }

    #[test]
    fn ties_prefer_earlier_index() {
        let boxes = [BoundingBox::new(0, 0, 10, 10), BoundingBox::new(0, 0, 10, 10)];
        let keep = suppress(&boxes, &[0.8, 0.8], 0.5, 0.4).unwrap();
        assert_eq!(keep, vec![0]);
    }

    #[test]
    fn mismatched_lengths_fail() {
        let boxes = [BoundingBox::new(0, 0, 10, 10)];
        assert!(suppress(&boxes, &[], 0.5, 0.4).is_err());
    }

    #[test]
    fn candidates_keep_their_fields() {
        let candidates = [
            Candidate {
                bbox: BoundingBox::new(0, 0, 10, 10),
                class_id: 2,
                confidence: 0.7,
            },
            Candidate {
                bbox: BoundingBox::new(2, 2, 10, 10),
                class_id: 5,
                confidence: 0.9,
            },
        ];
        let kept = suppress_candidates(&candidates, NmsParams::default()).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].class_id, 5);
    }
}
