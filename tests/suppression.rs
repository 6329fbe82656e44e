use sensing::{decode, suppress_candidates, BoundingBox, DecodeError, NmsParams};

fn overlapping_pair() -> Vec<Vec<Vec<f32>>> {
    vec![vec![
        vec![0.5, 0.5, 0.2, 0.2, 0.1, 0.9],
        vec![0.55, 0.5, 0.2, 0.2, 0.2, 0.8],
    ]]
}

#[test]
fn decode_keeps_both_overlapping_detections() {
    let candidates = decode(&overlapping_pair(), 100, 100, 0.5).expect("decode");
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].bbox, BoundingBox::new(40, 40, 20, 20));
    assert_eq!(candidates[1].bbox, BoundingBox::new(45, 40, 20, 20));
    assert!(candidates.iter().all(|c| c.class_id == 1));
}

#[test]
fn suppression_reduces_overlap_to_strongest() {
    let candidates = decode(&overlapping_pair(), 100, 100, 0.5).expect("decode");
    let kept = suppress_candidates(
        &candidates,
        NmsParams {
            score_threshold: 0.5,
            iou_threshold: 0.3,
        },
    )
    .expect("suppress");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].confidence, 0.9);
}

#[test]
fn permissive_iou_keeps_both() {
    let candidates = decode(&overlapping_pair(), 100, 100, 0.5).expect("decode");
    let kept = suppress_candidates(
        &candidates,
        NmsParams {
            score_threshold: 0.5,
            iou_threshold: 0.95,
        },
    )
    .expect("suppress");
    assert_eq!(kept.len(), 2);
}

#[test]
fn multiple_output_groups_are_concatenated() {
    let groups = vec![
        vec![vec![0.1, 0.1, 0.1, 0.1, 0.6, 0.0]],
        vec![],
        vec![vec![0.875, 0.875, 0.125, 0.125, 0.0, 0.7]],
    ];
    let candidates = decode(&groups, 200, 100, 0.5).expect("decode");
    let classes: Vec<usize> = candidates.iter().map(|c| c.class_id).collect();
    assert_eq!(classes, vec![0, 1]);
    assert_eq!(candidates[1].bbox, BoundingBox::new(163, 81, 25, 12));
}

#[test]
fn malformed_rows_are_rejected() {
    let short = vec![vec![vec![0.5, 0.5, 0.1, 0.1]]];
    let err = decode(&short, 10, 10, 0.5).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidInput { .. }));

    let err = decode(&overlapping_pair(), 0, 10, 0.5).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidInput { .. }));
}
