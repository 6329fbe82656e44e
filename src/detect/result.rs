use crate::decode::{BoundingBox, Candidate};

/// A detection that survived suppression, joined with its label.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub class_id: usize,
    pub confidence: f32,
    /// Pixel box, top-left anchored.
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn from_candidate(candidate: &Candidate, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            class_id: candidate.class_id,
            confidence: candidate.confidence,
            bbox: candidate.bbox,
        }
    }

    /// Overlay text: label and confidence rounded to two places.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}
