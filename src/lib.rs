//! sensing: real-time object detection with spoken announcements.
//!
//! Frames come from a camera (or a synthetic/still source), go through a YOLO
//! style detector, and the raw network output is decoded into pixel-space
//! candidates, reduced by non-maximum suppression, drawn onto the frame and
//! announced through a speech engine.
//!
//! # Module Structure
//!
//! - `decode`: raw detection vectors to `Candidate`s (the core of the crate)
//! - `nms`: greedy non-maximum suppression
//! - `labels`: class-name table
//! - `frame`, `ingest`: RGB frames and the sources that produce them
//! - `detect`: inference backends and the `Detection` type
//! - `render`, `speech`: outputs (box overlay, snapshots, spoken labels)
//! - `pipeline`: one frame through all of the above
//! - `camera`, `color`: pinhole projection and grayscale helpers
//! - `config`: layered JSON + environment configuration

pub mod camera;
pub mod color;
pub mod config;
pub mod decode;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod labels;
pub mod nms;
pub mod pipeline;
pub mod render;
pub mod speech;

pub use camera::PinholeCamera;
pub use config::{
    BackendKind, ModelSettings, RenderSettings, SensingConfig, SnapshotSettings, SpeechSettings,
};
pub use decode::{decode, BoundingBox, Candidate, DecodeError, DetectionDecoder};
pub use detect::{backend_from_settings, Detection, DetectorBackend, OutputLayout, RawOutputs, StubBackend};
pub use frame::Frame;
pub use ingest::{open_source, CameraConfig, FrameSource, SourceStats, SyntheticSource};
pub use labels::ClassLabels;
pub use nms::{suppress, suppress_candidates, NmsParams};
pub use pipeline::{FrameReport, Pipeline};
pub use render::{Renderer, SnapshotWriter};
pub use speech::{AnnounceOutcome, Announcer, AnnouncerStats, SpeechEngine, SpeechMode, Speaker};
