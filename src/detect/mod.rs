//! Detector backends and the detections they lead to.
//!
//! A backend runs the network forward pass and returns its raw output groups;
//! turning those into boxes is the decoder's job (`crate::decode`).

mod backend;
mod backends;
mod result;

pub use backend::{DetectorBackend, OutputLayout, RawOutputs};
pub use backends::{backend_from_settings, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::Detection;
