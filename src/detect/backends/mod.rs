pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

use anyhow::Result;

use crate::config::{BackendKind, ModelSettings};
use crate::detect::backend::DetectorBackend;

pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;

/// Build the backend selected in the model settings.
pub fn backend_from_settings(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend {
        BackendKind::Stub => Ok(Box::new(StubBackend::new())),
        #[cfg(feature = "backend-tract")]
        BackendKind::Tract => Ok(Box::new(TractBackend::new(
            &settings.path,
            settings.input_size,
            settings.layout,
        )?)),
        #[cfg(not(feature = "backend-tract"))]
        BackendKind::Tract => Err(anyhow::anyhow!(
            "model {} needs the backend-tract feature",
            settings.path.display()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_kind_builds_stub_backend() -> Result<()> {
        let settings = ModelSettings {
            backend: BackendKind::Stub,
            ..ModelSettings::default()
        };
        assert_eq!(backend_from_settings(&settings)?.name(), "stub");
        Ok(())
    }

    #[test]
    fn tract_kind_fails_without_model() {
        let settings = ModelSettings {
            backend: BackendKind::Tract,
            path: "/nonexistent/yolov3-416.onnx".into(),
            ..ModelSettings::default()
        };
        assert!(backend_from_settings(&settings).is_err());
    }
}
