use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::decode::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::detect::OutputLayout;
use crate::ingest::CameraConfig;
use crate::nms::{NmsParams, DEFAULT_IOU_THRESHOLD, DEFAULT_SCORE_THRESHOLD};
use crate::speech::{SpeechEngine, SpeechMode};

const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_MODEL_PATH: &str = "yolov3-416.onnx";
const DEFAULT_MODEL_INPUT: u32 = 416;
const DEFAULT_LABELS_PATH: &str = "coco.names";
const DEFAULT_SPEECH_COOLDOWN_SECS: u64 = 3;
const DEFAULT_SPEECH_QUEUE: usize = 8;
const DEFAULT_SPEECH_RATE_WPM: u32 = 175;
const DEFAULT_SNAPSHOT_EVERY: u64 = 30;
const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";
pub const DEFAULT_CAPTION_SCALE: f32 = 20.0;

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SensingConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    labels_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    nms: Option<NmsConfigFile>,
    speech: Option<SpeechConfigFile>,
    render: Option<RenderConfigFile>,
    snapshot: Option<SnapshotConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<BackendKind>,
    path: Option<PathBuf>,
    input_size: Option<u32>,
    layout: Option<OutputLayout>,
}

#[derive(Debug, Deserialize, Default)]
struct NmsConfigFile {
    score_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    engine: Option<SpeechEngine>,
    mode: Option<SpeechMode>,
    cooldown_secs: Option<u64>,
    queue_capacity: Option<usize>,
    rate_wpm: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    captions: Option<bool>,
    font_path: Option<PathBuf>,
    caption_scale: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct SnapshotConfigFile {
    path: PathBuf,
    every_frames: Option<u64>,
}

/// Which inference backend runs the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Stub,
    #[default]
    Tract,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub backend: BackendKind,
    pub path: PathBuf,
    /// Side of the square network input, in pixels.
    pub input_size: u32,
    pub layout: OutputLayout,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_MODEL_INPUT,
            layout: OutputLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSettings {
    pub engine: SpeechEngine,
    pub mode: SpeechMode,
    /// Minimum time between two announcements of the same label.
    pub cooldown: Duration,
    pub queue_capacity: usize,
    pub rate_wpm: u32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            engine: SpeechEngine::default(),
            mode: SpeechMode::default(),
            cooldown: Duration::from_secs(DEFAULT_SPEECH_COOLDOWN_SECS),
            queue_capacity: DEFAULT_SPEECH_QUEUE,
            rate_wpm: DEFAULT_SPEECH_RATE_WPM,
        }
    }
}

/// Box caption text.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Off means boxes only.
    pub captions: bool,
    /// TrueType/OpenType font used for captions.
    pub font_path: PathBuf,
    /// Glyph height in pixels.
    pub caption_scale: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            captions: true,
            font_path: PathBuf::from(DEFAULT_FONT_PATH),
            caption_scale: DEFAULT_CAPTION_SCALE,
        }
    }
}

/// Periodic JPEG dump of the annotated frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSettings {
    pub path: PathBuf,
    pub every_frames: u64,
}

#[derive(Debug, Clone)]
pub struct SensingConfig {
    pub camera: CameraConfig,
    pub model: ModelSettings,
    pub labels_path: PathBuf,
    pub confidence_threshold: f32,
    pub nms: NmsParams,
    pub speech: SpeechSettings,
    pub render: RenderSettings,
    pub snapshot: Option<SnapshotSettings>,
}

impl Default for SensingConfig {
    fn default() -> Self {
        // an empty file cannot fail to convert
        Self::from_file(SensingConfigFile::default())
    }
}

impl SensingConfig {
    /// Load from the file named by `SENSING_CONFIG` (if any), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENSING_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Like `load`, but with an explicit config file taking precedence over
    /// `SENSING_CONFIG`.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(Some(path)),
            None => Self::load(),
        }
    }

    fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SensingConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SensingConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file.backend.unwrap_or_default(),
            path: model_file
                .path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: model_file.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
            layout: model_file.layout.unwrap_or_default(),
        };

        let nms_file = file.nms.unwrap_or_default();
        let nms = NmsParams {
            score_threshold: nms_file.score_threshold.unwrap_or(DEFAULT_SCORE_THRESHOLD),
            iou_threshold: nms_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
        };

        let speech_file = file.speech.unwrap_or_default();
        let speech = SpeechSettings {
            engine: speech_file.engine.unwrap_or_default(),
            mode: speech_file.mode.unwrap_or_default(),
            cooldown: Duration::from_secs(
                speech_file
                    .cooldown_secs
                    .unwrap_or(DEFAULT_SPEECH_COOLDOWN_SECS),
            ),
            queue_capacity: speech_file.queue_capacity.unwrap_or(DEFAULT_SPEECH_QUEUE),
            rate_wpm: speech_file.rate_wpm.unwrap_or(DEFAULT_SPEECH_RATE_WPM),
        };

        let render_file = file.render.unwrap_or_default();
        let render = RenderSettings {
            captions: render_file.captions.unwrap_or(true),
            font_path: render_file
                .font_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FONT_PATH)),
            caption_scale: render_file.caption_scale.unwrap_or(DEFAULT_CAPTION_SCALE),
        };

        let snapshot = file.snapshot.map(|snapshot| SnapshotSettings {
            path: snapshot.path,
            every_frames: snapshot.every_frames.unwrap_or(DEFAULT_SNAPSHOT_EVERY),
        });

        Self {
            camera,
            model,
            labels_path: file
                .labels_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LABELS_PATH)),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            nms,
            speech,
            render,
            snapshot,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("SENSING_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(path) = std::env::var("SENSING_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.model.path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("SENSING_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.labels_path = PathBuf::from(path);
            }
        }
        if let Ok(threshold) = std::env::var("SENSING_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = threshold.trim().parse().map_err(|_| {
                anyhow!("SENSING_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Ok(path) = std::env::var("SENSING_FONT_PATH") {
            if !path.trim().is_empty() {
                self.render.font_path = PathBuf::from(path);
            }
        }
        if let Ok(engine) = std::env::var("SENSING_SPEECH") {
            if !engine.trim().is_empty() {
                self.speech.engine = engine.parse()?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("nms.score_threshold", self.nms.score_threshold)?;
        check_unit("nms.iou_threshold", self.nms.iou_threshold)?;

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!(
                "camera size must be positive, got {}x{}",
                self.camera.width,
                self.camera.height
            ));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model.input_size must be greater than zero"));
        }
        if !(self.render.caption_scale > 0.0) {
            return Err(anyhow!(
                "render.caption_scale must be positive, got {}",
                self.render.caption_scale
            ));
        }
        if self.speech.queue_capacity == 0 {
            return Err(anyhow!("speech.queue_capacity must be greater than zero"));
        }
        if let Some(snapshot) = &self.snapshot {
            if snapshot.every_frames == 0 {
                return Err(anyhow!("snapshot.every_frames must be greater than zero"));
            }
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<SensingConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
