use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use sensing::config::{BackendKind, SensingConfig};
use sensing::{OutputLayout, SpeechEngine, SpeechMode};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENSING_CONFIG",
        "SENSING_CAMERA_DEVICE",
        "SENSING_MODEL_PATH",
        "SENSING_LABELS_PATH",
        "SENSING_CONFIDENCE_THRESHOLD",
        "SENSING_SPEECH",
        "SENSING_FONT_PATH",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "camera": { "device": "/dev/video2", "target_fps": 15, "width": 1280, "height": 720 },
        "model": { "backend": "stub", "path": "models/yolov3-tiny.onnx", "input_size": 320, "layout": "plain" },
        "labels_path": "data/coco.names",
        "confidence_threshold": 0.6,
        "nms": { "score_threshold": 0.55, "iou_threshold": 0.3 },
        "speech": { "engine": "log", "mode": "blocking", "cooldown_secs": 10, "queue_capacity": 2 },
        "snapshot": { "path": "out/latest.jpg" }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("SENSING_CONFIG", file.path());
    std::env::set_var("SENSING_CAMERA_DEVICE", "stub://bench");
    std::env::set_var("SENSING_CONFIDENCE_THRESHOLD", "0.7");

    let cfg = SensingConfig::load().expect("load config");

    assert_eq!(cfg.camera.device, "stub://bench");
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
    assert_eq!(cfg.model.backend, BackendKind::Stub);
    assert_eq!(cfg.model.path.to_str(), Some("models/yolov3-tiny.onnx"));
    assert_eq!(cfg.model.input_size, 320);
    assert_eq!(cfg.model.layout, OutputLayout::Plain);
    assert_eq!(cfg.labels_path.to_str(), Some("data/coco.names"));
    assert_eq!(cfg.confidence_threshold, 0.7);
    assert_eq!(cfg.nms.score_threshold, 0.55);
    assert_eq!(cfg.nms.iou_threshold, 0.3);
    assert_eq!(cfg.speech.engine, SpeechEngine::Log);
    assert_eq!(cfg.speech.mode, SpeechMode::Blocking);
    assert_eq!(cfg.speech.cooldown, Duration::from_secs(10));
    assert_eq!(cfg.speech.queue_capacity, 2);
    let snapshot = cfg.snapshot.expect("snapshot settings");
    assert_eq!(snapshot.path.to_str(), Some("out/latest.jpg"));
    assert_eq!(snapshot.every_frames, 30);

    clear_env();
}

#[test]
fn explicit_path_wins_over_env_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut env_file = NamedTempFile::new().expect("temp config");
    env_file
        .write_all(br#"{ "labels_path": "env.names" }"#)
        .expect("write config");
    let mut cli_file = NamedTempFile::new().expect("temp config");
    cli_file
        .write_all(br#"{ "labels_path": "cli.names" }"#)
        .expect("write config");

    std::env::set_var("SENSING_CONFIG", env_file.path());
    let cfg = SensingConfig::load_with(Some(cli_file.path())).expect("load config");
    assert_eq!(cfg.labels_path.to_str(), Some("cli.names"));

    let cfg = SensingConfig::load_with(None).expect("load config");
    assert_eq!(cfg.labels_path.to_str(), Some("env.names"));

    clear_env();
}

#[test]
fn speech_engine_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENSING_SPEECH", "none");
    let cfg = SensingConfig::load().expect("load config");
    assert_eq!(cfg.speech.engine, SpeechEngine::None);

    std::env::set_var("SENSING_SPEECH", "festival");
    assert!(SensingConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("SENSING_CONFIDENCE_THRESHOLD", "high");
    assert!(SensingConfig::load().is_err());
    std::env::set_var("SENSING_CONFIDENCE_THRESHOLD", "1.5");
    assert!(SensingConfig::load().is_err());
    std::env::remove_var("SENSING_CONFIDENCE_THRESHOLD");

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "camera": { "width": 0 } }"#)
        .expect("write config");
    assert!(SensingConfig::load_with(Some(file.path())).is_err());

    let mut unknown = NamedTempFile::new().expect("temp config");
    unknown
        .write_all(br#"{ "window": { "title": "Image" } }"#)
        .expect("write config");
    assert!(SensingConfig::load_with(Some(unknown.path())).is_err());

    clear_env();
}
