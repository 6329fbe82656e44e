//! sensing - live object detection with spoken announcements
//!
//! This binary:
//! 1. Loads configuration (JSON file, environment, command line)
//! 2. Opens the label table, the detector backend and the camera
//! 3. Runs every frame through decode, suppression, overlay and speech
//! 4. Optionally writes annotated snapshots
//! 5. Stops on Ctrl-C (or after --max-frames), releasing the camera

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sensing::{
    backend_from_settings, open_source, Announcer, ClassLabels, Pipeline, Renderer, SensingConfig,
    SnapshotWriter,
};

#[path = "../ui.rs"]
mod ui;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "sensing",
    version,
    about = "Detect objects on a camera feed and announce them",
    after_help = "Runs until interrupted: press Ctrl-C to stop (or pass --max-frames). \
                  The camera is released and queued announcements are drained on exit."
)]
struct Args {
    /// JSON config file (overrides SENSING_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Camera device: /dev/videoN, stub://name or image://path
    #[arg(long, value_name = "DEV")]
    device: Option<String>,

    /// ONNX model path
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,

    /// Class label file, one name per line
    #[arg(long, value_name = "PATH")]
    labels: Option<PathBuf>,

    /// Minimum class confidence, exclusive
    #[arg(long, value_name = "F")]
    confidence: Option<f32>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// UI mode for stderr progress
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::new(args.ui);

    let config = {
        let stage = ui.stage("Load configuration");
        let mut config = SensingConfig::load_with(args.config.as_deref())?;
        apply_args(&mut config, &args);
        config.validate()?;
        stage.done(format!(
            "threshold {} nms {}/{}",
            config.confidence_threshold, config.nms.score_threshold, config.nms.iou_threshold
        ));
        config
    };

    let labels = {
        let stage = ui.stage("Load class labels");
        let labels = ClassLabels::load(&config.labels_path)?;
        stage.done(format!("{} classes from {}", labels.len(), config.labels_path.display()));
        labels
    };

    let mut pipeline = {
        let stage = ui.stage("Load detector");
        let backend = backend_from_settings(&config.model)?;
        let renderer = Renderer::from_settings(&config.render)?;
        let captions = if renderer.has_font() { "captions on" } else { "captions off" };
        let announcer = Announcer::from_settings(&config.speech)?;
        let speech = if announcer.is_some() { "speech on" } else { "speech off" };
        let mut pipeline = Pipeline::new(backend, labels, config.confidence_threshold, config.nms)
            .with_renderer(renderer)
            .with_announcer(announcer);
        pipeline.warm_up()?;
        stage.done(format!("{} backend, {}, {}", pipeline.backend_name(), captions, speech));
        pipeline
    };

    let mut source = {
        let stage = ui.stage("Open camera");
        let mut source = open_source(&config.camera)?;
        source
            .connect()
            .with_context(|| format!("failed to open camera {}", config.camera.device))?;
        stage.done(format!(
            "{} {}x{} @ {} fps",
            config.camera.device, config.camera.width, config.camera.height, config.camera.target_fps
        ));
        source
    };

    let mut snapshots = config.snapshot.clone().map(SnapshotWriter::new);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    log::info!(
        "sensing running. camera={} backend={} labels={} threshold={}",
        config.camera.device,
        pipeline.backend_name(),
        config.labels_path.display(),
        config.confidence_threshold
    );

    let frame_interval = Duration::from_secs(1) / config.camera.target_fps.max(1);
    let mut last_health_log = Instant::now();
    let mut frames_seen = 0u64;
    let mut frames_skipped = 0u64;
    let mut detections_total = 0u64;
    let mut progress = args.max_frames.map(|max| ui.frames(max));

    while running.load(Ordering::SeqCst) {
        if args.max_frames.is_some_and(|max| frames_seen >= max) {
            log::info!("reached --max-frames, stopping");
            break;
        }
        let tick = Instant::now();
        frames_seen += 1;

        let mut frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                frames_skipped += 1;
                if let Some(progress) = progress.as_mut() {
                    progress.frame_skipped();
                }
                log::warn!("frame capture failed: {:#}", e);
                std::thread::sleep(frame_interval);
                continue;
            }
        };

        match pipeline.process(&mut frame) {
            Ok(report) => {
                detections_total += report.detections.len() as u64;
                if let Some(progress) = progress.as_mut() {
                    progress.frame_done(report.detections.len());
                }
            }
            Err(e) => {
                frames_skipped += 1;
                if let Some(progress) = progress.as_mut() {
                    progress.frame_skipped();
                }
                log::warn!("skipping frame {}: {:#}", frame.sequence, e);
                continue;
            }
        }

        if let Some(writer) = snapshots.as_mut() {
            if let Err(e) = writer.observe(&frame) {
                log::warn!("snapshot failed: {:#}", e);
            }
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = source.stats();
            log::info!(
                "camera health={} frames={} device={} skipped={} detections={}",
                source.is_healthy(),
                stats.frames_captured,
                stats.device,
                frames_skipped,
                detections_total
            );
            if let Some(speech) = pipeline.announcer_stats() {
                log::debug!(
                    "speech accepted={} cooling_down={} dropped={} failed={}",
                    speech.accepted,
                    speech.cooling_down,
                    speech.dropped,
                    speech.failed
                );
            }
            last_health_log = Instant::now();
        }

        if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    if let Some(progress) = progress {
        progress.finish();
    }
    log::info!(
        "shutting down after {} frames ({} skipped, {} detections)",
        frames_seen,
        frames_skipped,
        detections_total
    );
    source.release();
    pipeline.shutdown();
    Ok(())
}

fn apply_args(config: &mut SensingConfig, args: &Args) {
    if let Some(device) = &args.device {
        config.camera.device = device.clone();
    }
    if let Some(model) = &args.model {
        config.model.path = model.clone();
    }
    if let Some(labels) = &args.labels {
        config.labels_path = labels.clone();
    }
    if let Some(confidence) = args.confidence {
        config.confidence_threshold = confidence;
    }
}
