//! demo - end-to-end synthetic run, no camera or model needed

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use sensing::color::rgb_to_gray;
use sensing::config::DEFAULT_CAPTION_SCALE;
use sensing::render::load_font;
use sensing::{
    open_source, Announcer, CameraConfig, ClassLabels, NmsParams, Pipeline, RawOutputs, Renderer,
    SpeechMode, StubBackend,
};

#[path = "../ui.rs"]
mod ui;

const DEMO_LABELS: [&str; 4] = ["person", "bicycle", "car", "dog"];

#[derive(Parser, Debug)]
#[command(name = "demo", about = "Run the detection pipeline on synthetic frames")]
struct Args {
    /// Number of synthetic frames to process.
    #[arg(long, default_value_t = 30)]
    frames: u64,
    /// Optional deterministic seed for the box palette.
    #[arg(long)]
    seed: Option<u64>,
    /// TTF/OTF font for captions; boxes are drawn without captions if unset.
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.frames == 0 {
        return Err(anyhow!("frames must be >= 1"));
    }
    let ui = ui::Ui::new(args.ui);

    let mut pipeline = {
        let stage = ui.stage("Build stub pipeline");
        let labels = ClassLabels::from_lines(DEMO_LABELS)?;
        let announcer = Announcer::new(
            Box::new(sensing::speech::LogSpeaker),
            SpeechMode::Queued,
            Duration::from_secs(1),
            4,
        )?;
        let mut renderer = match args.seed {
            Some(seed) => Renderer::with_seed(seed),
            None => Renderer::new(),
        };
        if let Some(path) = &args.font {
            renderer = renderer.with_font(load_font(path)?, DEFAULT_CAPTION_SCALE);
        }
        let captions = if renderer.has_font() { "with captions" } else { "outlines only" };
        let pipeline = Pipeline::new(
            Box::new(StubBackend::scripted(demo_script())),
            labels,
            0.5,
            NmsParams::default(),
        )
        .with_renderer(renderer)
        .with_announcer(Some(announcer));
        stage.done(format!("{} classes, {}", DEMO_LABELS.len(), captions));
        pipeline
    };

    let mut source = open_source(&CameraConfig {
        device: "stub://demo".to_string(),
        ..CameraConfig::default()
    })?;
    source.connect()?;

    let mut candidates_total = 0usize;
    let mut detections_total = 0usize;
    let mut last_luma = 0.0;
    let mut progress = ui.frames(args.frames);
    for _ in 0..args.frames {
        let mut frame = source.next_frame()?;
        let report = match pipeline.process(&mut frame) {
            Ok(report) => report,
            Err(e) => {
                log::warn!("skipping frame {}: {:#}", frame.sequence, e);
                progress.frame_skipped();
                continue;
            }
        };
        candidates_total += report.candidates;
        detections_total += report.detections.len();
        progress.frame_done(report.detections.len());

        let gray = rgb_to_gray(frame.pixels());
        last_luma = gray.iter().map(|&v| f64::from(v)).sum::<f64>() / gray.len().max(1) as f64;
    }
    progress.finish();
    source.release();

    let speech = pipeline.announcer_stats().unwrap_or_default();
    let frames = pipeline.frames_processed();
    pipeline.shutdown();

    println!("demo summary:");
    println!("  frames processed: {}", frames);
    println!("  candidates decoded: {}", candidates_total);
    println!("  detections kept: {}", detections_total);
    println!(
        "  announcements: {} spoken, {} cooling down, {} dropped",
        speech.accepted, speech.cooling_down, speech.dropped
    );
    println!("  mean luminance of last frame: {:.1}", last_luma);
    Ok(())
}

/// Raw outputs cycled across frames: two overlapping person boxes that
/// suppression merges, a car, and an empty frame.
fn demo_script() -> Vec<RawOutputs> {
    vec![
        vec![vec![
            vec![0.30, 0.50, 0.20, 0.40, 0.92, 0.01, 0.02, 0.00],
            vec![0.31, 0.51, 0.20, 0.40, 0.81, 0.00, 0.03, 0.00],
            vec![0.70, 0.60, 0.25, 0.20, 0.05, 0.00, 0.88, 0.01],
        ]],
        vec![vec![vec![0.72, 0.60, 0.25, 0.20, 0.02, 0.00, 0.76, 0.00]]],
        vec![vec![]],
        vec![vec![vec![0.50, 0.50, 0.10, 0.10, 0.40, 0.10, 0.30, 0.20]]],
    ]
}
