//! Terminal reporting for the binaries.
//!
//! Startup steps are `Stage`s: a spinner on a TTY, `==>` lines otherwise,
//! finished with what the step resolved (device, backend, class count). Frame
//! loops with a known length get a `FrameProgress` bar.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt::Display;
use std::io::IsTerminal;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    stderr_tty: bool,
    stdout_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode) -> Self {
        Self {
            mode,
            stderr_tty: std::io::stderr().is_terminal(),
            stdout_tty: std::io::stdout().is_terminal(),
        }
    }

    /// Spinners draw on stderr. `Auto` also backs off when stdout is piped,
    /// so captured output stays free of control sequences.
    fn use_pretty(&self) -> bool {
        self.stderr_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => self.stdout_tty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> Stage {
        let spinner = if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        Stage {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
            finished: false,
        }
    }

    /// Progress over `total` frames.
    pub fn frames(&self, total: u64) -> FrameProgress {
        let bar = self.use_pretty().then(|| {
            let bar = ProgressBar::new(total);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{bar:30} {pos}/{len} frames {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar
        });
        FrameProgress {
            bar,
            total,
            seen: 0,
            detections: 0,
            skipped: 0,
            start: Instant::now(),
        }
    }
}

/// One startup step. Call [`Stage::done`] with what it resolved; dropping it
/// unfinished reports the step as failed.
pub struct Stage {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    finished: bool,
}

impl Stage {
    pub fn done(mut self, detail: impl Display) {
        self.finished = true;
        let line = stage_line(true, &self.name, &detail.to_string(), self.start.elapsed());
        self.emit(line);
    }

    fn emit(&self, line: String) {
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if !self.finished {
            let line = stage_line(false, &self.name, "", self.start.elapsed());
            self.emit(line);
        }
    }
}

/// Per-frame progress with a running detection count.
pub struct FrameProgress {
    bar: Option<ProgressBar>,
    total: u64,
    seen: u64,
    detections: u64,
    skipped: u64,
    start: Instant,
}

impl FrameProgress {
    pub fn frame_done(&mut self, detections: usize) {
        self.seen += 1;
        self.detections += detections as u64;
        self.update();
    }

    pub fn frame_skipped(&mut self) {
        self.seen += 1;
        self.skipped += 1;
        self.update();
    }

    fn update(&self) {
        if let Some(bar) = &self.bar {
            bar.set_position(self.seen);
            bar.set_message(self.counts());
        }
    }

    fn counts(&self) -> String {
        if self.skipped == 0 {
            format!("{} detections", self.detections)
        } else {
            format!("{} detections, {} skipped", self.detections, self.skipped)
        }
    }

    pub fn finish(self) {
        let line = format!(
            "{}/{} frames, {} in {}",
            self.seen,
            self.total,
            self.counts(),
            format_duration(self.start.elapsed())
        );
        match &self.bar {
            Some(bar) => bar.finish_with_message(line),
            None => eprintln!("==> {line}"),
        }
    }
}

fn stage_line(ok: bool, name: &str, detail: &str, elapsed: Duration) -> String {
    let elapsed = format_duration(elapsed);
    match (ok, detail.is_empty()) {
        (true, true) => format!("✔ {name} ({elapsed})"),
        (true, false) => format!("✔ {name}: {detail} ({elapsed})"),
        (false, _) => format!("✘ {name} failed after {elapsed}"),
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
