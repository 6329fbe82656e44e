//! Spoken announcements of detected labels.
//!
//! A `Speaker` turns text into audio and blocks until the utterance is done.
//! The `Announcer` sits in front of it and decides when a label is worth
//! saying: the same label is not repeated within the cooldown window, and in
//! queued mode the utterance is handed to a worker thread so the frame loop
//! never waits on the speech engine. When the queue is full the label is
//! dropped rather than delaying capture.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Command;
use std::str::FromStr;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::SpeechSettings;

const ESPEAK_PROGRAM: &str = "espeak-ng";
const MAX_UTTERANCE_CHARS: usize = 256;

/// Speech engine selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechEngine {
    /// `espeak-ng` on PATH.
    #[default]
    Espeak,
    /// Write utterances to the log instead of speaking.
    Log,
    /// No announcements.
    None,
}

impl FromStr for SpeechEngine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(SpeechEngine::Espeak),
            "log" => Ok(SpeechEngine::Log),
            "none" | "off" => Ok(SpeechEngine::None),
            other => Err(anyhow!(
                "unknown speech engine '{}' (expected espeak, log or none)",
                other
            )),
        }
    }
}

/// How announcements reach the speaker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechMode {
    /// Bounded queue drained by a worker thread.
    #[default]
    Queued,
    /// Speak inline; the caller waits for every utterance.
    Blocking,
}

/// Text-to-speech engine.
pub trait Speaker: Send {
    fn name(&self) -> &'static str;

    /// Say `text`, returning once the utterance has finished.
    fn speak(&mut self, text: &str) -> Result<()>;
}

/// Speaks through the `espeak-ng` command line tool.
pub struct EspeakSpeaker {
    program: String,
    rate_wpm: u32,
}

impl EspeakSpeaker {
    /// Locate `espeak-ng` and configure its speaking rate.
    pub fn new(rate_wpm: u32) -> Result<Self> {
        Self::with_program(ESPEAK_PROGRAM, rate_wpm)
    }

    pub fn with_program(program: impl Into<String>, rate_wpm: u32) -> Result<Self> {
        let program = program.into();
        Command::new(&program)
            .arg("--version")
            .output()
            .with_context(|| format!("speech engine {} is not available", program))?;
        Ok(Self { program, rate_wpm })
    }
}

impl Speaker for EspeakSpeaker {
    fn name(&self) -> &'static str {
        "espeak"
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        let text = sanitize(text);
        if text.is_empty() {
            return Err(anyhow!("nothing to say after sanitizing"));
        }
        let output = Command::new(&self.program)
            .arg("-s")
            .arg(self.rate_wpm.to_string())
            .arg("--")
            .arg(&text)
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;
        if !output.status.success() {
            return Err(anyhow!(
                "{} failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Logs utterances at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn name(&self) -> &'static str {
        "log"
    }

    fn speak(&mut self, text: &str) -> Result<()> {
        log::info!("speak: {}", text);
        Ok(())
    }
}

/// Strip control and shell metacharacters and cap the length.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() && !matches!(c, ';' | '|' | '&' | '$' | '`' | '<' | '>'))
        .take(MAX_UTTERANCE_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// What happened to an announcement request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnounceOutcome {
    /// Spoken inline (blocking mode).
    Spoken,
    /// Handed to the speech worker.
    Queued,
    /// Same label announced within the cooldown window.
    CoolingDown,
    /// Queue full; the label was not announced.
    Dropped,
    /// The speaker reported an error.
    Failed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnnouncerStats {
    pub accepted: u64,
    pub cooling_down: u64,
    pub dropped: u64,
    pub failed: u64,
}

enum Delivery {
    Blocking(Box<dyn Speaker>),
    Queued {
        tx: Option<SyncSender<String>>,
        worker: Option<JoinHandle<()>>,
    },
}

/// Rate-limited front end to a speaker.
pub struct Announcer {
    delivery: Delivery,
    cooldown: Duration,
    last_spoken: HashMap<String, Instant>,
    stats: AnnouncerStats,
}

impl Announcer {
    pub fn new(
        speaker: Box<dyn Speaker>,
        mode: SpeechMode,
        cooldown: Duration,
        queue_capacity: usize,
    ) -> Result<Self> {
        let delivery = match mode {
            SpeechMode::Blocking => Delivery::Blocking(speaker),
            SpeechMode::Queued => {
                if queue_capacity == 0 {
                    return Err(anyhow!("speech queue capacity must be greater than zero"));
                }
                let (tx, rx) = mpsc::sync_channel::<String>(queue_capacity);
                let mut speaker = speaker;
                let worker = std::thread::Builder::new()
                    .name("speech".to_string())
                    .spawn(move || {
                        for text in rx {
                            if let Err(e) = speaker.speak(&text) {
                                log::warn!("speech failed for '{}': {:#}", text, e);
                            }
                        }
                        log::debug!("speech worker ({}) stopped", speaker.name());
                    })
                    .context("failed to start speech worker")?;
                Delivery::Queued {
                    tx: Some(tx),
                    worker: Some(worker),
                }
            }
        };

        Ok(Self {
            delivery,
            cooldown,
            last_spoken: HashMap::new(),
            stats: AnnouncerStats::default(),
        })
    }

    /// Build the announcer described by the settings; `None` when speech is off.
    pub fn from_settings(settings: &SpeechSettings) -> Result<Option<Self>> {
        let speaker: Box<dyn Speaker> = match settings.engine {
            SpeechEngine::None => return Ok(None),
            SpeechEngine::Log => Box::new(LogSpeaker),
            SpeechEngine::Espeak => Box::new(EspeakSpeaker::new(settings.rate_wpm)?),
        };
        Self::new(
            speaker,
            settings.mode,
            settings.cooldown,
            settings.queue_capacity,
        )
        .map(Some)
    }

    pub fn announce(&mut self, label: &str) -> AnnounceOutcome {
        self.announce_at(label, Instant::now())
    }

    /// Announce with an explicit clock reading.
    pub fn announce_at(&mut self, label: &str, now: Instant) -> AnnounceOutcome {
        if let Some(last) = self.last_spoken.get(label) {
            if now.saturating_duration_since(*last) < self.cooldown {
                self.stats.cooling_down += 1;
                return AnnounceOutcome::CoolingDown;
            }
        }

        let outcome = match &mut self.delivery {
            Delivery::Blocking(speaker) => match speaker.speak(label) {
                Ok(()) => AnnounceOutcome::Spoken,
                Err(e) => {
                    log::warn!("speech failed for '{}': {:#}", label, e);
                    AnnounceOutcome::Failed
                }
            },
            Delivery::Queued { tx, .. } => match tx.as_ref().map(|tx| tx.try_send(label.to_string())) {
                Some(Ok(())) => AnnounceOutcome::Queued,
                Some(Err(TrySendError::Full(_))) => {
                    log::debug!("speech queue full, dropping '{}'", label);
                    AnnounceOutcome::Dropped
                }
                Some(Err(TrySendError::Disconnected(_))) | None => {
                    log::warn!("speech worker is gone, cannot announce '{}'", label);
                    AnnounceOutcome::Failed
                }
            },
        };

        match outcome {
            AnnounceOutcome::Spoken | AnnounceOutcome::Queued => {
                self.stats.accepted += 1;
                self.last_spoken.insert(label.to_string(), now);
            }
            AnnounceOutcome::Dropped => self.stats.dropped += 1,
            AnnounceOutcome::Failed => self.stats.failed += 1,
            AnnounceOutcome::CoolingDown => {}
        }
        outcome
    }

    pub fn stats(&self) -> AnnouncerStats {
        self.stats
    }

    /// Let queued utterances finish and stop the worker.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        if let Delivery::Queued { tx, worker } = &mut self.delivery {
            // closing the channel ends the worker loop once the queue drains
            tx.take();
            if let Some(worker) = worker.take() {
                if worker.join().is_err() {
                    log::error!("speech worker panicked");
                }
            }
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.stop_worker();
    }
}
