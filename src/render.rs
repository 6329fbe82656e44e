//! Frame annotation.
//!
//! Each detection gets a two-pixel outline in a random color and, when a font
//! is loaded, its caption in white with the baseline 20 px below the box's
//! top edge. Drawing goes through `imageproc` on the frame's own buffer.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{RenderSettings, SnapshotSettings};
use crate::decode::BoundingBox;
use crate::detect::Detection;
use crate::frame::Frame;

const OUTLINE_THICKNESS: i64 = 2;
const CAPTION_BASELINE_OFFSET: i32 = 20;
const CAPTION_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub struct Renderer {
    rng: StdRng,
    font: Option<FontVec>,
    caption_scale: f32,
}

impl Renderer {
    /// Outlines only; add a font with [`Renderer::with_font`].
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            font: None,
            caption_scale: RenderSettings::default().caption_scale,
        }
    }

    /// Deterministic palette, for tests and reproducible snapshots.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new()
        }
    }

    pub fn from_settings(settings: &RenderSettings) -> Result<Self> {
        let renderer = Self::new();
        if !settings.captions {
            return Ok(renderer);
        }
        let font = load_font(&settings.font_path).context(
            "captions need a font: set render.font_path or SENSING_FONT_PATH, or render.captions to false",
        )?;
        Ok(renderer.with_font(font, settings.caption_scale))
    }

    pub fn with_font(mut self, font: FontVec, caption_scale: f32) -> Self {
        self.font = Some(font);
        self.caption_scale = caption_scale;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw one detection and return the outline color.
    pub fn draw(&mut self, frame: &mut Frame, detection: &Detection) -> [u8; 3] {
        let color: [u8; 3] = self.rng.gen();
        let rects = outline_rects(&detection.bbox, frame.width, frame.height);
        let caption = detection.caption();
        let scale = self.caption_scale;
        let top = detection
            .bbox
            .y
            .saturating_add(CAPTION_BASELINE_OFFSET)
            .saturating_sub(scale.round() as i32);
        let font = self
            .font
            .as_ref()
            .filter(|_| caption_reaches_frame(detection.bbox.x, top, &caption, scale, frame));

        frame.with_image(|canvas| {
            for rect in rects {
                draw_hollow_rect_mut(canvas, rect, Rgb(color));
            }
            if let Some(font) = font {
                draw_text_mut(
                    canvas,
                    CAPTION_COLOR,
                    detection.bbox.x,
                    top,
                    PxScale::from(scale),
                    font,
                    &caption,
                );
            }
        });
        color
    }

    pub fn draw_all(&mut self, frame: &mut Frame, detections: &[Detection]) {
        for detection in detections {
            self.draw(frame, detection);
        }
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

/// `draw_text_mut` takes the top of the line, so `top` is the baseline minus
/// one line height. Glyph advances stay below `scale`, which bounds the text
/// extent.
fn caption_reaches_frame(x: i32, top: i32, caption: &str, scale: f32, frame: &Frame) -> bool {
    let scale = scale.ceil() as i64;
    let extent = caption.chars().count() as i64 * scale;
    let (x, top) = (i64::from(x), i64::from(top));
    x < i64::from(frame.width) && top < i64::from(frame.height) && x + extent > 0 && top + 2 * scale > 0
}

/// Nested one-pixel rectangles forming the outline of `bbox`.
///
/// Edges are clamped to just outside the frame first: sides that fall
/// outside stay outside, and huge coordinates cannot overflow in `Rect`.
fn outline_rects(bbox: &BoundingBox, width: u32, height: u32) -> Vec<Rect> {
    let pad = OUTLINE_THICKNESS;
    let clamp_x = |v: i64| v.clamp(-pad, i64::from(width) + pad);
    let clamp_y = |v: i64| v.clamp(-pad, i64::from(height) + pad);
    let x0 = clamp_x(i64::from(bbox.x));
    let y0 = clamp_y(i64::from(bbox.y));
    let x1 = clamp_x(i64::from(bbox.x) + i64::from(bbox.w));
    let y1 = clamp_y(i64::from(bbox.y) + i64::from(bbox.h));

    (0..pad)
        .map_while(|i| {
            let w = x1 - x0 - 2 * i;
            let h = y1 - y0 - 2 * i;
            if w <= 0 || h <= 0 {
                return None;
            }
            let left = i32::try_from(x0 + i).ok()?;
            let top = i32::try_from(y0 + i).ok()?;
            Some(Rect::at(left, top).of_size(u32::try_from(w).ok()?, u32::try_from(h).ok()?))
        })
        .collect()
}

/// Writes every n-th annotated frame to an image file, overwriting the
/// previous one. Format follows the file extension.
pub struct SnapshotWriter {
    settings: SnapshotSettings,
    frames_seen: u64,
}

impl SnapshotWriter {
    pub fn new(settings: SnapshotSettings) -> Self {
        Self {
            settings,
            frames_seen: 0,
        }
    }

    /// Returns true when this frame was written.
    pub fn observe(&mut self, frame: &Frame) -> Result<bool> {
        self.frames_seen += 1;
        if (self.frames_seen - 1) % self.settings.every_frames.max(1) != 0 {
            return Ok(false);
        }
        let image = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        image
            .save(&self.settings.path)
            .with_context(|| format!("write snapshot {}", self.settings.path.display()))?;
        Ok(true)
    }
}
