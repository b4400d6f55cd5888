//! Frame rendering: mirrored video, hand box and prediction label

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::bbox::BoundingBox;
use crate::config::RenderSettings;
use crate::inference::Prediction;

/// Overlay color (#00FF00)
pub const OVERLAY_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Gap between the label and the top of the box
const LABEL_MARGIN: i32 = 20;

/// Common font locations tried when no font is configured
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Draws each processed frame onto a fixed-size canvas
pub struct FrameRenderer {
    width: u32,
    height: u32,
    line_width: u32,
    label_size: f32,
    font: Option<FontArc>,
}

impl FrameRenderer {
    /// Renderer without a font; labels are skipped
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            line_width: 2,
            label_size: 48.0,
            font: None,
        }
    }

    /// Build from settings, loading the configured or a system font
    pub fn from_settings(settings: &RenderSettings) -> Self {
        let mut renderer = Self::new(settings.width, settings.height);
        renderer.line_width = settings.line_width.max(1);
        renderer.label_size = settings.label_size;

        let font = match &settings.font_path {
            Some(path) => load_font(path)
                .map_err(|e| warn!("{:#}", e))
                .ok(),
            None => find_system_font(),
        };
        if font.is_none() {
            warn!("No label font available; predictions will not be drawn on the canvas");
        }
        renderer.font = font;
        renderer
    }

    /// Fresh canvas holding the frame scaled to the canvas and mirrored horizontally
    pub fn draw_frame(&self, frame: &RgbImage) -> RgbImage {
        let mut canvas = if frame.dimensions() == (self.width, self.height) {
            frame.clone()
        } else {
            imageops::resize(frame, self.width, self.height, FilterType::Triangle)
        };
        imageops::flip_horizontal_in_place(&mut canvas);
        canvas
    }

    /// Outline `bbox` (already in mirrored canvas space)
    pub fn draw_box(&self, canvas: &mut RgbImage, bbox: &BoundingBox) {
        for inset in 0..self.line_width {
            let w = bbox.width.saturating_sub(inset * 2);
            let h = bbox.height.saturating_sub(inset * 2);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((bbox.x + inset) as i32, (bbox.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, OVERLAY_COLOR);
        }
    }

    /// Draw the prediction centered above `bbox`; no-op without a font
    pub fn draw_label(&self, canvas: &mut RgbImage, bbox: &BoundingBox, prediction: &Prediction) {
        let Some(font) = &self.font else {
            return;
        };

        let text = prediction.overlay_text();
        let (text_w, text_h) = text_size(self.label_size, font, &text);

        let x = (bbox.center_x() - text_w as f32 / 2.0).round() as i32;
        let y = (bbox.y as i32 - LABEL_MARGIN - text_h as i32).max(0);
        draw_text_mut(canvas, OVERLAY_COLOR, x.max(0), y, self.label_size, font, &text);
    }
}

/// Load a TrueType/OpenType font from disk
pub fn load_font(path: &Path) -> Result<FontArc> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read font {:?}", path))?;
    FontArc::try_from_vec(data).with_context(|| format!("Invalid font file {:?}", path))
}

fn find_system_font() -> Option<FontArc> {
    FALLBACK_FONTS
        .iter()
        .map(PathBuf::from)
        .filter(|p| p.exists())
        .find_map(|p| {
            let font = load_font(&p).ok()?;
            info!("Loaded label font from {:?}", p);
            Some(font)
        })
}
