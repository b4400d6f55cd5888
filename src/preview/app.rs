//! Preview application

use crossbeam_channel::Receiver;
use eframe::egui;
use egui::{Color32, RichText};
use std::time::{Duration, Instant};

use crate::inference::QueueHandle;
use crate::shared::{PreviewFrame, SessionState, SharedSessionState};

const BG_DARK: Color32 = Color32::from_rgb(18, 18, 24);
const TEXT_PRIMARY: Color32 = Color32::from_rgb(240, 240, 245);
const TEXT_MUTED: Color32 = Color32::from_rgb(100, 100, 115);
const STATUS_OK: Color32 = Color32::from_rgb(46, 204, 113);
const STATUS_ERROR: Color32 = Color32::from_rgb(231, 76, 60);

/// Line shown under the video
pub fn status_line(state: &SessionState) -> (String, bool) {
    if let Some(error) = state.last_error() {
        return (error.to_string(), true);
    }
    match state.prediction() {
        Some(prediction) => (prediction.status_text(), false),
        None if state.is_capturing => ("Show a hand to the camera".to_string(), false),
        None => ("Starting camera...".to_string(), false),
    }
}

/// Helper for calculating the displayed frame rate
struct FrameCounter {
    frames_this_second: u32,
    last_update: Instant,
    current_fps: f32,
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self {
            frames_this_second: 0,
            last_update: Instant::now(),
            current_fps: 0.0,
        }
    }
}

impl FrameCounter {
    fn tick(&mut self) {
        self.frames_this_second += 1;
        let elapsed = self.last_update.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            self.current_fps = self.frames_this_second as f32 / elapsed;
            self.frames_this_second = 0;
            self.last_update = Instant::now();
        }
    }
}

/// Window showing the live canvas
pub struct PreviewApp {
    frames: Receiver<PreviewFrame>,
    state: SharedSessionState,
    queue: QueueHandle,
    texture: Option<egui::TextureHandle>,
    texture_size: Option<[usize; 2]>,
    counter: FrameCounter,
    latency: Duration,
}

impl PreviewApp {
    pub fn new(frames: Receiver<PreviewFrame>, state: SharedSessionState, queue: QueueHandle) -> Self {
        Self {
            frames,
            state,
            queue,
            texture: None,
            texture_size: None,
            counter: FrameCounter::default(),
            latency: Duration::ZERO,
        }
    }

    /// Create eframe options for the preview window
    pub fn options() -> eframe::NativeOptions {
        eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 800.0])
                .with_min_inner_size([640.0, 400.0])
                .with_title("SignLens"),
            ..Default::default()
        }
    }

    /// Upload the newest pending frame, skipping any older ones
    fn update_texture(&mut self, ctx: &egui::Context) {
        let Some(frame) = self.frames.try_iter().last() else {
            return;
        };
        self.counter.tick();
        self.latency = frame.captured_at.elapsed();

        let size = frame.size();
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &frame.to_rgba());

        if self.texture_size == Some(size) {
            if let Some(texture) = &mut self.texture {
                texture.set(color_image, egui::TextureOptions::LINEAR);
                return;
            }
        }

        self.texture = Some(ctx.load_texture(
            "camera_preview",
            color_image,
            egui::TextureOptions::LINEAR,
        ));
        self.texture_size = Some(size);
    }
}

impl eframe::App for PreviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_texture(ctx);

        let (status, is_error, stats) = {
            let state = self.state.read();
            let (status, is_error) = status_line(&state);
            (status, is_error, state.stats)
        };

        egui::TopBottomPanel::bottom("status")
            .frame(egui::Frame::none().fill(BG_DARK).inner_margin(12.0))
            .show(ctx, |ui| {
                let color = if is_error { STATUS_ERROR } else { STATUS_OK };
                ui.label(RichText::new(status).size(22.0).strong().color(color));
                ui.label(
                    RichText::new(format!(
                        "{:.1} fps | {} ms latency | {} crops sent | {} pending | {} failures",
                        self.counter.current_fps,
                        self.latency.as_millis(),
                        stats.crops_queued,
                        self.queue.len(),
                        stats.failures
                    ))
                    .size(11.0)
                    .color(TEXT_MUTED),
                );
            });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(BG_DARK))
            .show(ctx, |ui| match &self.texture {
                Some(texture) => {
                    let available = ui.available_size();
                    let tex_size = texture.size_vec2();
                    let scale = (available.x / tex_size.x).min(available.y / tex_size.y);
                    ui.centered_and_justified(|ui| {
                        ui.image((texture.id(), tex_size * scale));
                    });
                }
                None => {
                    ui.centered_and_justified(|ui| {
                        ui.label(RichText::new("Waiting for camera...").color(TEXT_PRIMARY));
                    });
                }
            });

        ctx.request_repaint();
    }
}
