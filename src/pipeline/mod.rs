//! Per-frame pipeline
//!
//! For every landmark result: render the mirrored frame, box the hand, crop it
//! when the interval allows, queue the crop and overlay the latest prediction.

pub mod bbox;
pub mod crop;
pub mod render;

use image::RgbImage;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::inference::QueueHandle;
use crate::shared::SharedSessionState;
use crate::vision::HandLandmarks;

pub use bbox::BoundingBox;
pub use crop::Cropper;
pub use render::FrameRenderer;

/// Render, crop and enqueue stages driven by the capture loop
pub struct FramePipeline {
    renderer: FrameRenderer,
    cropper: Cropper,
    queue: QueueHandle,
    state: SharedSessionState,
}

impl FramePipeline {
    pub fn new(
        renderer: FrameRenderer,
        cropper: Cropper,
        queue: QueueHandle,
        state: SharedSessionState,
    ) -> Self {
        Self {
            renderer,
            cropper,
            queue,
            state,
        }
    }

    pub fn from_config(config: &AppConfig, queue: QueueHandle, state: SharedSessionState) -> Self {
        Self::new(
            FrameRenderer::from_settings(&config.render),
            Cropper::from_settings(&config.crop),
            queue,
            state,
        )
    }

    /// Process one landmark result and return the rendered canvas.
    ///
    /// The crop is cut from the mirrored frame before any overlay is drawn, so
    /// payloads never contain the green outline or the label. A predictor fed
    /// crops that still showed the inner edge of the outline may score these
    /// slightly differently.
    pub fn on_results(
        &mut self,
        frame: &RgbImage,
        hand: Option<&HandLandmarks>,
        now: Instant,
    ) -> RgbImage {
        let mut canvas = self.renderer.draw_frame(frame);
        let (width, height) = canvas.dimensions();

        let bbox = hand.and_then(|hand| {
            BoundingBox::from_landmarks(&hand.points, width, height).map(|b| b.mirrored(width))
        });

        let mut queued = false;
        let mut skipped = false;
        let mut crop_failed = false;

        if let Some(bbox) = &bbox {
            if self.cropper.admit(now) {
                match self.cropper.crop(&canvas, bbox) {
                    Ok(image) => {
                        self.queue.enqueue(image);
                        queued = true;
                    }
                    Err(e) => {
                        warn!("Skipping crop: {:#}", e);
                        crop_failed = true;
                    }
                }
            } else {
                skipped = true;
            }

            self.renderer.draw_box(&mut canvas, bbox);
        }

        let dropped = self.queue.dropped();
        let mut state = self.state.write();
        if let (Some(bbox), Some(prediction)) = (&bbox, state.prediction()) {
            self.renderer.draw_label(&mut canvas, bbox, prediction);
        }

        let stats = &mut state.stats;
        stats.frames += 1;
        stats.hands += u64::from(bbox.is_some());
        stats.crops_queued += u64::from(queued);
        stats.crops_skipped += u64::from(skipped);
        stats.crop_failures += u64::from(crop_failed);
        stats.dropped = dropped;

        if stats.frames % 300 == 0 {
            debug!(
                "{} frames, {} with a hand, {} crops queued, {} pending",
                stats.frames,
                stats.hands,
                stats.crops_queued,
                self.queue.len()
            );
        }

        canvas
    }
}
