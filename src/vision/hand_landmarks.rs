//! Hand landmark detection with the MediaPipe hand landmark network
//!
//! The network takes a 224x224 RGB crop and returns 21 landmarks in input pixel
//! space plus a hand presence score. A fresh detection runs on the whole frame;
//! once a hand is found, the next frame only looks at a square around it until
//! the presence score drops below the tracking threshold.
//!
//! There is no palm detector stage: a fresh detection squeezes the whole frame,
//! padded to a square, into the 224x224 input. The network is trained on hand
//! regions, so a hand that fills only a small part of a wide frame often scores
//! below `min_detection_confidence` until it is brought closer to the camera.
//! Once acquired, tracking works on a hand-sized region and holds much better.

use anyhow::{bail, Context, Result};
use image::RgbImage;
use ort::value::Tensor;
use std::path::Path;
use tracing::{debug, info, warn};

use super::models::{ModelManager, ModelType, OnnxSession};
use super::preprocess::{extract_roi, to_nchw_tensor, SquareRoi};
use super::{HandLandmarks, Landmark, LandmarkOptions, LandmarkSource, NUM_HAND_LANDMARKS};
use crate::config::LandmarkSettings;

/// Side of the square network input
const INPUT_SIZE: u32 = 224;

/// How much larger than the hand the tracking region is
const TRACKING_ROI_SCALE: f32 = 2.0;

/// ONNX Runtime hand landmark detector
pub struct HandLandmarker {
    model: OnnxSession,
    tracker: HandTracker,
}

impl HandLandmarker {
    /// Load the detector from an ONNX model file
    pub fn new(model_path: &Path, options: LandmarkOptions) -> Result<Self> {
        if options.max_hands > 1 {
            warn!(
                "max_hands = {} requested, but only a single hand is tracked",
                options.max_hands
            );
        }

        let model = OnnxSession::new(model_path)?;
        if model.output_names().len() < 2 {
            bail!(
                "Unexpected hand landmark model outputs: {:?}",
                model.output_names()
            );
        }

        info!(
            "Hand landmarker ready ({:?}, detection >= {:.2}, tracking >= {:.2})",
            options.complexity, options.min_detection_confidence, options.min_tracking_confidence
        );

        Ok(Self {
            model,
            tracker: HandTracker::new(options),
        })
    }

    /// Resolve the model for the configured complexity and load it
    pub fn from_settings(settings: &LandmarkSettings) -> Result<Self> {
        let options = LandmarkOptions::from(settings);
        let manager = match &settings.model_dir {
            Some(dir) => ModelManager::with_dir(dir.clone())?,
            None => ModelManager::new()?,
        };

        let path = manager.ensure_model(
            ModelType::for_complexity(options.complexity),
            settings.model_url.as_deref(),
            settings.model_sha256.as_deref(),
        )?;

        Self::new(&path, options)
    }
}

impl LandmarkSource for HandLandmarker {
    fn process(&mut self, frame: &RgbImage) -> Result<Option<HandLandmarks>> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Ok(None);
        }

        let model = &mut self.model;
        self.tracker.step(width, height, |roi| run_network(model, frame, roi))
    }
}

/// Run the network on one region, returning (presence, landmarks)
fn run_network(
    model: &mut OnnxSession,
    frame: &RgbImage,
    roi: SquareRoi,
) -> Result<(f32, Vec<Landmark>)> {
    let (width, height) = frame.dimensions();

    let input = extract_roi(frame, &roi, INPUT_SIZE);
    let (data, _) = to_nchw_tensor(&input).into_raw_vec_and_offset();
    let side = INPUT_SIZE as i64;
    let tensor = Tensor::from_array((vec![1, 3, side, side], data))?;

    let outputs = model
        .session_mut()
        .run(ort::inputs![tensor])
        .context("Hand landmark inference failed")?;

    let (_, screen) = outputs[0].try_extract_tensor::<f32>()?;
    let (_, presence) = outputs[1].try_extract_tensor::<f32>()?;

    if screen.len() < NUM_HAND_LANDMARKS * 3 || presence.is_empty() {
        bail!(
            "Unexpected landmark output sizes: {} coordinates, {} scores",
            screen.len(),
            presence.len()
        );
    }

    let points = screen
        .chunks_exact(3)
        .take(NUM_HAND_LANDMARKS)
        .map(|c| {
            let (x, y) = roi.to_frame(c[0], c[1], INPUT_SIZE, width, height);
            Landmark {
                x,
                y,
                z: c[2] / INPUT_SIZE as f32,
            }
        })
        .collect();

    Ok((presence[0], points))
}

/// Track-then-redetect gating around the landmark network.
///
/// The tracked region is kept while its presence score stays at or above
/// `min_tracking_confidence`. Otherwise the track is dropped and the whole
/// frame is searched, which must reach `min_detection_confidence`.
struct HandTracker {
    options: LandmarkOptions,
    tracked: Option<SquareRoi>,
}

impl HandTracker {
    fn new(options: LandmarkOptions) -> Self {
        Self {
            options,
            tracked: None,
        }
    }

    fn step<F>(&mut self, width: u32, height: u32, mut run: F) -> Result<Option<HandLandmarks>>
    where
        F: FnMut(SquareRoi) -> Result<(f32, Vec<Landmark>)>,
    {
        if let Some(roi) = self.tracked.take() {
            let (presence, points) = run(roi)?;
            if presence >= self.options.min_tracking_confidence {
                return Ok(Some(self.accept(width, height, presence, points)));
            }
            debug!("Lost hand track (presence {:.2})", presence);
        }

        let (presence, points) = run(SquareRoi::full_frame(width, height))?;
        if presence >= self.options.min_detection_confidence {
            debug!("Hand detected (presence {:.2})", presence);
            Ok(Some(self.accept(width, height, presence, points)))
        } else {
            Ok(None)
        }
    }

    fn accept(
        &mut self,
        width: u32,
        height: u32,
        presence: f32,
        points: Vec<Landmark>,
    ) -> HandLandmarks {
        self.tracked = SquareRoi::around(&points, width, height, TRACKING_ROI_SCALE);
        HandLandmarks::new(points, presence)
    }
}
