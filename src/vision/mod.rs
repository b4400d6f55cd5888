//! Hand Landmark Layer
//!
//! Turns camera frames into 21 normalized hand landmarks. The pipeline only
//! depends on the [`LandmarkSource`] trait; [`HandLandmarker`] is the ONNX
//! Runtime implementation backed by the MediaPipe hand landmark network.

pub mod hand_landmarks;
pub mod models;
pub mod preprocess;

use anyhow::Result;
use image::RgbImage;

use crate::config::LandmarkSettings;

pub use hand_landmarks::HandLandmarker;

/// Number of landmarks produced per hand
pub const NUM_HAND_LANDMARKS: usize = 21;

/// A single hand keypoint in normalized image coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    /// X coordinate (0.0 to 1.0, normalized to image width)
    pub x: f32,
    /// Y coordinate (0.0 to 1.0, normalized to image height)
    pub y: f32,
    /// Relative depth, unused by the pipeline
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Landmarks of one detected hand
#[derive(Debug, Clone)]
pub struct HandLandmarks {
    /// All 21 landmarks in MediaPipe order (wrist first)
    pub points: Vec<Landmark>,
    /// Hand presence score (0.0 - 1.0)
    pub confidence: f32,
}

impl HandLandmarks {
    pub fn new(points: Vec<Landmark>, confidence: f32) -> Self {
        Self { points, confidence }
    }
}

/// Landmark model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelComplexity {
    Lite,
    Full,
}

impl ModelComplexity {
    /// Map the numeric setting (0 = lite, anything else = full)
    pub fn from_level(level: u32) -> Self {
        if level == 0 {
            ModelComplexity::Lite
        } else {
            ModelComplexity::Full
        }
    }
}

/// Detector options
#[derive(Debug, Clone)]
pub struct LandmarkOptions {
    /// Maximum number of hands reported per frame
    pub max_hands: u32,
    /// Which landmark network to run
    pub complexity: ModelComplexity,
    /// Presence threshold for a fresh detection
    pub min_detection_confidence: f32,
    /// Presence threshold for keeping the tracked hand
    pub min_tracking_confidence: f32,
}

impl Default for LandmarkOptions {
    fn default() -> Self {
        Self::from(&LandmarkSettings::default())
    }
}

impl From<&LandmarkSettings> for LandmarkOptions {
    fn from(settings: &LandmarkSettings) -> Self {
        Self {
            max_hands: settings.max_hands,
            complexity: ModelComplexity::from_level(settings.model_complexity),
            min_detection_confidence: settings.min_detection_confidence,
            min_tracking_confidence: settings.min_tracking_confidence,
        }
    }
}

/// Produces at most one hand per processed frame.
///
/// Called once per submitted frame, in submission order. An error is a
/// per-frame failure: the capture loop logs it and carries on with the next
/// frame.
pub trait LandmarkSource: Send {
    fn process(&mut self, frame: &RgbImage) -> Result<Option<HandLandmarks>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_complexity_levels() {
        assert_eq!(ModelComplexity::from_level(0), ModelComplexity::Lite);
        assert_eq!(ModelComplexity::from_level(1), ModelComplexity::Full);
        assert_eq!(ModelComplexity::from_level(2), ModelComplexity::Full);
    }

    #[test]
    fn test_default_options() {
        let options = LandmarkOptions::default();
        assert_eq!(options.max_hands, 1);
        assert_eq!(options.complexity, ModelComplexity::Full);
        assert!((options.min_detection_confidence - 0.7).abs() < 0.001);
        assert!((options.min_tracking_confidence - 0.7).abs() < 0.001);
    }
}
