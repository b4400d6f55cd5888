//! Remote Inference Layer
//!
//! Crops are sent one at a time to an HTTP prediction service that answers
//! with a letter and a confidence.

pub mod client;
pub mod queue;

use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;

pub use client::HttpPredictor;
pub use queue::{run_worker, QueueHandle};

/// Most recent answer of the predictor
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted letter
    pub label: String,
    /// Confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Confidence as a whole percentage
    pub fn percent(&self) -> u32 {
        (self.confidence * 100.0).round() as u32
    }

    /// Text drawn above the hand, e.g. `A (93%)`
    pub fn overlay_text(&self) -> String {
        format!("{} ({}%)", self.label, self.percent())
    }

    /// Status line shown in the preview window
    pub fn status_text(&self) -> String {
        format!("Predicted Letter: {} ({:.2}%)", self.label, self.confidence * 100.0)
    }
}

/// An encoded hand crop waiting to be sent
#[derive(Debug, Clone)]
pub struct QueuedImage {
    /// Crop number, in admission order
    pub seq: u64,
    /// `data:image/jpeg;base64,...`
    pub data_url: String,
    /// When the crop was taken
    pub created_at: Instant,
}

/// Reasons a prediction request failed
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("HTTP error! status: {0}")]
    Status(reqwest::StatusCode),
    #[error("{0}")]
    Remote(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("response is missing `{0}`")]
    MissingField(&'static str),
}

/// Something that turns a crop into a prediction
#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, image: &QueuedImage) -> Result<Prediction, PredictError>;
}
