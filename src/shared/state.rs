//! Session state shared between the capture loop, the inference worker and the preview

use parking_lot::RwLock;
use std::sync::Arc;

use crate::inference::Prediction;

/// State of one capture session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Latest prediction; cleared whenever a request fails
    prediction: Option<Prediction>,
    /// Last user-visible error; cleared by the next successful prediction
    last_error: Option<String>,
    /// Whether the capture loop is running
    pub is_capturing: bool,
    /// Name of the active frame source
    pub source_name: Option<String>,
    /// Running counters
    pub stats: SessionStats,
}

/// Counters collected over a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames rendered to the canvas
    pub frames: u64,
    /// Frames in which a hand was found
    pub hands: u64,
    /// Crops queued for prediction
    pub crops_queued: u64,
    /// Hand frames skipped by the crop interval
    pub crops_skipped: u64,
    /// Admitted crops that could not be encoded
    pub crop_failures: u64,
    /// Crops dropped because the queue was full
    pub dropped: u64,
    /// Successful predictions
    pub predictions: u64,
    /// Failed prediction requests
    pub failures: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest prediction, if the last request succeeded
    pub fn prediction(&self) -> Option<&Prediction> {
        self.prediction.as_ref()
    }

    /// Last error message (if any)
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Publish a successful prediction and clear any error
    pub fn record_prediction(&mut self, prediction: Prediction) {
        self.prediction = Some(prediction);
        self.last_error = None;
        self.stats.predictions += 1;
    }

    /// Publish a failed request: the cached prediction is dropped
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.prediction = None;
        self.last_error = Some(error.into());
        self.stats.failures += 1;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    /// Completed requests, successful or not
    pub fn completed_requests(&self) -> u64 {
        self.stats.predictions + self.stats.failures
    }
}

/// Session state handle shared across threads
pub type SharedSessionState = Arc<RwLock<SessionState>>;

/// Create a fresh shared session state
pub fn new_shared_state() -> SharedSessionState {
    Arc::new(RwLock::new(SessionState::new()))
}
