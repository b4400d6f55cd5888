//! HTTP client for the letter prediction service
//!
//! `POST {url}` with `{"image": "<data URL>"}`. The service answers
//! `{"predicted_letter": "A", "confidence": 0.93}` or `{"error": "..."}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{PredictError, Prediction, Predictor, QueuedImage};
use crate::config::PredictorSettings;

#[derive(Serialize)]
struct PredictRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    predicted_letter: Option<String>,
    confidence: Option<f32>,
    error: Option<String>,
}

/// Interpret a predictor response.
///
/// Any non-2xx status or a non-empty `error` string is a failure. An empty
/// `error` is ignored. A non-string `error` fails to decode.
pub fn parse_response(status: StatusCode, body: &[u8]) -> Result<Prediction, PredictError> {
    if !status.is_success() {
        return Err(PredictError::Status(status));
    }

    let response: PredictResponse = serde_json::from_slice(body)?;
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(PredictError::Remote(error));
    }

    let label = response
        .predicted_letter
        .ok_or(PredictError::MissingField("predicted_letter"))?;
    let confidence = response
        .confidence
        .ok_or(PredictError::MissingField("confidence"))?;

    Ok(Prediction::new(label, confidence))
}

/// Predictor backed by the remote HTTP endpoint
pub struct HttpPredictor {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictor {
    /// Create a predictor for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_settings(settings: &PredictorSettings) -> Result<Self> {
        Self::new(
            settings.url.clone(),
            Duration::from_secs(settings.timeout_secs.max(1)),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, image: &QueuedImage) -> Result<Prediction, PredictError> {
        debug!(
            "Sending crop #{} ({} bytes) to {}",
            image.seq,
            image.data_url.len(),
            self.url
        );

        let response = self
            .client
            .post(&self.url)
            .json(&PredictRequest {
                image: &image.data_url,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        parse_response(status, &body)
    }
}
