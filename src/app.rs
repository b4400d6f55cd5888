//! Capture Session
//!
//! Owns the capture thread, the inference worker and the state they share.
//! Dropping the session stops both and releases the camera.

use anyhow::{Context, Result};
use crossbeam_channel::{Sender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::capture::SourceFactory;
use crate::config::AppConfig;
use crate::inference::{run_worker, Predictor, QueueHandle};
use crate::pipeline::FramePipeline;
use crate::shared::{new_shared_state, PreviewFrame, SharedSessionState};
use crate::vision::LandmarkSource;

/// Delay before retrying a frame that was not ready or failed to read
const RETRY_DELAY: Duration = Duration::from_millis(10);

/// A running capture → detect → crop → predict session
pub struct CaptureSession {
    state: SharedSessionState,
    queue: QueueHandle,
    cancel: CancellationToken,
    runtime: Handle,
    capture_handle: Option<JoinHandle<()>>,
    worker_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CaptureSession {
    /// Start capturing.
    ///
    /// The frame source is opened on the capture thread; if that fails the
    /// error is published in the session state and the loop never starts.
    /// Rendered canvases are offered to `preview` when one is given.
    pub fn start(
        config: &AppConfig,
        runtime: &Handle,
        source: SourceFactory,
        landmarks: Box<dyn LandmarkSource>,
        predictor: Arc<dyn Predictor>,
        preview: Option<Sender<PreviewFrame>>,
    ) -> Result<Self> {
        let state = new_shared_state();
        let queue = QueueHandle::new(config.queue.max_pending);
        let cancel = CancellationToken::new();

        let worker_handle = runtime.spawn(run_worker(
            queue.clone(),
            predictor,
            state.clone(),
            cancel.clone(),
        ));

        let pipeline = FramePipeline::from_config(config, queue.clone(), state.clone());
        let capture = CaptureLoop {
            landmarks,
            pipeline,
            state: state.clone(),
            preview,
            cancel: cancel.clone(),
        };

        let capture_handle = std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || capture.run(source))
            .context("Failed to spawn capture thread")?;

        info!("Capture session started");

        Ok(Self {
            state,
            queue,
            cancel,
            runtime: runtime.clone(),
            capture_handle: Some(capture_handle),
            worker_handle: Some(worker_handle),
        })
    }

    /// Shared session state (prediction, error, stats)
    pub fn state(&self) -> SharedSessionState {
        self.state.clone()
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    /// Whether the capture thread is still running
    pub fn is_running(&self) -> bool {
        self.capture_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the session: abort the in-flight request, discard queued crops and
    /// release the camera
    pub fn shutdown(&mut self) {
        self.cancel.cancel();

        if let Some(handle) = self.capture_handle.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }

        if let Some(worker) = self.worker_handle.take() {
            if Handle::try_current().is_ok() {
                // Cannot block inside the runtime; the worker exits on its own
                worker.abort();
            } else if let Err(e) = self.runtime.block_on(worker) {
                if !e.is_cancelled() {
                    error!("Inference worker failed: {}", e);
                }
            }
        }

        let stats = self.state.read().stats;
        info!(
            "Capture session stopped: {} frames, {} crops, {} predictions, {} failures",
            stats.frames, stats.crops_queued, stats.predictions, stats.failures
        );
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if self.capture_handle.is_some() || self.worker_handle.is_some() {
            self.shutdown();
        }
    }
}

/// State moved onto the capture thread
struct CaptureLoop {
    landmarks: Box<dyn LandmarkSource>,
    pipeline: FramePipeline,
    state: SharedSessionState,
    preview: Option<Sender<PreviewFrame>>,
    cancel: CancellationToken,
}

impl CaptureLoop {
    fn run(mut self, open_source: SourceFactory) {
        let mut source = match open_source() {
            Ok(source) => source,
            Err(e) => {
                let message = format!("Failed to access webcam: {:#}", e);
                error!("{}", message);
                self.state.write().set_error(message);
                return;
            }
        };

        let name = source.name();
        info!("Capturing from {}", name);
        {
            let mut state = self.state.write();
            state.is_capturing = true;
            state.source_name = Some(name);
        }

        let mut frame_number = 0u64;
        let mut read_failures = 0u32;

        while !self.cancel.is_cancelled() {
            let frame = match source.next_frame() {
                Ok(frame) => {
                    if read_failures > 0 {
                        info!("Frame source recovered after {} failed reads", read_failures);
                        read_failures = 0;
                    }
                    frame
                }
                Err(e) => {
                    if read_failures == 0 {
                        warn!("Failed to read frame: {:#}", e);
                    }
                    read_failures += 1;
                    std::thread::sleep(RETRY_DELAY);
                    continue;
                }
            };

            if !frame.is_ready() {
                std::thread::sleep(RETRY_DELAY);
                continue;
            }

            let hand = match self.landmarks.process(&frame.image) {
                Ok(hand) => hand,
                Err(e) => {
                    warn!("Hand detection failed: {:#}", e);
                    continue;
                }
            };

            let canvas = self
                .pipeline
                .on_results(&frame.image, hand.as_ref(), Instant::now());
            frame_number += 1;

            if let Some(tx) = &self.preview {
                match tx.try_send(PreviewFrame::new(canvas, frame.timestamp)) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Disconnected(_)) => {
                        debug!("Preview receiver closed");
                        self.preview = None;
                    }
                }
            }
        }

        self.state.write().is_capturing = false;
        drop(source);
        info!("Capture loop stopped after {} frames", frame_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedFrame, FrameSource};
    use crate::inference::{PredictError, Prediction, QueuedImage};
    use crate::vision::{HandLandmarks, Landmark};
    use async_trait::async_trait;
    use image::RgbImage;

    struct SyntheticCamera;

    impl FrameSource for SyntheticCamera {
        fn name(&self) -> String {
            "synthetic".to_string()
        }

        fn next_frame(&mut self) -> Result<CapturedFrame> {
            std::thread::sleep(Duration::from_millis(5));
            Ok(CapturedFrame::new(RgbImage::new(320, 240)))
        }
    }

    struct FixedHand;

    impl LandmarkSource for FixedHand {
        fn process(&mut self, _frame: &RgbImage) -> Result<Option<HandLandmarks>> {
            Ok(Some(HandLandmarks::new(
                vec![Landmark::new(0.4, 0.4), Landmark::new(0.6, 0.6)],
                0.9,
            )))
        }
    }

    struct LetterA;

    #[async_trait]
    impl Predictor for LetterA {
        async fn predict(&self, _image: &QueuedImage) -> Result<Prediction, PredictError> {
            Ok(Prediction::new("A", 0.93))
        }
    }

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.render.width = 320;
        config.render.height = 240;
        config.render.font_path = None;
        config.crop.size = 64;
        config
    }

    fn wait_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_session_produces_predictions() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);

        let mut session = CaptureSession::start(
            &test_config(),
            runtime.handle(),
            Box::new(|| -> Result<Box<dyn FrameSource>> { Ok(Box::new(SyntheticCamera)) }),
            Box::new(FixedHand),
            Arc::new(LetterA),
            Some(tx),
        )
        .unwrap();

        let state = session.state();
        assert!(wait_until(Duration::from_secs(5), || state
            .read()
            .prediction()
            .is_some()));

        let frame = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(frame.size(), [320, 240]);
        assert_eq!(state.read().source_name.as_deref(), Some("synthetic"));

        session.shutdown();
        assert!(!session.is_running());
        assert!(!state.read().is_capturing);
        assert!(state.read().last_error().is_none());
    }

    #[test]
    fn test_camera_failure_is_reported() {
        let runtime = tokio::runtime::Runtime::new().unwrap();

        let mut session = CaptureSession::start(
            &test_config(),
            runtime.handle(),
            Box::new(|| -> Result<Box<dyn FrameSource>> { anyhow::bail!("device busy") }),
            Box::new(FixedHand),
            Arc::new(LetterA),
            None,
        )
        .unwrap();

        let state = session.state();
        assert!(wait_until(Duration::from_secs(5), || !session.is_running()));

        let error = state.read().last_error().map(str::to_string).unwrap();
        assert!(error.starts_with("Failed to access webcam:"));
        assert!(error.contains("device busy"));
        assert!(!state.read().is_capturing);

        session.shutdown();
        assert_eq!(state.read().stats.frames, 0);
    }
}
