//! Sequential inference queue
//!
//! Crops are sent to the predictor strictly in arrival order with at most one
//! request in flight. [`InferenceQueue`] is the Idle/Sending state machine;
//! [`run_worker`] is the single drain loop that owns the sending side.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Predictor, QueuedImage};
use crate::shared::SharedSessionState;

/// Pending crops at which a backlog warning is logged
const BACKLOG_WARNING: usize = 32;

/// Processing flag of the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueState {
    /// No request outstanding
    #[default]
    Idle,
    /// One request outstanding
    Sending,
}

/// FIFO of crops waiting for the predictor
#[derive(Debug, Default)]
pub struct InferenceQueue {
    pending: VecDeque<QueuedImage>,
    state: QueueState,
    max_pending: Option<usize>,
    dropped: u64,
}

impl InferenceQueue {
    /// Create a queue; `max_pending` bounds the backlog by dropping the oldest crops
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            max_pending,
            ..Default::default()
        }
    }

    /// Append a crop. Returns true when the queue is idle and the drain loop must be woken.
    pub fn enqueue(&mut self, image: QueuedImage) -> bool {
        if let Some(max) = self.max_pending {
            while self.pending.len() >= max.max(1) {
                self.pending.pop_front();
                self.dropped += 1;
            }
        }
        self.pending.push_back(image);
        self.state == QueueState::Idle
    }

    /// Pop the head and enter `Sending`, or go `Idle` when there is nothing to send
    pub fn begin_dispatch(&mut self) -> Option<QueuedImage> {
        debug_assert_eq!(self.state, QueueState::Idle, "dispatch while a request is in flight");
        match self.pending.pop_front() {
            Some(image) => {
                self.state = QueueState::Sending;
                Some(image)
            }
            None => {
                self.state = QueueState::Idle;
                None
            }
        }
    }

    /// Leave `Sending`. Returns true if more crops are waiting.
    pub fn finish_dispatch(&mut self) -> bool {
        self.state = QueueState::Idle;
        !self.pending.is_empty()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn is_processing(&self) -> bool {
        self.state == QueueState::Sending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Crops discarded because the backlog was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Discard all pending crops, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}

/// Shared handle to the queue and its wake-up signal
#[derive(Clone)]
pub struct QueueHandle {
    queue: Arc<Mutex<InferenceQueue>>,
    wake: Arc<Notify>,
}

impl QueueHandle {
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(InferenceQueue::new(max_pending))),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Queue a crop and wake the drain loop if it is idle
    pub fn enqueue(&self, image: QueuedImage) {
        let seq = image.seq;
        let (wake, len) = {
            let mut queue = self.queue.lock();
            (queue.enqueue(image), queue.len())
        };

        debug!("Queued crop #{} ({} pending)", seq, len);
        if len == BACKLOG_WARNING {
            warn!(
                "Inference queue is backing up ({} crops pending); the predictor is slower than the crop rate",
                len
            );
        }

        if wake {
            self.wake.notify_one();
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn is_processing(&self) -> bool {
        self.queue.lock().is_processing()
    }

    pub fn dropped(&self) -> u64 {
        self.queue.lock().dropped()
    }

    pub fn clear(&self) -> usize {
        self.queue.lock().clear()
    }

    #[cfg(test)]
    pub(crate) fn take_pending(&self) -> Vec<QueuedImage> {
        self.queue.lock().pending.drain(..).collect()
    }

    fn begin_dispatch(&self) -> Option<(QueuedImage, InFlight)> {
        let image = self.queue.lock().begin_dispatch()?;
        Some((
            image,
            InFlight {
                queue: self.queue.clone(),
            },
        ))
    }
}

/// Clears the processing flag when the request ends, however it ends
struct InFlight {
    queue: Arc<Mutex<InferenceQueue>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.queue.lock().finish_dispatch();
    }
}

/// Drain the queue against `predictor` until `cancel` fires.
///
/// Successful predictions replace the cached prediction and clear the error;
/// failures publish the error and clear the prediction, and the next crop is
/// still sent. Cancelling aborts the in-flight request without reporting an
/// error and discards the crops that were never sent.
pub async fn run_worker(
    queue: QueueHandle,
    predictor: Arc<dyn Predictor>,
    state: SharedSessionState,
    cancel: CancellationToken,
) {
    info!("Inference worker started");

    loop {
        let (image, in_flight) = match queue.begin_dispatch() {
            Some(next) => next,
            None => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = queue.wake.notified() => {}
                }
                continue;
            }
        };

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Aborting in-flight request for crop #{}", image.seq);
                break;
            }
            result = predictor.predict(&image) => result,
        };

        match result {
            Ok(prediction) => {
                info!(
                    "Crop #{}: {} in {:?} ({:?} after capture)",
                    image.seq,
                    prediction.overlay_text(),
                    started.elapsed(),
                    image.created_at.elapsed()
                );
                state.write().record_prediction(prediction);
            }
            Err(e) => {
                warn!("Error sending crop #{} to predictor: {}", image.seq, e);
                state.write().record_failure(e.to_string());
            }
        }

        drop(in_flight);
    }

    let discarded = queue.clear();
    if discarded > 0 {
        debug!("Discarded {} unsent crops", discarded);
    }
    info!("Inference worker stopped");
}
