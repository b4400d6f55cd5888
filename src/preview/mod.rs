//! Preview window
//!
//! Shows the rendered canvas with the current prediction or error below it.

pub mod app;

use crossbeam_channel::Receiver;

use crate::inference::QueueHandle;
use crate::shared::{PreviewFrame, SharedSessionState};

pub use app::PreviewApp;

/// Run the preview window until it is closed
pub fn run_preview(
    frames: Receiver<PreviewFrame>,
    state: SharedSessionState,
    queue: QueueHandle,
) -> Result<(), eframe::Error> {
    let app = PreviewApp::new(frames, state, queue);
    eframe::run_native(
        "SignLens",
        PreviewApp::options(),
        Box::new(|_cc| Ok(Box::new(app))),
    )
}
