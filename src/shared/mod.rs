//! State and messages shared between the capture loop, the inference worker
//! and the preview window

pub mod messages;
pub mod state;

pub use messages::PreviewFrame;
pub use state::{new_shared_state, SessionState, SessionStats, SharedSessionState};
