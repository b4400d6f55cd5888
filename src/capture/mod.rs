//! Camera Capture Layer
//!
//! Frame sources feeding the capture loop: a native webcam via `nokhwa`, or a
//! directory of still images replayed as a camera.

pub mod frame;
pub mod replay;
pub mod webcam;

use anyhow::Result;

use crate::config::CameraSettings;
pub use frame::CapturedFrame;

pub use replay::ImageSequence;
pub use webcam::{list_cameras, Webcam};

/// Camera capture configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Camera device index
    pub index: u32,
    /// Preferred frame width
    pub width: u32,
    /// Preferred frame height
    pub height: u32,
    /// Preferred frames per second
    pub fps: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&CameraSettings::default())
    }
}

impl From<&CameraSettings> for CaptureConfig {
    fn from(settings: &CameraSettings) -> Self {
        Self {
            index: settings.index,
            width: settings.width,
            height: settings.height,
            fps: settings.fps,
        }
    }
}

/// A stream of frames owned by the capture loop.
///
/// Implementations release the underlying device when dropped.
pub trait FrameSource {
    /// Human readable name of the source
    fn name(&self) -> String;

    /// Block until the next frame is available
    fn next_frame(&mut self) -> Result<CapturedFrame>;
}

/// Opens a frame source on the capture thread.
///
/// Camera handles are not `Send` on every platform, so the session ships this
/// factory to the capture thread instead of an opened source.
pub type SourceFactory = Box<dyn FnOnce() -> Result<Box<dyn FrameSource>> + Send>;

/// Factory opening the configured webcam
pub fn webcam_factory(config: CaptureConfig) -> SourceFactory {
    Box::new(move || {
        let webcam = Webcam::open(&config)?;
        Ok(Box::new(webcam) as Box<dyn FrameSource>)
    })
}

/// Factory replaying the images of a directory
pub fn replay_factory(dir: std::path::PathBuf, fps: u32) -> SourceFactory {
    Box::new(move || {
        let sequence = ImageSequence::open(&dir, fps)?;
        Ok(Box::new(sequence) as Box<dyn FrameSource>)
    })
}
