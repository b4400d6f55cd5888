//! Native webcam source using `nokhwa`

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution,
    },
    Camera,
};
use tracing::{info, warn};

use super::frame::CapturedFrame;
use super::{CaptureConfig, FrameSource};

/// Available camera device
#[derive(Debug, Clone)]
pub struct CameraDevice {
    pub index: String,
    pub name: String,
    pub description: String,
}

/// Enumerate cameras known to the native backend
pub fn list_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = nokhwa::query(ApiBackend::Auto)
        .map_err(|e| anyhow!(e))
        .context("Failed to query cameras")?;

    Ok(cameras
        .into_iter()
        .map(|cam| CameraDevice {
            index: cam.index().to_string(),
            name: cam.human_name(),
            description: cam.description().to_string(),
        })
        .collect())
}

/// An open webcam stream.
///
/// The stream is stopped when the webcam is dropped, so the device is released
/// as soon as the capture loop ends.
pub struct Webcam {
    camera: Camera,
}

impl Webcam {
    /// Open the camera at the closest format to the preferred resolution and frame rate
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        let preferred = CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(preferred));

        let mut camera = Camera::new(CameraIndex::Index(config.index), requested)
            .map_err(|e| anyhow!(e))
            .context("Failed to create camera instance")?;

        camera
            .open_stream()
            .map_err(|e| anyhow!(e))
            .context("Failed to open camera stream")?;

        let resolution = camera.resolution();
        info!(
            "Opened camera '{}' at {}x{} @ {} fps (requested {}x{} @ {})",
            camera.info().human_name(),
            resolution.width(),
            resolution.height(),
            camera.frame_rate(),
            config.width,
            config.height,
            config.fps
        );

        Ok(Self { camera })
    }
}

impl FrameSource for Webcam {
    fn name(&self) -> String {
        self.camera.info().human_name()
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| anyhow!(e))
            .context("Failed to get frame")?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| anyhow!(e))
            .context("Failed to decode frame")?;

        let (width, height) = (decoded.width(), decoded.height());
        let image = RgbImage::from_raw(width, height, decoded.into_raw())
            .context("Decoded frame has an unexpected buffer size")?;

        Ok(CapturedFrame::new(image))
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        match self.camera.stop_stream() {
            Ok(()) => info!("Camera stream released"),
            Err(e) => warn!("Failed to stop camera stream: {}", e),
        }
    }
}
