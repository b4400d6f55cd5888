//! Messages sent from the capture loop to the preview window

use image::RgbImage;
use std::time::Instant;

/// A rendered canvas ready for display
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Mirrored frame with overlays drawn
    pub image: RgbImage,
    /// When the source produced the frame
    pub captured_at: Instant,
}

impl PreviewFrame {
    pub fn new(image: RgbImage, captured_at: Instant) -> Self {
        Self { image, captured_at }
    }

    /// Pixels as RGBA, the layout the preview texture expects
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity((self.image.width() * self.image.height() * 4) as usize);
        for pixel in self.image.pixels() {
            rgba.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
        }
        rgba
    }

    pub fn size(&self) -> [usize; 2] {
        [self.image.width() as usize, self.image.height() as usize]
    }
}
