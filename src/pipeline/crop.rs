//! Rate-limited hand crops, encoded as JPEG data URLs

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops, imageops::FilterType, RgbImage};
use std::time::{Duration, Instant};

use super::bbox::BoundingBox;
use crate::config::CropSettings;
use crate::inference::QueuedImage;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Cuts the hand region out of the canvas at most once per interval
pub struct Cropper {
    interval: Duration,
    last_attempt: Option<Instant>,
    output_size: u32,
    jpeg_quality: u8,
    next_seq: u64,
}

impl Cropper {
    pub fn new(interval: Duration, output_size: u32, jpeg_quality: u8) -> Self {
        Self {
            interval,
            last_attempt: None,
            output_size: output_size.max(1),
            jpeg_quality: jpeg_quality.clamp(1, 100),
            next_seq: 0,
        }
    }

    pub fn from_settings(settings: &CropSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.interval_ms),
            settings.size,
            settings.jpeg_quality,
        )
    }

    /// Whether a crop may be taken at `now`. Admission restarts the interval.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_attempt = Some(now);
        true
    }

    /// Crop `bbox` out of `canvas`, scale it to the output size and encode it
    pub fn crop(&mut self, canvas: &RgbImage, bbox: &BoundingBox) -> Result<QueuedImage> {
        let (width, height) = canvas.dimensions();
        if bbox.width == 0 || bbox.height == 0 || bbox.right() > width || bbox.bottom() > height {
            anyhow::bail!(
                "Crop region {:?} does not fit a {}x{} canvas",
                bbox,
                width,
                height
            );
        }

        let region = imageops::crop_imm(canvas, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
        let scaled = imageops::resize(
            &region,
            self.output_size,
            self.output_size,
            FilterType::Triangle,
        );

        let data_url = encode_data_url(&scaled, self.jpeg_quality)?;
        let seq = self.next_seq;
        self.next_seq += 1;

        Ok(QueuedImage {
            seq,
            data_url,
            created_at: Instant::now(),
        })
    }
}

/// Encode an image as `data:image/jpeg;base64,...`
pub fn encode_data_url(image: &RgbImage, quality: u8) -> Result<String> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode_image(image)
        .context("Failed to encode crop as JPEG")?;

    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    url.push_str(DATA_URL_PREFIX);
    STANDARD.encode_string(&jpeg, &mut url);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn decode(url: &str) -> RgbImage {
        let payload = url.strip_prefix(DATA_URL_PREFIX).expect("data URL prefix");
        let bytes = STANDARD.decode(payload).unwrap();
        image::load_from_memory(&bytes).unwrap().to_rgb8()
    }

    #[test]
    fn test_admit_respects_interval() {
        let mut cropper = Cropper::new(Duration::from_millis(50), 800, 92);
        let start = Instant::now();

        assert!(cropper.admit(start));
        assert!(!cropper.admit(start + Duration::from_millis(10)));
        assert!(!cropper.admit(start + Duration::from_millis(49)));
        assert!(cropper.admit(start + Duration::from_millis(50)));
        assert!(!cropper.admit(start + Duration::from_millis(60)));
        assert!(cropper.admit(start + Duration::from_millis(120)));
    }

    #[test]
    fn test_thirty_fps_admits_every_other_frame() {
        let mut cropper = Cropper::new(Duration::from_millis(50), 800, 92);
        let start = Instant::now();
        let admitted = (0..30)
            .filter(|i| cropper.admit(start + Duration::from_micros(33_334 * i)))
            .count();
        assert_eq!(admitted, 15);
    }

    #[test]
    fn test_crop_is_square_jpeg_data_url() {
        let mut canvas = RgbImage::from_pixel(1280, 720, Rgb([0, 0, 0]));
        for y in 206..513 {
            for x in 486..793 {
                canvas.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }

        let mut cropper = Cropper::new(Duration::from_millis(50), 800, 92);
        let image = cropper
            .crop(&canvas, &BoundingBox::new(486, 206, 307, 307))
            .unwrap();

        assert!(image.data_url.starts_with("data:image/jpeg;base64,"));
        let decoded = decode(&image.data_url);
        assert_eq!(decoded.dimensions(), (800, 800));
        // Whole crop lies inside the bright patch
        assert!(decoded.get_pixel(400, 400)[0] > 200);
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let canvas = RgbImage::new(64, 64);
        let bbox = BoundingBox::new(0, 0, 32, 32);
        let mut cropper = Cropper::new(Duration::ZERO, 16, 80);

        let first = cropper.crop(&canvas, &bbox).unwrap();
        let second = cropper.crop(&canvas, &bbox).unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
    }

    #[test]
    fn test_crop_outside_canvas_fails() {
        let canvas = RgbImage::new(64, 64);
        let mut cropper = Cropper::new(Duration::ZERO, 16, 80);
        assert!(cropper
            .crop(&canvas, &BoundingBox::new(40, 40, 32, 32))
            .is_err());
        assert!(cropper.crop(&canvas, &BoundingBox::new(0, 0, 0, 0)).is_err());
    }
}
