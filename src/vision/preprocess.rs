//! Image preprocessing for the hand landmark model
//!
//! Handles region extraction, resizing and tensor conversion, and maps model
//! coordinates back into normalized frame coordinates.

use image::{imageops, imageops::FilterType, Rgb, RgbImage};
use ndarray::Array4;

use super::Landmark;

/// Square region of a frame in pixel coordinates.
///
/// The region may extend past the frame edges; the outside is padded black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareRoi {
    pub x: f32,
    pub y: f32,
    pub side: f32,
}

impl SquareRoi {
    /// Smallest square centered on the frame that contains all of it
    pub fn full_frame(width: u32, height: u32) -> Self {
        let side = width.max(height) as f32;
        Self {
            x: (width as f32 - side) / 2.0,
            y: (height as f32 - side) / 2.0,
            side,
        }
    }

    /// Square around normalized landmarks, grown by `scale`
    pub fn around(points: &[Landmark], width: u32, height: u32, scale: f32) -> Option<Self> {
        if points.is_empty() {
            return None;
        }

        let (w, h) = (width as f32, height as f32);
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x * w);
            min_y = min_y.min(p.y * h);
            max_x = max_x.max(p.x * w);
            max_y = max_y.max(p.y * h);
        }

        let side = ((max_x - min_x).max(max_y - min_y) * scale).max(1.0);
        let cx = (min_x + max_x) / 2.0;
        let cy = (min_y + max_y) / 2.0;

        Some(Self {
            x: cx - side / 2.0,
            y: cy - side / 2.0,
            side,
        })
    }

    /// Map a point in model input space (0..input_size) to normalized frame coordinates
    pub fn to_frame(&self, px: f32, py: f32, input_size: u32, width: u32, height: u32) -> (f32, f32) {
        let scale = self.side / input_size as f32;
        let fx = self.x + px * scale;
        let fy = self.y + py * scale;
        (fx / width as f32, fy / height as f32)
    }
}

/// Extract `roi` from `frame` into a `size`x`size` image, padding outside pixels black
pub fn extract_roi(frame: &RgbImage, roi: &SquareRoi, size: u32) -> RgbImage {
    let mut out = RgbImage::from_pixel(size, size, Rgb([0, 0, 0]));
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 || roi.side <= 0.0 {
        return out;
    }

    // Visible part of the region, in frame pixels
    let left = roi.x.max(0.0).floor() as u32;
    let top = roi.y.max(0.0).floor() as u32;
    let right = ((roi.x + roi.side).min(fw as f32).ceil() as u32).min(fw);
    let bottom = ((roi.y + roi.side).min(fh as f32).ceil() as u32).min(fh);
    if right <= left || bottom <= top {
        return out;
    }

    let scale = size as f32 / roi.side;
    let dst_w = (((right - left) as f32) * scale).round().max(1.0) as u32;
    let dst_h = (((bottom - top) as f32) * scale).round().max(1.0) as u32;

    let visible = imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image();
    let resized = imageops::resize(&visible, dst_w.min(size), dst_h.min(size), FilterType::Triangle);

    let offset_x = ((left as f32 - roi.x) * scale).round() as i64;
    let offset_y = ((top as f32 - roi.y) * scale).round() as i64;
    imageops::overlay(&mut out, &resized, offset_x, offset_y);

    out
}

/// Convert an RGB image to an NCHW tensor (batch size 1) scaled to 0-1
pub fn to_nchw_tensor(image: &RgbImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame_roi_is_centered_square() {
        let roi = SquareRoi::full_frame(1280, 720);
        assert_eq!(roi.side, 1280.0);
        assert_eq!(roi.x, 0.0);
        assert_eq!(roi.y, -280.0);
    }

    #[test]
    fn test_roi_to_frame_roundtrip_center() {
        let roi = SquareRoi::full_frame(1280, 720);
        let (nx, ny) = roi.to_frame(112.0, 112.0, 224, 1280, 720);
        assert!((nx - 0.5).abs() < 1e-4);
        assert!((ny - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_around_grows_region() {
        let points = [Landmark::new(0.4, 0.4), Landmark::new(0.6, 0.6)];
        let roi = SquareRoi::around(&points, 1000, 1000, 2.0).unwrap();
        assert!((roi.side - 400.0).abs() < 1e-3);
        assert!((roi.x - 300.0).abs() < 1e-3);
        assert!((roi.y - 300.0).abs() < 1e-3);
        assert!(SquareRoi::around(&[], 1000, 1000, 2.0).is_none());
    }

    #[test]
    fn test_extract_roi_pads_outside_black() {
        let frame = RgbImage::from_pixel(40, 20, Rgb([255, 255, 255]));
        let roi = SquareRoi::full_frame(40, 20);
        let out = extract_roi(&frame, &roi, 40);

        assert_eq!(out.dimensions(), (40, 40));
        // Top band is padding, middle band is the frame
        assert_eq!(out.get_pixel(20, 2), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(20, 20), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(20, 37), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_nchw_tensor_layout() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([255, 0, 51]));

        let tensor = to_nchw_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 3, 1, 2]);
        assert_eq!(tensor[[0, 0, 0, 1]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 1]], 0.0);
        assert!((tensor[[0, 2, 0, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }
}
