//! Replays a directory of still images as if it were a camera

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

use super::frame::CapturedFrame;
use super::FrameSource;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Looping image sequence paced at a fixed frame rate
pub struct ImageSequence {
    name: String,
    frames: Vec<PathBuf>,
    position: usize,
    frame_interval: Duration,
    last_frame: Option<Instant>,
}

impl ImageSequence {
    /// Collect the images of `dir`, sorted by file name
    pub fn open(dir: &Path, fps: u32) -> Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read replay directory {:?}", dir))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_image(path))
            .collect();
        frames.sort();

        if frames.is_empty() {
            bail!("No images found in {:?}", dir);
        }

        info!("Replaying {} images from {:?}", frames.len(), dir);

        Ok(Self {
            name: format!("replay:{}", dir.display()),
            frames,
            position: 0,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            last_frame: None,
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequence {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        if let Some(last) = self.last_frame {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_frame = Some(Instant::now());

        let path = &self.frames[self.position];
        self.position = (self.position + 1) % self.frames.len();

        let image = image::open(path)
            .with_context(|| format!("Failed to load replay frame {:?}", path))?
            .to_rgb8();

        Ok(CapturedFrame::new(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        let img = RgbImage::from_pixel(8, 6, Rgb([shade, shade, shade]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_replay_loops_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "b.png", 200);
        write_frame(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut seq = ImageSequence::open(dir.path(), 1000).unwrap();

        let first = seq.next_frame().unwrap();
        let second = seq.next_frame().unwrap();
        let third = seq.next_frame().unwrap();

        assert_eq!(first.image.get_pixel(0, 0)[0], 10);
        assert_eq!(second.image.get_pixel(0, 0)[0], 200);
        assert_eq!(third.image.get_pixel(0, 0)[0], 10);
        assert_eq!(first.image.dimensions(), (8, 6));
    }

    #[test]
    fn test_replay_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequence::open(dir.path(), 30).is_err());
    }
}
