//! Application Configuration
//!
//! Capture, landmark, rendering and predictor settings stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default endpoint of the letter prediction service
pub const DEFAULT_PREDICTOR_URL: &str = "http://localhost:8081/predict";

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera settings
    pub camera: CameraSettings,
    /// Hand landmark detector settings
    pub landmarks: LandmarkSettings,
    /// Render canvas settings
    pub render: RenderSettings,
    /// Hand crop settings
    pub crop: CropSettings,
    /// Remote predictor settings
    pub predictor: PredictorSettings,
    /// Inference queue settings
    pub queue: QueueSettings,
}

/// Camera-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Camera device index
    pub index: u32,
    /// Preferred capture width
    pub width: u32,
    /// Preferred capture height
    pub height: u32,
    /// Preferred frame rate
    pub fps: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            index: 0,
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }
}

/// Hand landmark detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkSettings {
    /// Maximum number of hands to track (only 1 is supported)
    pub max_hands: u32,
    /// 0 = lite model, 1 = full model
    pub model_complexity: u32,
    /// Minimum presence score to accept a fresh detection
    pub min_detection_confidence: f32,
    /// Minimum presence score to keep tracking the previous hand
    pub min_tracking_confidence: f32,
    /// Directory holding the ONNX models (defaults to the data directory)
    pub model_dir: Option<PathBuf>,
    /// URL to fetch the model from when it is missing
    pub model_url: Option<String>,
    /// Expected SHA256 of the downloaded model
    pub model_sha256: Option<String>,
}

impl Default for LandmarkSettings {
    fn default() -> Self {
        Self {
            max_hands: 1,
            model_complexity: 1,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.7,
            model_dir: None,
            model_url: None,
            model_sha256: None,
        }
    }
}

/// Render canvas settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// TrueType font used for the prediction label
    pub font_path: Option<PathBuf>,
    /// Label height in pixels
    pub label_size: f32,
    /// Bounding box outline width in pixels
    pub line_width: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            font_path: None,
            label_size: 48.0,
            line_width: 2,
        }
    }
}

/// Hand crop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CropSettings {
    /// Minimum time between two crop attempts
    pub interval_ms: u64,
    /// Side of the square crop sent to the predictor
    pub size: u32,
    /// JPEG quality (1 - 100)
    pub jpeg_quality: u8,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            size: 800,
            jpeg_quality: 92,
        }
    }
}

/// Remote predictor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorSettings {
    /// Prediction endpoint
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_PREDICTOR_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

/// Inference queue settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Maximum number of pending crops; the oldest are dropped beyond it.
    /// Unbounded when unset.
    pub max_pending: Option<usize>,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.camera.index, 0);
        assert_eq!(config.camera.width, 1920);
        assert_eq!(config.camera.height, 1080);
        assert_eq!(config.camera.fps, 30);

        assert_eq!(config.landmarks.max_hands, 1);
        assert_eq!(config.landmarks.model_complexity, 1);
        assert!((config.landmarks.min_detection_confidence - 0.7).abs() < 0.001);
        assert!((config.landmarks.min_tracking_confidence - 0.7).abs() < 0.001);

        assert_eq!(config.render.width, 1280);
        assert_eq!(config.render.height, 720);
        assert_eq!(config.render.line_width, 2);

        assert_eq!(config.crop.interval_ms, 50);
        assert_eq!(config.crop.size, 800);

        assert_eq!(config.predictor.url, DEFAULT_PREDICTOR_URL);
        assert!(config.queue.max_pending.is_none());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.camera.width, parsed.camera.width);
        assert_eq!(config.crop.interval_ms, parsed.crop.interval_ms);
        assert_eq!(config.predictor.url, parsed.predictor.url);
        assert_eq!(config.queue.max_pending, parsed.queue.max_pending);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [predictor]
            url = "http://10.0.0.5:9000/predict"

            [queue]
            max_pending = 4
        "#;

        let parsed: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(parsed.predictor.url, "http://10.0.0.5:9000/predict");
        assert_eq!(parsed.predictor.timeout_secs, 10);
        assert_eq!(parsed.queue.max_pending, Some(4));
        assert_eq!(parsed.crop.size, 800);
        assert_eq!(parsed.render.width, 1280);
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.camera.index = 2;
        config.render.font_path = Some(PathBuf::from("/tmp/font.ttf"));

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.camera.index, 2);
        assert_eq!(loaded.render.font_path, Some(PathBuf::from("/tmp/font.ttf")));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
