//! Model management for ONNX Runtime
//!
//! Locates the hand landmark models on disk and fetches them on demand.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ort::session::{builder::GraphOptimizationLevel, Session};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use super::ModelComplexity;

/// Environment variable disabling model downloads
pub const OFFLINE_ENV: &str = "SIGNLENS_OFFLINE";

/// Hand landmark network variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Faster, less accurate network
    HandLandmarkLite,
    /// Slower, more accurate network
    HandLandmarkFull,
}

impl ModelType {
    /// Model used for a given complexity setting
    pub fn for_complexity(complexity: ModelComplexity) -> Self {
        match complexity {
            ModelComplexity::Lite => ModelType::HandLandmarkLite,
            ModelComplexity::Full => ModelType::HandLandmarkFull,
        }
    }

    /// Get the filename for this model type
    pub fn filename(&self) -> &'static str {
        match self {
            ModelType::HandLandmarkLite => "hand_landmark_lite.onnx",
            ModelType::HandLandmarkFull => "hand_landmark_full.onnx",
        }
    }

    /// Display name for progress reporting
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelType::HandLandmarkLite => "Hand Landmarks (lite)",
            ModelType::HandLandmarkFull => "Hand Landmarks (full)",
        }
    }
}

/// Model manager for locating and downloading ONNX models
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a model manager rooted in the application data directory
    pub fn new() -> Result<Self> {
        let data_dir = crate::storage::get_data_dir()?;
        Self::with_dir(data_dir.join("models"))
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("Failed to create models directory {:?}", models_dir))?;
        Ok(Self { models_dir })
    }

    /// Get the path to a specific model file
    pub fn model_path(&self, model_type: ModelType) -> PathBuf {
        self.models_dir.join(model_type.filename())
    }

    /// Check if a model is already present
    pub fn is_model_available(&self, model_type: ModelType) -> bool {
        std::fs::metadata(self.model_path(model_type))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Return the model path, downloading it from `url` first if it is missing
    pub fn ensure_model(
        &self,
        model_type: ModelType,
        url: Option<&str>,
        sha256: Option<&str>,
    ) -> Result<PathBuf> {
        let path = self.model_path(model_type);

        if self.is_model_available(model_type) {
            info!("Model {:?} available at {:?}", model_type, path);
            return Ok(path);
        }

        let Some(url) = url else {
            anyhow::bail!(
                "{} model not found. Place {} at {:?} or set landmarks.model_url",
                model_type.display_name(),
                model_type.filename(),
                path
            );
        };

        if std::env::var(OFFLINE_ENV).is_ok() {
            anyhow::bail!(
                "Offline mode: cannot download models. Please download manually from {} and place at {:?}",
                url,
                path
            );
        }

        info!("Downloading {} model from {}", model_type.display_name(), url);

        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(download_file(url, &path, sha256))?;

        if !self.is_model_available(model_type) {
            anyhow::bail!("Download completed but model file is empty");
        }

        info!("Successfully downloaded {} model", model_type.display_name());
        Ok(path)
    }
}

/// Stream `url` into `path`, verifying the SHA256 when one is given
async fn download_file(url: &str, path: &Path, expected_sha256: Option<&str>) -> Result<()> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send download request")?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    debug!("Download size: {:?} bytes", response.content_length());

    let temp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;
        file.write_all(&chunk).context("Failed to write to temp file")?;
        hasher.update(&chunk);
    }

    file.flush().context("Failed to flush temp file")?;
    drop(file);

    let hash = format!("{:x}", hasher.finalize());
    if let Some(expected) = expected_sha256 {
        if !hash.eq_ignore_ascii_case(expected) {
            std::fs::remove_file(&temp_path).ok();
            anyhow::bail!("Checksum mismatch for {:?}: expected {}, got {}", path, expected, hash);
        }
        info!("Checksum verified for {:?}", path);
    }

    std::fs::rename(&temp_path, path)
        .context("Failed to move downloaded file to final location")?;

    Ok(())
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
    output_names: Vec<String>,
}

impl OnnxSession {
    /// Create a new ONNX session from a model file
    pub fn new(model_path: &Path) -> Result<Self> {
        info!("Loading ONNX model from {:?}", model_path);

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        let input_names: Vec<String> = session
            .inputs
            .iter()
            .map(|input| input.name.clone())
            .collect();

        let output_names: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();

        info!(
            "Model loaded. Inputs: {:?}, Outputs: {:?}",
            input_names, output_names
        );

        Ok(Self {
            session,
            output_names,
        })
    }

    /// Get the underlying session mutably for running inference
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Get output names
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_filenames() {
        assert_eq!(ModelType::HandLandmarkLite.filename(), "hand_landmark_lite.onnx");
        assert_eq!(ModelType::HandLandmarkFull.filename(), "hand_landmark_full.onnx");
    }

    #[test]
    fn test_model_type_for_complexity() {
        assert_eq!(
            ModelType::for_complexity(ModelComplexity::Lite),
            ModelType::HandLandmarkLite
        );
        assert_eq!(
            ModelType::for_complexity(ModelComplexity::Full),
            ModelType::HandLandmarkFull
        );
    }

    #[test]
    fn test_model_availability() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().join("models")).unwrap();

        assert!(!manager.is_model_available(ModelType::HandLandmarkFull));

        std::fs::write(manager.model_path(ModelType::HandLandmarkFull), b"").unwrap();
        assert!(!manager.is_model_available(ModelType::HandLandmarkFull));

        std::fs::write(manager.model_path(ModelType::HandLandmarkFull), b"onnx").unwrap();
        assert!(manager.is_model_available(ModelType::HandLandmarkFull));
    }

    #[test]
    fn test_ensure_model_without_url_reports_location() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        let err = manager
            .ensure_model(ModelType::HandLandmarkLite, None, None)
            .unwrap_err();
        assert!(err.to_string().contains("hand_landmark_lite.onnx"));
    }

    #[test]
    fn test_ensure_model_returns_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();
        std::fs::write(manager.model_path(ModelType::HandLandmarkLite), b"onnx").unwrap();

        let path = manager
            .ensure_model(ModelType::HandLandmarkLite, Some("http://unused.invalid/model"), None)
            .unwrap();
        assert_eq!(path, manager.model_path(ModelType::HandLandmarkLite));
    }
}
