use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NodeConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub inference: InferenceConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackend {
    /// Built-in test-pattern source, no hardware required.
    Synthetic,
    /// GStreamer pipeline, requires the `camera-gstreamer` feature.
    Gstreamer,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Full pipeline description; when empty a v4l2 pipeline is built from
    /// `device`/`width`/`height`.
    pub pipeline: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CaptureConfig {
    pub interval_ms: u64,
    /// Base directory for published artifacts; the latest frame lands at
    /// `<data_dir>/images/latest.jpg`.
    pub data_dir: PathBuf,
    pub jpeg_quality: u8,
}

impl CaptureConfig {
    pub fn artifact_path(&self) -> PathBuf {
        self.data_dir.join("images").join("latest.jpg")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct InferenceConfig {
    pub model_path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    pub nms_threshold: f32,
    pub class_names: Vec<String>,
}

impl InferenceConfig {
    /// Display name reported by `/health`, derived from the model file.
    pub fn model_name(&self) -> String {
        self.model_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// When absent the node runs without persistence.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Synthetic,
            device: "/dev/video0".to_string(),
            width: 640,
            height: 480,
            pipeline: String::new(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            data_dir: PathBuf::from("data"),
            jpeg_quality: 85,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolo11s.onnx"),
            input_width: 640,
            input_height: 640,
            nms_threshold: 0.45,
            class_names: vec![
                "person".to_string(),
                "box".to_string(),
                "pallet".to_string(),
                "forklift".to_string(),
                "agv".to_string(),
                "obstacle".to_string(),
            ],
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

impl NodeConfig {
    /// Load configuration from an optional YAML file layered with
    /// `AGV_VISION`-prefixed environment variables.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AGV_VISION").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
