use std::sync::Arc;

use image::DynamicImage;

use crate::config::InferenceConfig;
use crate::error::InferenceError;

#[cfg(feature = "onnx")]
pub mod ort_engine;

/// One raw box from the model, pixel-space corners in the source image.
#[derive(Debug, Clone, Copy)]
pub struct RawDetection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

/// The object-detection model behind a fixed seam: one inference call per
/// request, plus the class-index-to-name table.
pub trait Detector: Send + Sync {
    fn model_name(&self) -> &str;

    fn infer(
        &self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, InferenceError>;

    fn class_name(&self, class_id: usize) -> String;
}

/// Resolve a class index against a name table, with the conventional
/// fallback for indices the table does not cover.
pub fn resolve_class(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{class_id}"))
}

pub fn build(config: &InferenceConfig) -> anyhow::Result<Arc<dyn Detector>> {
    #[cfg(feature = "onnx")]
    return Ok(Arc::new(ort_engine::OrtDetector::load(config)?));

    #[cfg(not(feature = "onnx"))]
    {
        let _ = config;
        anyhow::bail!("no inference backend compiled in; rebuild with `--features onnx`")
    }
}
