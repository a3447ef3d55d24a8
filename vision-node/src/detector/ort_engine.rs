use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;
use ort::{GraphOptimizationLevel, Session};
use tracing::info;

use super::{resolve_class, Detector, RawDetection};
use crate::config::InferenceConfig;
use crate::error::InferenceError;

/// ONNX Runtime detector for YOLO-family models with the usual
/// `[1, 4 + num_classes, num_anchors]` output layout.
pub struct OrtDetector {
    session: Session,
    model_name: String,
    input_width: u32,
    input_height: u32,
    nms_threshold: f32,
    class_names: Vec<String>,
}

impl OrtDetector {
    pub fn load(config: &InferenceConfig) -> anyhow::Result<Self> {
        info!(model = %config.model_path.display(), "loading detection model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&config.model_path)?;

        info!(model = %config.model_path.display(), "model loaded");
        Ok(Self {
            session,
            model_name: config.model_name(),
            input_width: config.input_width,
            input_height: config.input_height,
            nms_threshold: config.nms_threshold,
            class_names: config.class_names.clone(),
        })
    }

    fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        let resized = image.resize_exact(self.input_width, self.input_height, FilterType::Triangle);
        let rgb = resized.to_rgb8();

        let (w, h) = (self.input_width as usize, self.input_height as usize);
        let mut input = Array4::<f32>::zeros((1, 3, h, w));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
        input
    }
}

impl Detector for OrtDetector {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn infer(
        &self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let (source_w, source_h) = image.dimensions();
        let input = self.preprocess(image);

        let inputs = ort::inputs!["images" => input.view()]
            .map_err(|e| InferenceError(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| InferenceError(e.to_string()))?;
        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError(e.to_string()))?;

        let shape = output.shape();
        if shape.len() != 3 {
            return Err(InferenceError(format!(
                "unexpected output rank {} (shape {:?})",
                shape.len(),
                shape
            )));
        }
        let num_attrs = shape[1];
        let num_anchors = shape[2];
        if num_attrs < 5 {
            return Err(InferenceError(format!(
                "output has {num_attrs} attributes per anchor, expected at least 5"
            )));
        }
        let num_classes = num_attrs - 4;

        let scale_x = source_w as f32 / self.input_width as f32;
        let scale_y = source_h as f32 / self.input_height as f32;

        let mut candidates = Vec::new();
        for a in 0..num_anchors {
            let mut best_class = 0usize;
            let mut best_score = 0f32;
            for c in 0..num_classes {
                let score = output[[0, 4 + c, a]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < confidence_threshold {
                continue;
            }

            let cx = output[[0, 0, a]];
            let cy = output[[0, 1, a]];
            let w = output[[0, 2, a]];
            let h = output[[0, 3, a]];

            candidates.push(RawDetection {
                x1: (cx - w / 2.0) * scale_x,
                y1: (cy - h / 2.0) * scale_y,
                x2: (cx + w / 2.0) * scale_x,
                y2: (cy + h / 2.0) * scale_y,
                confidence: best_score,
                class_id: best_class,
            });
        }

        Ok(non_max_suppression(candidates, self.nms_threshold))
    }

    fn class_name(&self, class_id: usize) -> String {
        resolve_class(&self.class_names, class_id)
    }
}

fn iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let ix = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let iy = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let intersection = ix * iy;
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

fn non_max_suppression(mut candidates: Vec<RawDetection>, threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
