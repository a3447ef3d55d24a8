use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use tracing::info;

use agv_vision_common::{DetectionRecord, DetectionResult};

use crate::audit::AuditSink;
use crate::detector::Detector;
use crate::error::DetectError;
use crate::frame_store::FrameStore;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Stateless per-request detection path: decode, one timed inference call,
/// normalization, then best-effort submission of every record to the audit
/// sink. The result is returned to the caller regardless of what the sink
/// does with it.
#[derive(Clone)]
pub struct DetectionService {
    detector: Arc<dyn Detector>,
    store: FrameStore,
    audit: AuditSink,
}

impl DetectionService {
    pub fn new(detector: Arc<dyn Detector>, store: FrameStore, audit: AuditSink) -> Self {
        Self {
            detector,
            store,
            audit,
        }
    }

    /// Run detection on request-supplied bytes. `source` is the uploaded
    /// filename, recorded with each persisted detection.
    pub fn detect_from_bytes(
        &self,
        image_bytes: &[u8],
        threshold: f32,
        source: Option<&str>,
    ) -> Result<DetectionResult, DetectError> {
        check_threshold(threshold)?;
        let image = image::load_from_memory(image_bytes)?;
        self.run(&image, threshold, source)
    }

    /// Run detection on the most recently captured frame.
    pub fn detect_from_store(&self, threshold: f32) -> Result<DetectionResult, DetectError> {
        check_threshold(threshold)?;
        let frame = self.store.latest().ok_or(DetectError::NoFrame)?;
        let image = image::load_from_memory(&frame.jpeg)?;
        let identity = self.store.identity().to_string();
        self.run(&image, threshold, Some(&identity))
    }

    fn run(
        &self,
        image: &DynamicImage,
        threshold: f32,
        source: Option<&str>,
    ) -> Result<DetectionResult, DetectError> {
        let (width, height) = (image.width(), image.height());

        let started = Instant::now();
        let raw = self.detector.infer(image, threshold)?;
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let detections: Vec<DetectionRecord> = raw
            .iter()
            .map(|r| {
                DetectionRecord::from_pixels(
                    self.detector.class_name(r.class_id),
                    r.confidence as f64,
                    (r.x1 as f64, r.y1 as f64, r.x2 as f64, r.y2 as f64),
                    width,
                    height,
                )
            })
            .collect();
        let result = DetectionResult::new(detections, processing_time_ms);

        for record in &result.detections {
            self.audit.detection(record.clone(), processing_time_ms, source);
        }

        info!(
            total_objects = result.total_objects,
            processing_time_ms,
            threshold = threshold as f64,
            source = source.unwrap_or("upload"),
            "detection complete"
        );
        Ok(result)
    }
}

fn check_threshold(threshold: f32) -> Result<(), DetectError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(DetectError::InvalidThreshold(threshold));
    }
    Ok(())
}
