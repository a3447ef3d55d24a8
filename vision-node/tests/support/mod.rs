#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use agv_vision_common::{DetectionRecord, SystemEvent};
use agv_vision_node::audit::EventStore;
use agv_vision_node::detector::{resolve_class, Detector, RawDetection};
use agv_vision_node::error::{InferenceError, StoreError};

/// Detector double with a fixed script and a call counter.
pub struct ScriptedDetector {
    pub calls: AtomicUsize,
    pub boxes: Vec<RawDetection>,
}

impl ScriptedDetector {
    pub fn new(boxes: Vec<RawDetection>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            boxes,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn model_name(&self) -> &str {
        "scripted"
    }

    fn infer(
        &self,
        _image: &DynamicImage,
        _confidence_threshold: f32,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.boxes.clone())
    }

    fn class_name(&self, class_id: usize) -> String {
        resolve_class(&["person".to_string(), "pallet".to_string()], class_id)
    }
}

/// Event store double that records everything it is given, optionally
/// failing every call to exercise the swallow-and-continue contract.
#[derive(Default)]
pub struct CapturingStore {
    pub detections: Mutex<Vec<(DetectionRecord, u64, Option<String>)>>,
    pub events: Mutex<Vec<SystemEvent>>,
    pub fail: bool,
}

impl CapturingStore {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<SystemEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventStore for CapturingStore {
    async fn insert_detection(
        &self,
        record: &DetectionRecord,
        processing_time_ms: u64,
        image_path: Option<&str>,
    ) -> Result<i64, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut detections = self.detections.lock().unwrap();
        detections.push((record.clone(), processing_time_ms, image_path.map(str::to_owned)));
        Ok(detections.len() as i64)
    }

    async fn insert_event(&self, event: &SystemEvent) -> Result<i64, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut events = self.events.lock().unwrap();
        events.push(event.clone());
        Ok(events.len() as i64)
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// A valid JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([40, 90, 200]));
    let mut jpeg = Vec::new();
    JpegEncoder::new(&mut jpeg)
        .encode(img.as_raw(), width, height, image::ColorType::Rgb8)
        .expect("jpeg encode");
    jpeg
}

pub const MULTIPART_BOUNDARY: &str = "----agv-vision-test-boundary";

/// Build a single-file multipart body and the matching content-type value.
pub fn multipart_file(filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    (
        format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        body,
    )
}
