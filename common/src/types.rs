use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::round4;

/// Bounding box in normalized image coordinates (fractions of width/height).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Build from an arbitrary corner pair, ordering the coordinates so
    /// that `x1 <= x2` and `y1 <= y2`.
    pub fn from_corners(xa: f64, ya: f64, xb: f64, yb: f64) -> Self {
        Self {
            x1: xa.min(xb),
            y1: ya.min(yb),
            x2: xa.max(xb),
            y2: ya.max(yb),
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// Bounding box in whole-pixel image coordinates.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl PixelBox {
    /// Build from an arbitrary corner pair, ordering and truncating to
    /// whole pixels.
    pub fn from_corners(xa: f64, ya: f64, xb: f64, yb: f64) -> Self {
        Self {
            x1: xa.min(xb) as i64,
            y1: ya.min(yb) as i64,
            x2: xa.max(xb) as i64,
            y2: ya.max(yb) as i64,
        }
    }
}

/// One detected object, in both pixel and normalized coordinate spaces.
///
/// `distance_meters` is reserved for a depth-estimation stage that does not
/// exist yet and is always `None` here. `triggered_stop` is set by the
/// downstream safety policy, never by the detection path.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectionRecord {
    pub object_class: String,
    pub confidence: f64,
    #[serde(rename = "bbox")]
    pub bbox_normalized: BoundingBox,
    pub bbox_pixels: PixelBox,
    pub distance_meters: Option<f64>,
    pub triggered_stop: bool,
}

impl DetectionRecord {
    /// Build a record from pixel-space corners reported by the model.
    ///
    /// The normalized box derives from the truncated pixel box divided by
    /// the frame dimensions; both it and the confidence are rounded to
    /// four decimal places.
    pub fn from_pixels(
        object_class: impl Into<String>,
        confidence: f64,
        corners: (f64, f64, f64, f64),
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let bbox_pixels = PixelBox::from_corners(corners.0, corners.1, corners.2, corners.3);
        let w = frame_width.max(1) as f64;
        let h = frame_height.max(1) as f64;
        let bbox_normalized = BoundingBox {
            x1: round4(bbox_pixels.x1 as f64 / w),
            y1: round4(bbox_pixels.y1 as f64 / h),
            x2: round4(bbox_pixels.x2 as f64 / w),
            y2: round4(bbox_pixels.y2 as f64 / h),
        };

        Self {
            object_class: object_class.into(),
            confidence: round4(confidence),
            bbox_normalized,
            bbox_pixels,
            distance_meters: None,
            triggered_stop: false,
        }
    }
}

/// Response envelope for one inference call.
///
/// `detections` keeps the model's output order; `total_objects` always
/// equals `detections.len()`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DetectionResult {
    pub detections: Vec<DetectionRecord>,
    pub processing_time_ms: u64,
    pub total_objects: usize,
}

impl DetectionResult {
    pub fn new(detections: Vec<DetectionRecord>, processing_time_ms: u64) -> Self {
        let total_objects = detections.len();
        Self {
            detections,
            processing_time_ms,
            total_objects,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl EventLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Debug => "DEBUG",
            EventLevel::Info => "INFO",
            EventLevel::Warning => "WARNING",
            EventLevel::Error => "ERROR",
            EventLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operational log entry, destined for the `system_logs` table.
///
/// The AGV telemetry fields are part of the shared schema but are filled in
/// by the control node, not by this one.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemEvent {
    pub level: EventLevel,
    pub component: String,
    pub event_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agv_speed_mms: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percentage: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<i64>,
}

impl SystemEvent {
    pub fn new(
        level: EventLevel,
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            component: component.into(),
            event_type: event_type.into(),
            message: message.into(),
            details: None,
            created_at: Utc::now(),
            agv_speed_mms: None,
            battery_percentage: None,
            position_x: None,
            position_y: None,
            path_id: None,
            detection_id: None,
        }
    }

    pub fn debug(
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventLevel::Debug, component, event_type, message)
    }

    pub fn info(
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventLevel::Info, component, event_type, message)
    }

    pub fn warning(
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventLevel::Warning, component, event_type, message)
    }

    pub fn error(
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventLevel::Error, component, event_type, message)
    }

    pub fn critical(
        component: impl Into<String>,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(EventLevel::Critical, component, event_type, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}
