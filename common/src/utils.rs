use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Round to four decimal places, the precision stored for confidences and
/// normalized coordinates.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
