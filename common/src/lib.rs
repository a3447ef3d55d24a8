pub mod types;
pub mod utils;

pub use types::{
    BoundingBox, DetectionRecord, DetectionResult, EventLevel, PixelBox, SystemEvent,
};
