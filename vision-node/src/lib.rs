pub mod api;
pub mod audit;
pub mod camera;
pub mod capture;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame_store;

use std::sync::Arc;

use audit::EventStore;
use detection::DetectionService;

/// State shared with every HTTP handler.
pub struct AppState {
    pub detection: DetectionService,
    pub model_name: String,
    pub event_store: Arc<dyn EventStore>,
}
