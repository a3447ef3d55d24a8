use image::codecs::jpeg::JpegEncoder;

use crate::config::{CameraBackend, CameraConfig};
use crate::error::CameraError;

pub mod synthetic;

#[cfg(feature = "camera-gstreamer")]
pub mod gstreamer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// One decoded frame straight off the camera, packed RGB8.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode(&self.pixels, self.width, self.height, image::ColorType::Rgb8)?;
        Ok(buf)
    }
}

/// A frame source. `open` must be called before `read`; the negotiated
/// resolution it returns may differ from the requested one, and every
/// `CapturedFrame` carries its own actual dimensions.
pub trait CameraDevice: Send {
    fn open(&mut self) -> Result<Resolution, CameraError>;
    fn read(&mut self) -> Result<CapturedFrame, CameraError>;
    fn close(&mut self);
    /// Short human-readable identifier used in logs and events.
    fn describe(&self) -> String;
}

pub fn build(config: &CameraConfig) -> anyhow::Result<Box<dyn CameraDevice>> {
    match config.backend {
        CameraBackend::Synthetic => Ok(Box::new(synthetic::SyntheticCamera::new(
            config.width,
            config.height,
        ))),
        #[cfg(feature = "camera-gstreamer")]
        CameraBackend::Gstreamer => Ok(Box::new(gstreamer::GstCamera::new(config.clone()))),
        #[cfg(not(feature = "camera-gstreamer"))]
        CameraBackend::Gstreamer => anyhow::bail!(
            "camera backend `gstreamer` requires building with `--features camera-gstreamer`"
        ),
    }
}
