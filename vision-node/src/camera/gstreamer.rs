use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use tracing::info;

use super::{CameraDevice, CapturedFrame, Resolution};
use crate::config::CameraConfig;
use crate::error::CameraError;

const PULL_TIMEOUT_SECS: u64 = 5;

/// GStreamer-backed camera. Builds a v4l2 pipeline terminated by an
/// appsink delivering raw RGB frames, pulled synchronously in `read`.
pub struct GstCamera {
    config: CameraConfig,
    pipeline: Option<gstreamer::Pipeline>,
    appsink: Option<AppSink>,
}

impl GstCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pipeline: None,
            appsink: None,
        }
    }

    fn pipeline_description(&self) -> String {
        if self.config.pipeline.is_empty() {
            format!(
                "v4l2src device={} ! video/x-raw,width={},height={} ! \
                 videoconvert ! video/x-raw,format=RGB ! appsink name=sink sync=false",
                self.config.device, self.config.width, self.config.height
            )
        } else {
            self.config.pipeline.clone()
        }
    }

    fn open_failed(&self, reason: impl ToString) -> CameraError {
        CameraError::Open {
            device: self.config.device.clone(),
            reason: reason.to_string(),
        }
    }
}

impl CameraDevice for GstCamera {
    fn open(&mut self) -> Result<Resolution, CameraError> {
        gstreamer::init().map_err(|e| self.open_failed(e))?;

        let description = self.pipeline_description();
        info!(pipeline = %description, "creating GStreamer pipeline");

        let pipeline = gstreamer::parse_launch(&description)
            .map_err(|e| self.open_failed(e))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| self.open_failed("element is not a pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| self.open_failed("no appsink named `sink` in pipeline"))?
            .downcast::<AppSink>()
            .map_err(|_| self.open_failed("`sink` element is not an appsink"))?;
        appsink.set_max_buffers(2);
        appsink.set_drop(true);

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| self.open_failed(e))?;

        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);

        // The driver may not honor the requested size; report what the
        // first sample actually carries.
        let first = self.read().map_err(|e| self.open_failed(e))?;
        let resolution = Resolution {
            width: first.width,
            height: first.height,
        };
        info!(width = resolution.width, height = resolution.height, "camera opened");
        Ok(resolution)
    }

    fn read(&mut self) -> Result<CapturedFrame, CameraError> {
        let appsink = self
            .appsink
            .as_ref()
            .ok_or_else(|| CameraError::Read("camera not opened".to_string()))?;

        let sample = appsink
            .try_pull_sample(gstreamer::ClockTime::from_seconds(PULL_TIMEOUT_SECS))
            .ok_or_else(|| CameraError::Read("timed out waiting for sample".to_string()))?;

        let caps = sample
            .caps()
            .ok_or_else(|| CameraError::Read("sample without caps".to_string()))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| CameraError::Read(format!("unreadable caps: {e}")))?;

        let buffer = sample
            .buffer()
            .ok_or_else(|| CameraError::Read("sample without buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::Read(format!("cannot map buffer: {e}")))?;

        Ok(CapturedFrame {
            pixels: map.as_slice().to_vec(),
            width: video_info.width(),
            height: video_info.height(),
        })
    }

    fn close(&mut self) {
        self.appsink = None;
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
        }
    }

    fn describe(&self) -> String {
        self.config.device.clone()
    }
}

impl Drop for GstCamera {
    fn drop(&mut self) {
        self.close();
    }
}
