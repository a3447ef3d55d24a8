use std::fs;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::json;
use tracing::{debug, error, info, warn};

use agv_vision_common::utils::current_timestamp_ms;
use agv_vision_common::SystemEvent;

use crate::audit::AuditSink;
use crate::camera::CameraDevice;
use crate::config::CaptureConfig;
use crate::frame_store::{FrameStore, StoredFrame};

const COMPONENT: &str = "camera";
const ERROR_EVENT_EVERY: u64 = 10;
const MILESTONE_EVERY: u64 = 100;

/// Polls the camera at a fixed interval, publishing each successful frame
/// to the FrameStore and to the well-known artifact file. Runs on its own
/// thread until stopped; the interval is the same after success and
/// failure.
pub struct CaptureLoop {
    camera: Box<dyn CameraDevice>,
    store: FrameStore,
    audit: AuditSink,
    config: CaptureConfig,
}

/// Stops the loop and joins its thread.
pub struct CaptureHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<()>,
}

impl CaptureHandle {
    pub fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.thread.join();
    }
}

impl CaptureLoop {
    pub fn new(
        camera: Box<dyn CameraDevice>,
        store: FrameStore,
        audit: AuditSink,
        config: CaptureConfig,
    ) -> Self {
        Self {
            camera,
            store,
            audit,
            config,
        }
    }

    pub fn spawn(self) -> std::io::Result<CaptureHandle> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("capture-loop".to_string())
            .spawn(move || self.run(stop_rx))?;
        Ok(CaptureHandle { stop_tx, thread })
    }

    fn run(mut self, stop_rx: Receiver<()>) {
        let device = self.camera.describe();
        self.audit.event(
            SystemEvent::info(COMPONENT, "startup", "camera capture started").with_details(json!({
                "device": device,
                "capture_interval_ms": self.config.interval_ms,
            })),
        );

        let resolution = match self.camera.open() {
            Ok(resolution) => resolution,
            Err(e) => {
                error!(device = %device, error = %e, "cannot start without camera");
                self.audit.event(
                    SystemEvent::critical(
                        COMPONENT,
                        "camera_open_failed",
                        "failed to open camera, capture cannot start",
                    )
                    .with_details(json!({"device": device, "error": e.to_string()})),
                );
                return;
            }
        };
        info!(
            device = %device,
            width = resolution.width,
            height = resolution.height,
            interval_ms = self.config.interval_ms,
            "camera opened"
        );

        let mut frames: u64 = 0;
        let mut errors: u64 = 0;
        if let Err(e) = self.cycle_until_stopped(&stop_rx, &mut frames, &mut errors) {
            error!(error = %e, "capture loop aborted");
            self.audit.event(
                SystemEvent::error(COMPONENT, "unexpected_error", format!("capture loop aborted: {e}"))
                    .with_details(json!({"frames_captured": frames, "errors": errors})),
            );
        }

        self.camera.close();
        self.audit.event(
            SystemEvent::info(COMPONENT, "shutdown", "camera capture stopped")
                .with_details(json!({"frames_captured": frames, "errors": errors})),
        );
        info!(frames_captured = frames, errors = errors, "capture loop stopped");
    }

    fn cycle_until_stopped(
        &mut self,
        stop_rx: &Receiver<()>,
        frames: &mut u64,
        errors: &mut u64,
    ) -> std::io::Result<()> {
        let artifact_path = self.config.artifact_path();
        if let Some(dir) = artifact_path.parent() {
            fs::create_dir_all(dir)?;
        }
        let interval = Duration::from_millis(self.config.interval_ms);

        loop {
            match self.capture_once(*frames) {
                Ok(stored) => {
                    if let Err(e) = fs::write(&artifact_path, &stored.jpeg) {
                        warn!(path = %artifact_path.display(), error = %e, "failed to write frame artifact");
                    }
                    *frames += 1;
                    debug!(frame = *frames, "frame captured");
                    if *frames % MILESTONE_EVERY == 0 {
                        self.audit.event(
                            SystemEvent::info(
                                COMPONENT,
                                "capture_milestone",
                                format!("camera milestone: {frames} frames captured"),
                            )
                            .with_details(json!({"frames_captured": *frames, "errors": *errors})),
                        );
                    }
                }
                Err(e) => {
                    *errors += 1;
                    warn!(error = %e, "skipping frame after capture failure");
                    if *errors % ERROR_EVENT_EVERY == 0 {
                        self.audit.event(
                            SystemEvent::warning(
                                COMPONENT,
                                "capture_failure",
                                format!("camera capture failed {errors} times"),
                            )
                            .with_details(json!({"total_errors": *errors, "frames_captured": *frames})),
                        );
                    }
                }
            }

            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    fn capture_once(&mut self, frames: u64) -> Result<std::sync::Arc<StoredFrame>, crate::error::CameraError> {
        let frame = self.camera.read()?;
        let jpeg = frame.encode_jpeg(self.config.jpeg_quality)?;
        Ok(self.store.publish(StoredFrame {
            jpeg,
            width: frame.width,
            height: frame.height,
            sequence: frames + 1,
            captured_at_ms: current_timestamp_ms(),
        }))
    }
}
