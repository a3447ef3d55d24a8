use super::{CameraDevice, CapturedFrame, Resolution};
use crate::error::CameraError;

/// Test-pattern frame source: a gradient background with a bright square
/// that drifts one step per frame. Lets the full capture/serve path run on
/// machines without camera hardware.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    sequence: u64,
    opened: bool,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(16),
            height: height.max(16),
            sequence: 0,
            opened: false,
        }
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self) -> Result<Resolution, CameraError> {
        self.opened = true;
        Ok(Resolution {
            width: self.width,
            height: self.height,
        })
    }

    fn read(&mut self) -> Result<CapturedFrame, CameraError> {
        if !self.opened {
            return Err(CameraError::Read("camera not opened".to_string()));
        }

        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 3;
                pixels[i] = (x * 255 / w) as u8;
                pixels[i + 1] = (y * 255 / h) as u8;
                pixels[i + 2] = 64;
            }
        }

        // Drifting 16x16 marker so consecutive frames differ.
        let side = 16usize;
        let offset = (self.sequence as usize * 4) % (w.saturating_sub(side).max(1));
        for y in 0..side.min(h) {
            for x in 0..side {
                let i = (y * w + offset + x) * 3;
                pixels[i] = 255;
                pixels[i + 1] = 255;
                pixels[i + 2] = 255;
            }
        }

        self.sequence += 1;
        Ok(CapturedFrame {
            pixels,
            width: self.width,
            height: self.height,
        })
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn describe(&self) -> String {
        "synthetic".to_string()
    }
}
