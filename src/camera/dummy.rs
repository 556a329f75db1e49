use crate::camera::error::{CameraError, Result};
use crate::camera::source::FrameSource;
use crate::camera::types::{DeviceId, Resolution};
use crate::pipeline::frame::Frame;

/// Highest camera index the dummy source pretends to own.
const DUMMY_DEVICE_COUNT: u32 = 1;

/// A fake camera for running without real hardware.
///
/// Produces an RGB gradient test pattern that scrolls one pixel per frame, so
/// consecutive frames differ. Only device index 0 can be opened, which makes
/// "device unavailable" easy to reproduce by asking for another index.
///
/// Enable via `DUMMY_CAMERA=1` environment variable.
pub struct DummySource {
    resolution: Resolution,
    device: Option<DeviceId>,
    frame_count: u64,
}

impl DummySource {
    /// Create a closed dummy source producing frames of the given size.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            device: None,
            frame_count: 0,
        }
    }

    /// Whether the dummy camera is forced via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Render the test pattern for frame number `n`.
    pub fn test_pattern(resolution: Resolution, n: u64) -> Frame {
        let Resolution { width, height } = resolution;
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        let shift = n as usize;
        for y in 0..height as usize {
            for x in 0..width as usize {
                data.push(((x + shift) % 256) as u8); // R
                data.push((y % 256) as u8); // G
                data.push(128); // B
            }
        }
        // Length matches by construction
        Frame::rgb(data, width, height).unwrap_or_else(|_| Frame::empty())
    }
}

impl FrameSource for DummySource {
    fn open(&mut self, device: DeviceId) {
        if device.index() >= DUMMY_DEVICE_COUNT {
            tracing::warn!("Dummy camera cannot open {device}");
            return;
        }
        tracing::info!(
            "Dummy camera opened as {device} ({}x{})",
            self.resolution.width,
            self.resolution.height
        );
        self.device = Some(device);
    }

    fn is_opened(&self) -> bool {
        self.device.is_some()
    }

    fn read(&mut self) -> Result<Frame> {
        if self.device.is_none() {
            return Err(CameraError::Read("dummy camera is not open".to_string()));
        }
        let frame = Self::test_pattern(self.resolution, self.frame_count);
        self.frame_count += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        if let Some(device) = self.device.take() {
            tracing::info!("Dummy camera {device} released");
        }
    }
}
