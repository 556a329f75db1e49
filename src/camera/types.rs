use serde::{Deserialize, Serialize};
use std::fmt;

/// Capture device identifier: the system's camera index (0 = first camera).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceId(u32);

impl DeviceId {
    /// Create a new `DeviceId` from a camera index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the camera index.
    pub fn index(self) -> u32 {
        self.0
    }

    /// Device node for this index on Linux (`/dev/videoN`).
    pub fn device_path(self) -> String {
        format!("/dev/video{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera-{}", self.0)
    }
}

/// Requested capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Smallest resolution any supported source delivers. Watermarks must fit
    /// inside it.
    pub const MIN_SUPPORTED: Resolution = Resolution {
        width: 160,
        height: 120,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether a `width`×`height` image fits inside this resolution.
    pub fn contains(self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

/// Which frame source implementation the viewer should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// V4L2 when compiled in, the synthetic source otherwise.
    #[default]
    Auto,
    Dummy,
    V4l2,
}
