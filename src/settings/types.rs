use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::camera::types::{DeviceId, Resolution, SourceKind};
use crate::pipeline::composite::DEFAULT_WATERMARK_PATH;
use crate::pipeline::convert::PixelLayout;
use crate::pipeline::options::ProcessingOptions;
use crate::preview::compress::DEFAULT_JPEG_QUALITY;
use crate::preview::controller::CaptureConfig;

/// Viewer configuration file structure.
///
/// Every field is optional in the file; missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ViewerSettings {
    pub source: SourceKind,
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub watermark_path: PathBuf,
    pub grayscale: bool,
    pub overlay: bool,
    pub snapshot_path: PathBuf,
    pub jpeg_quality: u8,
    /// Layout every displayed frame is converted to. `None` keeps each
    /// frame's native layout (gray or RGB).
    pub display_layout: Option<PixelLayout>,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        let resolution = Resolution::default();
        Self {
            source: SourceKind::default(),
            device_index: 0,
            width: resolution.width,
            height: resolution.height,
            watermark_path: PathBuf::from(DEFAULT_WATERMARK_PATH),
            grayscale: false,
            overlay: false,
            snapshot_path: PathBuf::from("snapshot.jpg"),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            display_layout: None,
        }
    }
}

impl ViewerSettings {
    pub fn device(&self) -> DeviceId {
        DeviceId::new(self.device_index)
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    /// Processing flags the viewer starts with.
    pub fn initial_options(&self) -> ProcessingOptions {
        ProcessingOptions {
            grayscale: self.grayscale,
            overlay: self.overlay,
        }
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            device: self.device(),
            watermark_path: self.watermark_path.clone(),
        }
    }
}
