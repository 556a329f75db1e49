//! Watermark compositing: blends a fixed logo into the bottom-right corner
//! of a colour frame.
//!
//! `result = target * TARGET_WEIGHT + watermark * WATERMARK_WEIGHT + BLEND_BIAS`,
//! per channel, rounded and clamped to `0..=255`.

use std::path::{Path, PathBuf};

use crate::camera::error::{CameraError, Result};
use crate::camera::types::Resolution;
use crate::pipeline::frame::{Frame, COLOR_CHANNELS};

/// Weight applied to the captured pixel.
pub const TARGET_WEIGHT: f32 = 1.0;
/// Weight applied to the watermark pixel.
pub const WATERMARK_WEIGHT: f32 = 0.7;
/// Constant added after weighting.
pub const BLEND_BIAS: f32 = 0.0;

/// Default watermark asset, relative to the working directory.
pub const DEFAULT_WATERMARK_PATH: &str = "assets/watermark.png";

/// An immutable RGB overlay image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    frame: Frame,
}

impl Watermark {
    /// Wrap an RGB frame as a watermark.
    ///
    /// Rejects empty or non-colour frames and anything larger than
    /// [`Resolution::MIN_SUPPORTED`], so a loaded watermark always fits every
    /// frame a supported source can deliver.
    pub fn from_frame(frame: Frame) -> Result<Self> {
        if frame.is_empty() {
            return Err(CameraError::Watermark("watermark image is empty".to_string()));
        }
        if frame.channels() != COLOR_CHANNELS {
            return Err(CameraError::Watermark(format!(
                "watermark must be RGB, got {} channel(s)",
                frame.channels()
            )));
        }
        let min = Resolution::MIN_SUPPORTED;
        if !min.contains(frame.width(), frame.height()) {
            return Err(CameraError::WatermarkTooLarge {
                watermark_width: frame.width(),
                watermark_height: frame.height(),
                frame_width: min.width,
                frame_height: min.height,
            });
        }
        Ok(Self { frame })
    }

    /// Decode a watermark from an image file (alpha is discarded).
    pub fn load(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .map_err(|e| CameraError::Watermark(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        Self::from_frame(Frame::rgb(image.into_raw(), width, height)?)
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

/// Blend `watermark` into the bottom-right corner of `target` in place.
pub fn blend_bottom_right(target: &mut Frame, watermark: &Watermark) -> Result<()> {
    if target.channels() != COLOR_CHANNELS {
        return Err(CameraError::InvalidFrame(format!(
            "overlay needs an RGB frame, got {} channel(s)",
            target.channels()
        )));
    }
    if watermark.width() > target.width() || watermark.height() > target.height() {
        return Err(CameraError::WatermarkTooLarge {
            watermark_width: watermark.width(),
            watermark_height: watermark.height(),
            frame_width: target.width(),
            frame_height: target.height(),
        });
    }

    let x0 = (target.width() - watermark.width()) as usize;
    let y0 = (target.height() - watermark.height()) as usize;
    let channels = COLOR_CHANNELS as usize;
    let target_stride = target.stride();
    let mark_stride = watermark.frame().stride();
    let mark = watermark.frame().data();
    let pixels = target.data_mut();

    for row in 0..watermark.height() as usize {
        let dst_start = (y0 + row) * target_stride + x0 * channels;
        let src_start = row * mark_stride;
        let dst = &mut pixels[dst_start..dst_start + mark_stride];
        let src = &mark[src_start..src_start + mark_stride];
        for (t, w) in dst.iter_mut().zip(src) {
            *t = blend_channel(*t, *w);
        }
    }
    Ok(())
}

/// Weighted sum of one channel value, saturated to 8 bits.
pub fn blend_channel(target: u8, watermark: u8) -> u8 {
    let value =
        f32::from(target) * TARGET_WEIGHT + f32::from(watermark) * WATERMARK_WEIGHT + BLEND_BIAS;
    value.round().clamp(0.0, 255.0) as u8
}

enum SlotState {
    Unloaded,
    Loaded(Watermark),
    Missing,
}

/// Lazily-loaded watermark cache.
///
/// The asset is read the first time it is requested. A failed load is
/// remembered, so a missing file is reported once and overlay then has no
/// effect for the rest of the session.
pub struct WatermarkSlot {
    path: PathBuf,
    state: SlotState,
}

impl WatermarkSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: SlotState::Unloaded,
        }
    }

    /// A slot holding an already-decoded watermark.
    pub fn preloaded(watermark: Watermark) -> Self {
        Self {
            path: PathBuf::new(),
            state: SlotState::Loaded(watermark),
        }
    }

    /// Return the watermark, loading it on first use.
    pub fn get(&mut self) -> Option<&Watermark> {
        if matches!(self.state, SlotState::Unloaded) {
            self.state = match Watermark::load(&self.path) {
                Ok(watermark) => {
                    tracing::info!(
                        "Loaded watermark {} ({}x{})",
                        self.path.display(),
                        watermark.width(),
                        watermark.height()
                    );
                    SlotState::Loaded(watermark)
                }
                Err(e) => {
                    tracing::warn!("Overlay disabled, watermark not loaded: {e}");
                    SlotState::Missing
                }
            };
        }
        match &self.state {
            SlotState::Loaded(watermark) => Some(watermark),
            _ => None,
        }
    }
}
