use crate::camera::error::{CameraError, Result};

/// Channel count of a single-channel luma frame.
pub const GRAY_CHANNELS: u8 = 1;
/// Channel count of an interleaved RGB frame.
pub const COLOR_CHANNELS: u8 = 3;

/// A single captured image as a row-major pixel buffer.
///
/// The payload length always equals `width * height * channels`. A frame with
/// no pixels is the "no data" sentinel returned by sources that had nothing
/// to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    /// Build a frame, validating the channel count and payload length.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self> {
        if channels != GRAY_CHANNELS && channels != COLOR_CHANNELS {
            return Err(CameraError::InvalidFrame(format!(
                "unsupported channel count {channels}"
            )));
        }
        let expected = expected_len(width, height, channels)?;
        if data.len() != expected {
            return Err(CameraError::InvalidFrame(format!(
                "payload length mismatch: expected {expected}, got {}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    /// Build an RGB frame.
    pub fn rgb(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        Self::new(data, width, height, COLOR_CHANNELS)
    }

    /// The empty-frame sentinel.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            width: 0,
            height: 0,
            channels: COLOR_CHANNELS,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Consume the frame and return its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Replace the frame with single-channel luma (BT.601 weights).
    ///
    /// Frames that are already single channel, or empty, are left as-is.
    pub fn to_grayscale(&mut self) {
        if self.is_empty() || self.channels == GRAY_CHANNELS {
            return;
        }
        let luma: Vec<u8> = self
            .data
            .chunks_exact(COLOR_CHANNELS as usize)
            .map(|px| luma_601(px[0], px[1], px[2]))
            .collect();
        self.data = luma;
        self.channels = GRAY_CHANNELS;
    }
}

/// BT.601 luma of an RGB triple, rounded to the nearest 8-bit value.
pub fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

fn expected_len(width: u32, height: u32, channels: u8) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(channels as usize))
        .ok_or_else(|| CameraError::InvalidFrame("frame dimensions overflow".to_string()))
}
