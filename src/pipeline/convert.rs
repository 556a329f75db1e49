//! Conversion from processed frames to display-ready buffers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::camera::error::{CameraError, Result};
use crate::pipeline::frame::{Frame, COLOR_CHANNELS, GRAY_CHANNELS};

/// Pixel layout a display sink renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelLayout {
    /// One byte of luma per pixel.
    Gray8,
    /// Interleaved R, G, B.
    Rgb8,
    /// Interleaved R, G, B, A with opaque alpha.
    Rgba8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
        }
    }

    /// The layout that stores a frame with `channels` channels without
    /// conversion.
    pub fn native(channels: u8) -> Self {
        if channels == GRAY_CHANNELS {
            Self::Gray8
        } else {
            Self::Rgb8
        }
    }
}

/// An immutable, display-ready image handed across to the display context.
///
/// Pixels sit behind an `Arc`, so the display side can keep the latest
/// buffer and clone it cheaply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub pixels: Arc<[u8]>,
    /// Position of this buffer in the session's output order.
    pub sequence: u64,
}

impl DisplayBuffer {
    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }
}

/// Convert a processed frame into `layout`.
///
/// Same-channel conversions reuse the frame's payload; gray frames are
/// expanded to colour layouts by replicating luma, colour frames reduced to
/// `Gray8` with BT.601 weights.
pub fn to_display(frame: Frame, layout: PixelLayout, sequence: u64) -> Result<DisplayBuffer> {
    if frame.is_empty() {
        return Err(CameraError::Conversion("cannot display an empty frame".to_string()));
    }

    let width = frame.width();
    let height = frame.height();
    let channels = frame.channels();

    let pixels: Vec<u8> = match (channels, layout) {
        (GRAY_CHANNELS, PixelLayout::Gray8) | (COLOR_CHANNELS, PixelLayout::Rgb8) => {
            frame.into_data()
        }
        (GRAY_CHANNELS, PixelLayout::Rgb8) => {
            frame.data().iter().flat_map(|&y| [y, y, y]).collect()
        }
        (GRAY_CHANNELS, PixelLayout::Rgba8) => {
            frame.data().iter().flat_map(|&y| [y, y, y, u8::MAX]).collect()
        }
        (COLOR_CHANNELS, PixelLayout::Rgba8) => frame
            .data()
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
            .collect(),
        (COLOR_CHANNELS, PixelLayout::Gray8) => {
            let mut gray = frame;
            gray.to_grayscale();
            gray.into_data()
        }
        (other, _) => {
            return Err(CameraError::Conversion(format!(
                "unsupported channel count {other}"
            )))
        }
    };

    let expected = width as usize * height as usize * layout.bytes_per_pixel();
    if pixels.len() != expected {
        return Err(CameraError::Conversion(format!(
            "display buffer length mismatch: expected {expected}, got {}",
            pixels.len()
        )));
    }

    Ok(DisplayBuffer {
        width,
        height,
        layout,
        pixels: Arc::from(pixels),
        sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_2x1() -> Frame {
        Frame::rgb(vec![255, 0, 0, 0, 0, 255], 2, 1).unwrap()
    }

    fn gray_2x1() -> Frame {
        Frame::new(vec![10, 200], 2, 1, 1).unwrap()
    }

    #[test]
    fn native_layout_follows_channel_count() {
        assert_eq!(PixelLayout::native(1), PixelLayout::Gray8);
        assert_eq!(PixelLayout::native(3), PixelLayout::Rgb8);
    }

    #[test]
    fn colour_frame_to_rgb_copies_payload() {
        let buf = to_display(rgb_2x1(), PixelLayout::Rgb8, 7).unwrap();
        assert_eq!(&*buf.pixels, &[255, 0, 0, 0, 0, 255]);
        assert_eq!(buf.layout, PixelLayout::Rgb8);
        assert_eq!(buf.sequence, 7);
        assert_eq!(buf.stride(), 6);
    }

    #[test]
    fn gray_frame_to_gray_is_single_channel() {
        let buf = to_display(gray_2x1(), PixelLayout::Gray8, 0).unwrap();
        assert_eq!(&*buf.pixels, &[10, 200]);
        assert_eq!(buf.stride(), 2);
    }

    #[test]
    fn gray_frame_expands_to_rgb_and_rgba() {
        let rgb = to_display(gray_2x1(), PixelLayout::Rgb8, 0).unwrap();
        assert_eq!(&*rgb.pixels, &[10, 10, 10, 200, 200, 200]);

        let rgba = to_display(gray_2x1(), PixelLayout::Rgba8, 0).unwrap();
        assert_eq!(&*rgba.pixels, &[10, 10, 10, 255, 200, 200, 200, 255]);
    }

    #[test]
    fn colour_frame_to_rgba_adds_opaque_alpha() {
        let buf = to_display(rgb_2x1(), PixelLayout::Rgba8, 0).unwrap();
        assert_eq!(&*buf.pixels, &[255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn colour_frame_to_gray_uses_luma() {
        let buf = to_display(rgb_2x1(), PixelLayout::Gray8, 0).unwrap();
        assert_eq!(&*buf.pixels, &[76, 29]);
    }

    #[test]
    fn empty_frame_is_rejected() {
        let result = to_display(Frame::empty(), PixelLayout::Rgb8, 0);
        assert!(matches!(result, Err(CameraError::Conversion(_))));
    }
}
