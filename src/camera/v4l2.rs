//! V4L2 frame source for local `/dev/videoN` devices.
//!
//! Requests RGB24 at the configured resolution. Devices that only offer YUYV
//! are accepted and converted to RGB on read; anything else is treated as
//! an unavailable device.

use v4l::buffer::Type;
use v4l::io::mmap::Stream as MmapStream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::FourCC;

use crate::camera::error::{CameraError, Result};
use crate::camera::source::FrameSource;
use crate::camera::types::{DeviceId, Resolution};
use crate::pipeline::frame::Frame;

const BUFFER_COUNT: u32 = 4;
const CAPTURE_FPS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireFormat {
    Rgb24,
    Yuyv,
}

impl WireFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"RGB3" => Some(Self::Rgb24),
            b"YUYV" => Some(Self::Yuyv),
            _ => None,
        }
    }
}

struct OpenDevice {
    // Dropped before the device, which stops streaming.
    stream: MmapStream<'static>,
    _device: v4l::Device,
    id: DeviceId,
    width: u32,
    height: u32,
    /// Bytes per row as reported by the driver, including padding.
    stride: usize,
    format: WireFormat,
}

/// Camera backed by a V4L2 capture device.
pub struct V4l2Source {
    resolution: Resolution,
    state: Option<OpenDevice>,
}

impl V4l2Source {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            state: None,
        }
    }

    fn try_open(&self, id: DeviceId) -> std::io::Result<OpenDevice> {
        let device = v4l::Device::with_path(id.device_path())?;

        let mut format = device.format()?;
        format.width = self.resolution.width;
        format.height = self.resolution.height;
        format.fourcc = FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                tracing::warn!("V4L2: failed to set RGB24 on {id}: {err}");
                device.format()?
            }
        };

        let params = v4l::video::capture::Parameters::with_fps(CAPTURE_FPS);
        if let Err(err) = device.set_params(&params) {
            tracing::warn!("V4L2: failed to set {CAPTURE_FPS} fps on {id}: {err}");
        }

        let wire = WireFormat::from_fourcc(format.fourcc).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                format!("unsupported pixel format {}", format.fourcc),
            )
        })?;

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)?;

        Ok(OpenDevice {
            stream,
            _device: device,
            id,
            width: format.width,
            height: format.height,
            stride: format.stride as usize,
            format: wire,
        })
    }
}

impl FrameSource for V4l2Source {
    fn open(&mut self, device: DeviceId) {
        self.release();
        match self.try_open(device) {
            Ok(state) => {
                tracing::info!(
                    "V4L2: opened {} ({}x{}, {:?})",
                    device.device_path(),
                    state.width,
                    state.height,
                    state.format
                );
                self.state = Some(state);
            }
            Err(err) => {
                tracing::warn!("V4L2: cannot open {}: {err}", device.device_path());
            }
        }
    }

    fn is_opened(&self) -> bool {
        self.state.is_some()
    }

    fn read(&mut self) -> Result<Frame> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CameraError::Read("v4l2 device not open".to_string()))?;
        let (buf, _meta) = state
            .stream
            .next()
            .map_err(|e| CameraError::Read(format!("{}: {e}", state.id)))?;

        let (width, height) = (state.width, state.height);
        let bytes_per_pixel = match state.format {
            WireFormat::Rgb24 => 3,
            WireFormat::Yuyv => 2,
        };
        let row_bytes = width as usize * bytes_per_pixel;
        let Some(packed) = pack_rows(buf, row_bytes, state.stride, height as usize) else {
            return Ok(Frame::empty());
        };
        match state.format {
            WireFormat::Rgb24 => Frame::rgb(packed, width, height),
            WireFormat::Yuyv => Frame::rgb(yuyv_to_rgb(&packed), width, height),
        }
    }

    fn release(&mut self) {
        if let Some(state) = self.state.take() {
            tracing::info!("V4L2: released {}", state.id.device_path());
        }
    }
}

/// Strip driver row padding, returning `height` rows of `row_bytes` each.
///
/// `None` when the buffer is shorter than the image it should hold.
fn pack_rows(buf: &[u8], row_bytes: usize, stride: usize, height: usize) -> Option<Vec<u8>> {
    if stride <= row_bytes {
        return buf.get(..row_bytes * height).map(<[u8]>::to_vec);
    }
    let needed = stride * height.saturating_sub(1) + row_bytes;
    if height == 0 || buf.len() < needed {
        return None;
    }
    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in buf.chunks(stride).take(height) {
        packed.extend_from_slice(&row[..row_bytes]);
    }
    Some(packed)
}

/// Convert packed YUYV 4:2:2 to interleaved RGB (BT.601, full range).
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);
    for chunk in yuyv.chunks_exact(4) {
        let u = f32::from(chunk[1]) - 128.0;
        let v = f32::from(chunk[3]) - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = f32::from(y);
            rgb.push(clamp_to_u8(y + 1.402 * v));
            rgb.push(clamp_to_u8(y - 0.344_136 * u - 0.714_136 * v));
            rgb.push(clamp_to_u8(y + 1.772 * u));
        }
    }
    rgb
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_rows_are_packed() {
        // 2 pixels of RGB per row, padded to 8 bytes
        let buf = [
            1, 2, 3, 4, 5, 6, 0xEE, 0xEE, //
            7, 8, 9, 10, 11, 12, 0xEE, 0xEE,
        ];
        let packed = pack_rows(&buf, 6, 8, 2).unwrap();
        assert_eq!(packed, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn last_padded_row_may_omit_padding() {
        let buf = [1, 2, 3, 0xEE, 4, 5, 6];
        assert_eq!(pack_rows(&buf, 3, 4, 2).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn unpadded_rows_are_copied_directly() {
        let buf = [1, 2, 3, 4, 5, 6, 99];
        assert_eq!(pack_rows(&buf, 3, 3, 2).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        // Drivers reporting 0 bytesperline are treated as packed
        assert_eq!(pack_rows(&buf, 3, 0, 2).unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn short_buffer_yields_none() {
        assert!(pack_rows(&[1, 2, 3, 4, 5], 3, 4, 2).is_none());
        assert!(pack_rows(&[1, 2, 3], 3, 3, 2).is_none());
    }

    #[test]
    fn yuyv_neutral_chroma_is_gray() {
        let rgb = yuyv_to_rgb(&[128, 128, 64, 128]);
        assert_eq!(rgb, vec![128, 128, 128, 64, 64, 64]);
    }

    #[test]
    fn wire_format_recognises_supported_fourccs() {
        assert_eq!(
            WireFormat::from_fourcc(FourCC::new(b"RGB3")),
            Some(WireFormat::Rgb24)
        );
        assert_eq!(
            WireFormat::from_fourcc(FourCC::new(b"YUYV")),
            Some(WireFormat::Yuyv)
        );
        assert_eq!(WireFormat::from_fourcc(FourCC::new(b"MJPG")), None);
    }

    #[test]
    fn missing_device_stays_closed() {
        let mut source = V4l2Source::new(Resolution::default());
        source.open(DeviceId::new(250));
        assert!(!source.is_opened());
        assert!(source.read().is_err());
        source.release();
    }
}
