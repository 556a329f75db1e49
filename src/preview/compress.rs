use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};

use crate::camera::error::{CameraError, Result};
use crate::pipeline::convert::{DisplayBuffer, PixelLayout};

/// Quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Compress a display buffer to JPEG at the given quality (1-100).
///
/// Gray buffers are encoded as single-channel JPEG. RGBA buffers have their
/// alpha dropped since JPEG carries no transparency.
pub fn compress_jpeg(buffer: &DisplayBuffer, quality: u8) -> Result<Vec<u8>> {
    let quality = quality.clamp(1, 100);
    let expected = buffer.stride() * buffer.height as usize;
    if buffer.pixels.len() != expected {
        return Err(CameraError::Encode(format!(
            "buffer holds {} bytes, {}x{} {:?} needs {expected}",
            buffer.pixels.len(),
            buffer.width,
            buffer.height,
            buffer.layout
        )));
    }

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    let result = match buffer.layout {
        PixelLayout::Gray8 => encoder.write_image(
            &buffer.pixels,
            buffer.width,
            buffer.height,
            ExtendedColorType::L8,
        ),
        PixelLayout::Rgb8 => encoder.write_image(
            &buffer.pixels,
            buffer.width,
            buffer.height,
            ExtendedColorType::Rgb8,
        ),
        PixelLayout::Rgba8 => {
            let rgb: Vec<u8> = buffer
                .pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            encoder.write_image(&rgb, buffer.width, buffer.height, ExtendedColorType::Rgb8)
        }
    };
    result.map_err(|e| CameraError::Encode(e.to_string()))?;
    Ok(out)
}

/// Encode `buffer` as JPEG and write it to `path`, creating parent
/// directories as needed. Returns the number of bytes written.
pub fn write_snapshot(buffer: &DisplayBuffer, path: &Path, quality: u8) -> Result<usize> {
    let jpeg = compress_jpeg(buffer, quality)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            CameraError::Encode(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    std::fs::write(path, &jpeg)
        .map_err(|e| CameraError::Encode(format!("failed to write {}: {e}", path.display())))?;
    tracing::info!(
        "Snapshot #{} written to {} ({} bytes)",
        buffer.sequence,
        path.display(),
        jpeg.len()
    );
    Ok(jpeg.len())
}
