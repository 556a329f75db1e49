use thiserror::Error;

/// Capture pipeline errors.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("frame read failed: {0}")]
    Read(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("watermark unavailable: {0}")]
    Watermark(String),

    #[error("watermark {watermark_width}x{watermark_height} does not fit frame {frame_width}x{frame_height}")]
    WatermarkTooLarge {
        watermark_width: u32,
        watermark_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("display conversion failed: {0}")]
    Conversion(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("capture worker failed to start: {0}")]
    Worker(String),

    #[error("settings error: {0}")]
    Settings(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;
