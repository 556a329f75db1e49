use crate::camera::error::Result;
use crate::pipeline::composite::{blend_bottom_right, WatermarkSlot};
use crate::pipeline::frame::Frame;
use crate::pipeline::options::ProcessingOptions;

/// Applies the enabled transforms to a captured frame.
///
/// Overlay always runs before grayscale: blending needs the three colour
/// channels that the grayscale step removes.
pub struct FrameProcessor {
    watermark: WatermarkSlot,
}

impl FrameProcessor {
    pub fn new(watermark: WatermarkSlot) -> Self {
        Self { watermark }
    }

    /// Transform `frame` according to `options`. Empty frames pass through.
    pub fn process(&mut self, mut frame: Frame, options: ProcessingOptions) -> Result<Frame> {
        if frame.is_empty() {
            return Ok(frame);
        }

        if options.overlay {
            if let Some(watermark) = self.watermark.get() {
                blend_bottom_right(&mut frame, watermark)?;
            }
        }

        if options.grayscale {
            frame.to_grayscale();
        }

        Ok(frame)
    }
}
