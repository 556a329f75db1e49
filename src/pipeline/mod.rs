// Frame pipeline: pixel buffers, watermark compositing, processing and
// display conversion.

pub mod composite;
pub mod convert;
pub mod frame;
pub mod options;
pub mod processor;
