use std::sync::Arc;

use crate::camera::dummy::DummySource;
use crate::camera::error::Result;
use crate::camera::types::{DeviceId, Resolution, SourceKind};
use crate::pipeline::frame::Frame;

/// A capture device that yields RGB frames.
///
/// Implemented by the synthetic test-pattern source and, on Linux with the
/// `v4l2` feature, by a V4L2 device. A source is driven by exactly one
/// capture worker at a time.
pub trait FrameSource: Send {
    /// Acquire the device. Failure is not an error: the source simply stays
    /// closed and [`FrameSource::is_opened`] reports `false`.
    fn open(&mut self, device: DeviceId);

    /// Whether the device is currently acquired.
    fn is_opened(&self) -> bool;

    /// Block until the next frame is available.
    ///
    /// Returns [`Frame::empty`] when the device had no data to deliver.
    fn read(&mut self) -> Result<Frame>;

    /// Return the device to the system. Idempotent, and safe when `open`
    /// never succeeded.
    fn release(&mut self);
}

/// Builds a fresh, unopened source for each capture session.
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn FrameSource> + Send + Sync>;

/// Factory for the configured source kind.
pub fn source_factory(kind: SourceKind, resolution: Resolution) -> SourceFactory {
    let kind = resolve_kind(kind);
    tracing::info!(
        "Using {kind:?} frame source at {}x{}",
        resolution.width,
        resolution.height
    );

    #[cfg(all(feature = "v4l2", target_os = "linux"))]
    {
        if kind == SourceKind::V4l2 {
            return Arc::new(move || {
                Box::new(crate::camera::v4l2::V4l2Source::new(resolution)) as Box<dyn FrameSource>
            });
        }
    }

    Arc::new(move || Box::new(DummySource::new(resolution)) as Box<dyn FrameSource>)
}

/// Resolve `Auto` (and unavailable backends) to a concrete source kind.
///
/// When `DUMMY_CAMERA=1` is set, the synthetic source is used regardless of
/// the configured kind.
pub fn resolve_kind(kind: SourceKind) -> SourceKind {
    if DummySource::is_enabled() {
        return SourceKind::Dummy;
    }
    match kind {
        SourceKind::Dummy => SourceKind::Dummy,
        SourceKind::Auto | SourceKind::V4l2 if v4l2_available() => SourceKind::V4l2,
        SourceKind::V4l2 => {
            tracing::warn!("V4L2 support not compiled in, falling back to the dummy camera");
            SourceKind::Dummy
        }
        SourceKind::Auto => SourceKind::Dummy,
    }
}

fn v4l2_available() -> bool {
    cfg!(all(feature = "v4l2", target_os = "linux"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_kind_always_resolves_to_dummy() {
        assert_eq!(resolve_kind(SourceKind::Dummy), SourceKind::Dummy);
    }

    #[test]
    #[cfg(not(all(feature = "v4l2", target_os = "linux")))]
    fn kinds_fall_back_to_dummy_without_v4l2() {
        assert_eq!(resolve_kind(SourceKind::Auto), SourceKind::Dummy);
        assert_eq!(resolve_kind(SourceKind::V4l2), SourceKind::Dummy);
    }

    #[test]
    fn dummy_factory_builds_unopened_sources() {
        let factory = source_factory(SourceKind::Dummy, Resolution::new(32, 24));
        let mut source = factory();
        assert!(!source.is_opened());
        source.open(DeviceId::new(0));
        assert!(source.is_opened());
        let frame = source.read().unwrap();
        assert_eq!(frame.width(), 32);
        assert_eq!(frame.height(), 24);
        source.release();
    }

    #[test]
    fn factory_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SourceFactory>();
    }
}
