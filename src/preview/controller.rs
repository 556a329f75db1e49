use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::capture::{CaptureSession, TICK_INTERVAL};
use super::sink::DisplaySink;
use crate::camera::error::{CameraError, Result};
use crate::camera::source::SourceFactory;
use crate::camera::types::DeviceId;
use crate::diagnostics::stats::DiagnosticSnapshot;
use crate::pipeline::composite::{WatermarkSlot, DEFAULT_WATERMARK_PATH};
use crate::pipeline::options::ProcessingToggles;
use crate::pipeline::processor::FrameProcessor;

/// Lifecycle state of a [`CaptureController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    Idle,
    Running,
}

/// Static inputs for every session the controller starts.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: DeviceId,
    pub watermark_path: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: DeviceId::default(),
            watermark_path: PathBuf::from(DEFAULT_WATERMARK_PATH),
        }
    }
}

/// Owns the Idle/Running lifecycle of the capture pipeline.
///
/// Each `start` opens a fresh source and spawns a capture session; `stop`
/// tears the session down and releases the device. The controller can be
/// restarted any number of times and stops itself when dropped.
pub struct CaptureController {
    config: CaptureConfig,
    factory: SourceFactory,
    sink: Arc<dyn DisplaySink>,
    toggles: Arc<ProcessingToggles>,
    session: Option<CaptureSession>,
}

impl CaptureController {
    pub fn new(
        config: CaptureConfig,
        factory: SourceFactory,
        sink: Arc<dyn DisplaySink>,
        toggles: Arc<ProcessingToggles>,
    ) -> Self {
        Self {
            config,
            factory,
            sink,
            toggles,
            session: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        if self.session.is_some() {
            CaptureState::Running
        } else {
            CaptureState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == CaptureState::Running
    }

    /// The toggles read by the capture worker each tick.
    pub fn toggles(&self) -> &Arc<ProcessingToggles> {
        &self.toggles
    }

    /// Open the device and start capturing. No-op when already running.
    ///
    /// Returns [`CameraError::DeviceUnavailable`] when the device cannot be
    /// opened; the controller stays idle and `start` may be retried.
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            tracing::debug!("capture already running on {}", self.config.device);
            return Ok(());
        }

        let device = self.config.device;
        let mut source = (self.factory)();
        source.open(device);
        if !source.is_opened() {
            source.release();
            tracing::warn!("camera {device} could not be opened");
            return Err(CameraError::DeviceUnavailable(device.to_string()));
        }

        let processor = FrameProcessor::new(WatermarkSlot::new(&self.config.watermark_path));
        let session = CaptureSession::start(
            device,
            source,
            processor,
            Arc::clone(&self.sink),
            Arc::clone(&self.toggles),
            TICK_INTERVAL,
        )?;
        self.session = Some(session);
        tracing::info!("capture started on {device}");
        Ok(())
    }

    /// Stop capturing and release the device. No-op when idle.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }

    /// Start when idle, stop when running. Returns the resulting state.
    pub fn toggle(&mut self) -> Result<CaptureState> {
        match self.state() {
            CaptureState::Idle => self.start()?,
            CaptureState::Running => self.stop(),
        }
        Ok(self.state())
    }

    /// Diagnostics of the running session, if any.
    pub fn diagnostics(&self) -> Option<DiagnosticSnapshot> {
        self.session.as_ref().map(CaptureSession::diagnostics)
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::dummy::DummySource;
    use crate::camera::source::FrameSource;
    use crate::camera::types::Resolution;
    use crate::pipeline::convert::PixelLayout;
    use crate::pipeline::frame::Frame;
    use crate::pipeline::options::ProcessingOptions;
    use crate::preview::sink::{display_channel, DisplayReceiver};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Counts opens/releases of every source the factory builds.
    #[derive(Default)]
    struct Counters {
        opens: AtomicUsize,
        releases: AtomicUsize,
    }

    struct CountingSource {
        inner: DummySource,
        counters: Arc<Counters>,
    }

    impl FrameSource for CountingSource {
        fn open(&mut self, device: DeviceId) {
            self.counters.opens.fetch_add(1, Ordering::SeqCst);
            self.inner.open(device);
        }

        fn is_opened(&self) -> bool {
            self.inner.is_opened()
        }

        fn read(&mut self) -> Result<Frame> {
            self.inner.read()
        }

        fn release(&mut self) {
            if self.inner.is_opened() {
                self.counters.releases.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.release();
        }
    }

    fn counting_factory(counters: &Arc<Counters>) -> SourceFactory {
        let counters = Arc::clone(counters);
        Arc::new(move || {
            Box::new(CountingSource {
                inner: DummySource::new(Resolution::new(32, 24)),
                counters: Arc::clone(&counters),
            }) as Box<dyn FrameSource>
        })
    }

    fn controller_with(
        device: DeviceId,
        counters: &Arc<Counters>,
    ) -> (CaptureController, DisplayReceiver) {
        let (sink, receiver) = display_channel();
        let config = CaptureConfig {
            device,
            watermark_path: PathBuf::from("missing/watermark.png"),
        };
        let controller = CaptureController::new(
            config,
            counting_factory(counters),
            Arc::new(sink),
            Arc::new(ProcessingToggles::default()),
        );
        (controller, receiver)
    }

    fn wait_for_frames(receiver: &mut DisplayReceiver, count: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = 0;
        while Instant::now() < deadline && seen < count {
            let (latest, coalesced) = receiver.drain_latest();
            if latest.is_some() {
                seen += 1 + coalesced;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        seen
    }

    #[test]
    fn new_controller_is_idle() {
        let counters = Arc::default();
        let (controller, _rx) = controller_with(DeviceId::new(0), &counters);
        assert_eq!(controller.state(), CaptureState::Idle);
        assert!(controller.diagnostics().is_none());
    }

    #[test]
    fn stop_on_idle_controller_is_noop() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, _rx) = controller_with(DeviceId::new(0), &counters);
        controller.stop();
        controller.stop();
        assert_eq!(controller.state(), CaptureState::Idle);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_produces_frames_and_stop_releases_device() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, mut rx) = controller_with(DeviceId::new(0), &counters);

        controller.start().unwrap();
        assert_eq!(controller.state(), CaptureState::Running);
        assert!(wait_for_frames(&mut rx, 3) >= 3);

        controller.stop();
        assert_eq!(controller.state(), CaptureState::Idle);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unavailable_device_keeps_controller_idle() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, _rx) = controller_with(DeviceId::new(7), &counters);

        let result = controller.start();
        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));
        assert_eq!(controller.state(), CaptureState::Idle);

        // Retrying is allowed and fails the same way
        assert!(controller.start().is_err());
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_stop_start_resumes_frames() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, mut rx) = controller_with(DeviceId::new(0), &counters);

        controller.start().unwrap();
        assert!(wait_for_frames(&mut rx, 2) >= 2);
        controller.stop();
        // Discard anything left over from the first session
        rx.drain_latest();

        controller.start().unwrap();
        assert_eq!(controller.state(), CaptureState::Running);
        assert!(wait_for_frames(&mut rx, 2) >= 2);
        controller.stop();

        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn start_while_running_is_noop() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, _rx) = controller_with(DeviceId::new(0), &counters);
        controller.start().unwrap();
        controller.start().unwrap();
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);
        controller.stop();
    }

    #[test]
    fn toggle_alternates_between_states() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, _rx) = controller_with(DeviceId::new(0), &counters);
        assert_eq!(controller.toggle().unwrap(), CaptureState::Running);
        assert_eq!(controller.toggle().unwrap(), CaptureState::Idle);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_controller_releases_device() {
        let counters: Arc<Counters> = Arc::default();
        {
            let (mut controller, _rx) = controller_with(DeviceId::new(0), &counters);
            controller.start().unwrap();
        }
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn grayscale_toggle_switches_published_layout() {
        let counters: Arc<Counters> = Arc::default();
        let (mut controller, mut rx) = controller_with(DeviceId::new(0), &counters);
        controller.start().unwrap();
        assert!(wait_for_frames(&mut rx, 1) >= 1);

        controller.toggles().set_grayscale(true);
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut layout = None;
        while Instant::now() < deadline {
            if let (Some(buffer), _) = rx.drain_latest() {
                layout = Some(buffer.layout);
                if buffer.layout == PixelLayout::Gray8 {
                    break;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        controller.stop();
        assert_eq!(layout, Some(PixelLayout::Gray8));
    }

    #[test]
    fn overlay_uses_watermark_asset_from_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 200, 200]))
            .save(&path)
            .unwrap();

        let (sink, mut rx) = display_channel();
        let config = CaptureConfig {
            device: DeviceId::new(0),
            watermark_path: path,
        };
        let toggles = Arc::new(ProcessingToggles::new(ProcessingOptions {
            grayscale: false,
            overlay: true,
        }));
        let factory: SourceFactory = Arc::new(|| {
            Box::new(DummySource::new(Resolution::new(8, 8))) as Box<dyn FrameSource>
        });
        let mut controller = CaptureController::new(config, factory, Arc::new(sink), toggles);
        controller.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut buffer = None;
        while buffer.is_none() && Instant::now() < deadline {
            buffer = rx.drain_latest().0;
            std::thread::sleep(Duration::from_millis(10));
        }
        controller.stop();

        let buffer = buffer.unwrap();
        let plain = DummySource::test_pattern(Resolution::new(8, 8), buffer.sequence);
        // Bottom-right pixel carries the watermark: blue 128 + 140 saturates
        let last = buffer.pixels.len() - 1;
        assert_eq!(buffer.pixels[last], 255);
        assert_eq!(plain.data()[last], 128);
        // Top-left pixel is outside the 4x4 region
        assert_eq!(buffer.pixels[..3], plain.data()[..3]);
    }

    #[test]
    fn missing_watermark_is_retried_on_next_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("late.png");
        let (sink, mut rx) = display_channel();
        let config = CaptureConfig {
            device: DeviceId::new(0),
            watermark_path: path.clone(),
        };
        let toggles = Arc::new(ProcessingToggles::new(ProcessingOptions {
            grayscale: false,
            overlay: true,
        }));
        let factory: SourceFactory = Arc::new(|| {
            Box::new(DummySource::new(Resolution::new(8, 8))) as Box<dyn FrameSource>
        });
        let mut controller = CaptureController::new(config, factory, Arc::new(sink), toggles);

        let next_buffer = |rx: &mut DisplayReceiver| {
            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                if let (Some(buffer), _) = rx.drain_latest() {
                    return Some(buffer);
                }
                if Instant::now() > deadline {
                    return None;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        };

        // Asset missing: frames pass through untouched
        controller.start().unwrap();
        let plain = next_buffer(&mut rx).unwrap();
        controller.stop();
        rx.drain_latest();
        let last = plain.pixels.len() - 1;
        assert_eq!(plain.pixels[last], 128);

        // Asset appears: the next session picks it up
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 200, 200]))
            .save(&path)
            .unwrap();
        controller.start().unwrap();
        let marked = next_buffer(&mut rx).unwrap();
        controller.stop();
        assert_eq!(marked.pixels[last], 255);
    }
}
