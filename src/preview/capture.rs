use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SendError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::camera::error::{CameraError, Result};
use crate::camera::source::FrameSource;
use crate::camera::types::DeviceId;
use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};
use crate::pipeline::convert::to_display;
use crate::pipeline::options::ProcessingToggles;
use crate::pipeline::processor::FrameProcessor;
use crate::preview::sink::DisplaySink;

/// Fixed capture cadence (~30 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(33);

/// Consecutive failures between repeated error log lines.
const FAILURE_LOG_EVERY: u64 = 30;

/// Wall-clock tick cadence.
///
/// Deadlines sit on a fixed grid (`start + n * interval`) rather than being
/// chained to tick completion. A tick that overruns by less than one
/// interval makes the next fire run immediately; longer overruns drop the
/// missed slots and re-anchor on the grid.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    interval: Duration,
    next: Instant,
}

impl TickSchedule {
    /// First fire is due at `start`.
    pub fn new(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            next: start,
        }
    }

    pub fn next_deadline(&self) -> Instant {
        self.next
    }

    /// Move past the fire that just completed at `now`.
    ///
    /// Returns the number of grid slots dropped because the tick overran.
    pub fn advance(&mut self, now: Instant) -> u64 {
        let mut next = self.next + self.interval;
        let mut skipped = 0;
        if now > next {
            let behind = (now - next).as_nanos();
            let missed = behind / self.interval.as_nanos().max(1);
            if missed > 0 {
                skipped = u64::try_from(missed).unwrap_or(u64::MAX);
                let missed = u32::try_from(missed).unwrap_or(u32::MAX);
                next += self.interval * missed;
            }
        }
        self.next = next;
        skipped
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Wait for a worker thread, logging a panic if it died with one.
/// Returns `true` when the worker exited cleanly.
fn join_worker(device: DeviceId, handle: JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(panic) => {
            warn!(
                "capture worker for {device} panicked: {}",
                panic_message(panic.as_ref())
            );
            false
        }
    }
}

/// Owns an opened source and releases it when dropped.
///
/// Whoever ends up holding the source last (controller or a detached
/// worker) releases the device, so it cannot leak on a slow shutdown.
struct ReleaseOnDrop(Box<dyn FrameSource>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Published,
    Empty,
    Failed,
}

/// Everything the capture worker owns for the lifetime of a session.
struct CaptureLoop {
    device: DeviceId,
    source: ReleaseOnDrop,
    processor: FrameProcessor,
    sink: Arc<dyn DisplaySink>,
    toggles: Arc<ProcessingToggles>,
    stats: Arc<Mutex<DiagnosticStats>>,
    sequence: u64,
    consecutive_failures: u64,
}

impl CaptureLoop {
    /// One read → process → convert → publish pass.
    fn tick(&mut self) -> Result<TickOutcome> {
        let options = self.toggles.snapshot();

        let frame = self.source.0.read()?;
        if frame.is_empty() {
            return Ok(TickOutcome::Empty);
        }

        let frame = self.processor.process(frame, options)?;
        let layout = self.sink.layout_for(frame.channels());
        let buffer = to_display(frame, layout, self.sequence)?;
        let bytes = buffer.pixels.len();

        self.sink.publish(buffer);
        self.sequence += 1;
        self.stats.lock().record_frame(bytes);
        Ok(TickOutcome::Published)
    }

    /// Run a tick, absorbing errors and panics so the loop keeps going.
    fn fire(&mut self) -> TickOutcome {
        let outcome = match catch_unwind(AssertUnwindSafe(|| self.tick())) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                self.log_failure(&e.to_string());
                TickOutcome::Failed
            }
            Err(panic) => {
                let msg = panic_message(panic.as_ref());
                self.log_failure(&format!("tick panicked: {msg}"));
                TickOutcome::Failed
            }
        };

        match outcome {
            TickOutcome::Published => {
                if self.consecutive_failures > 0 {
                    info!(
                        "capture on {} recovered after {} failed tick(s)",
                        self.device, self.consecutive_failures
                    );
                }
                self.consecutive_failures = 0;
            }
            TickOutcome::Empty => {
                debug!("empty frame from {}", self.device);
                self.stats.lock().record_empty();
            }
            TickOutcome::Failed => self.stats.lock().record_failure(),
        }
        outcome
    }

    fn log_failure(&mut self, msg: &str) {
        if self.consecutive_failures % FAILURE_LOG_EVERY == 0 {
            error!("capture tick failed on {}: {msg}", self.device);
        }
        self.consecutive_failures += 1;
    }

    /// Tick on the schedule until a stop is requested, then hand the source
    /// back through `done`. If nobody is waiting any more, release it here.
    fn run(
        mut self,
        interval: Duration,
        stop: Receiver<()>,
        done: Sender<ReleaseOnDrop>,
        running: Arc<AtomicBool>,
    ) {
        running.store(true, Ordering::Release);
        let mut schedule = TickSchedule::new(Instant::now(), interval);

        loop {
            let wait = schedule
                .next_deadline()
                .saturating_duration_since(Instant::now());
            match stop.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            let started = Instant::now();
            self.fire();
            let finished = Instant::now();

            let skipped = schedule.advance(finished);
            let mut stats = self.stats.lock();
            stats.record_tick_duration((finished - started).as_micros() as u64);
            if skipped > 0 {
                stats.record_skipped(skipped);
                debug!("tick overran on {}, dropped {skipped} fire(s)", self.device);
            }
        }

        running.store(false, Ordering::Release);
        let device = self.device;
        if let Err(SendError(source)) = done.send(self.source) {
            drop(source);
            warn!("capture worker for {device} released the device after a late shutdown");
        }
    }
}

/// Active capture session for a single camera.
pub struct CaptureSession {
    device: DeviceId,
    interval: Duration,
    running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    done_rx: Option<Receiver<ReleaseOnDrop>>,
    thread: Option<JoinHandle<()>>,
    stats: Arc<Mutex<DiagnosticStats>>,
}

impl CaptureSession {
    /// Spawn the capture worker for an already-opened source.
    ///
    /// The worker fires every `interval`, reading from `source`, running
    /// frames through `processor` and publishing to `sink`.
    pub fn start(
        device: DeviceId,
        source: Box<dyn FrameSource>,
        processor: FrameProcessor,
        sink: Arc<dyn DisplaySink>,
        toggles: Arc<ProcessingToggles>,
        interval: Duration,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(DiagnosticStats::new()));
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let capture = CaptureLoop {
            device,
            source: ReleaseOnDrop(source),
            processor,
            sink,
            toggles,
            stats: Arc::clone(&stats),
            sequence: 0,
            consecutive_failures: 0,
        };

        let running_clone = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name(format!("capture-{device}"))
            .spawn(move || {
                info!("capture thread starting for {device}");
                capture.run(interval, stop_rx, done_tx, running_clone);
                info!("capture thread exiting for {device}");
            })
            .map_err(|e| CameraError::Worker(e.to_string()))?;

        Ok(Self {
            device,
            interval,
            running,
            stop_tx: Some(stop_tx),
            done_rx: Some(done_rx),
            thread: Some(thread),
            stats,
        })
    }

    /// Check if the capture worker is still ticking.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Take a snapshot of diagnostic stats for this session.
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    /// Stop the worker and release the device. Idempotent.
    ///
    /// Waits at most one tick interval for an in-flight tick. If the worker
    /// is still busy after that, it is detached and releases the device
    /// itself once its tick returns.
    pub fn stop(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        // The worker may already be gone; dropping the sender also wakes it.
        let _ = stop_tx.send(());
        drop(stop_tx);

        let done_rx = self.done_rx.take();
        let returned = done_rx.as_ref().map(|rx| rx.recv_timeout(self.interval));
        match returned {
            Some(Ok(source)) => {
                // Releases the device
                drop(source);
                if let Some(handle) = self.thread.take() {
                    join_worker(self.device, handle);
                }
                info!("capture stopped on {}", self.device);
            }
            Some(Err(RecvTimeoutError::Timeout)) => {
                warn!(
                    "capture worker for {} did not stop within {}ms, releasing in background",
                    self.device,
                    self.interval.as_millis()
                );
                // Dropping the receiver makes the worker release on exit.
                drop(done_rx);
                let _detached = self.thread.take();
            }
            Some(Err(RecvTimeoutError::Disconnected)) | None => {
                // Worker died without handing the source back; its guard
                // released the device during unwinding.
                if let Some(handle) = self.thread.take() {
                    join_worker(self.device, handle);
                }
                warn!("capture worker for {} exited unexpectedly", self.device);
            }
        }
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
