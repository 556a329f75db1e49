//! Headless viewer host.
//!
//! Plays the role of the display context: owns the receiving end of the
//! display channel, keeps the newest frame on a [`PreviewSurface`] and maps
//! line commands from stdin onto the controller and processing toggles.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::camera::error::{CameraError, Result};
use crate::camera::source::source_factory;
use crate::pipeline::convert::DisplayBuffer;
use crate::pipeline::options::ProcessingToggles;
use crate::preview::compress::write_snapshot;
use crate::preview::controller::{CaptureController, CaptureState};
use crate::preview::sink::{display_channel, ChannelSink, DisplayReceiver};
use crate::settings::types::ViewerSettings;

/// A line command understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    Gray,
    Overlay,
    Snapshot,
    Stats,
    Quit,
}

impl Command {
    /// Parse one input line. Case and surrounding whitespace are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let command = match line.trim().to_ascii_lowercase().as_str() {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "toggle" | "t" => Self::Toggle,
            "gray" | "grey" | "grayscale" | "g" => Self::Gray,
            "overlay" | "logo" | "o" => Self::Overlay,
            "snapshot" | "snap" | "s" => Self::Snapshot,
            "stats" => Self::Stats,
            "quit" | "exit" | "q" => Self::Quit,
            _ => return None,
        };
        Some(command)
    }
}

/// Display-side state: the newest presented frame.
#[derive(Default)]
pub struct PreviewSurface {
    latest: Option<DisplayBuffer>,
    presented: u64,
    coalesced: u64,
}

impl PreviewSurface {
    /// Show `buffer`, noting how many older buffers were skipped to get here.
    pub fn present(&mut self, buffer: DisplayBuffer, coalesced: usize) {
        self.presented += 1;
        self.coalesced += coalesced as u64;
        self.latest = Some(buffer);
    }

    pub fn latest(&self) -> Option<&DisplayBuffer> {
        self.latest.as_ref()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

/// Controller plus display surface, driven by [`Command`]s.
pub struct Viewer {
    controller: CaptureController,
    surface: PreviewSurface,
    settings: ViewerSettings,
}

impl Viewer {
    pub fn new(controller: CaptureController, settings: ViewerSettings) -> Self {
        Self {
            controller,
            surface: PreviewSurface::default(),
            settings,
        }
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn surface(&self) -> &PreviewSurface {
        &self.surface
    }

    /// Take everything queued on the display channel, keeping the newest.
    pub fn present_pending(&mut self, receiver: &mut DisplayReceiver) {
        if let (Some(buffer), coalesced) = receiver.drain_latest() {
            self.surface.present(buffer, coalesced);
        }
    }

    /// Apply one command. Errors are logged; only `Quit` breaks.
    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Start => {
                if let Err(e) = self.controller.start() {
                    tracing::error!("Failed to start capture: {e}");
                }
            }
            Command::Stop => self.controller.stop(),
            Command::Toggle => match self.controller.toggle() {
                Ok(state) => tracing::info!("Capture {state:?}"),
                Err(e) => tracing::error!("Failed to start capture: {e}"),
            },
            Command::Gray => {
                let enabled = self.controller.toggles().toggle_grayscale();
                tracing::info!("Grayscale {}", if enabled { "on" } else { "off" });
            }
            Command::Overlay => {
                let enabled = self.controller.toggles().toggle_overlay();
                tracing::info!("Overlay {}", if enabled { "on" } else { "off" });
            }
            Command::Snapshot => {
                if let Err(e) = self.snapshot() {
                    tracing::warn!("Snapshot failed: {e}");
                }
            }
            Command::Stats => self.log_stats(),
            Command::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Write the newest presented frame to the configured snapshot path.
    pub fn snapshot(&self) -> Result<usize> {
        let buffer = self
            .surface
            .latest()
            .ok_or_else(|| CameraError::Encode("no frame presented yet".to_string()))?;
        write_snapshot(
            buffer,
            &self.settings.snapshot_path,
            self.settings.jpeg_quality,
        )
    }

    fn log_stats(&self) {
        let options = self.controller.toggles().snapshot();
        tracing::info!(
            state = ?self.controller.state(),
            grayscale = options.grayscale,
            overlay = options.overlay,
            presented = self.surface.presented(),
            coalesced = self.surface.coalesced(),
            "Viewer status"
        );
        if let Some(snapshot) = self.controller.diagnostics() {
            match serde_json::to_string(&snapshot) {
                Ok(json) => tracing::info!("Capture diagnostics: {json}"),
                Err(e) => tracing::warn!("Failed to serialise diagnostics: {e}"),
            }
        }
    }

    /// Stop capture, releasing the device.
    pub fn shutdown(&mut self) {
        if self.controller.state() == CaptureState::Running {
            tracing::info!("Stopping capture before exit");
        }
        self.controller.stop();
    }
}

/// Display channel honouring the configured display layout.
pub fn viewer_channel(settings: &ViewerSettings) -> (ChannelSink, DisplayReceiver) {
    let (sink, receiver) = display_channel();
    match settings.display_layout {
        Some(layout) => (sink.with_layout(layout), receiver),
        None => (sink, receiver),
    }
}

/// Run the viewer until `quit` or Ctrl-C.
///
/// Capture starts immediately; if the device cannot be opened the viewer
/// stays idle and `start` can be retried.
pub async fn run_viewer(settings: ViewerSettings) -> Result<()> {
    let (sink, mut frames) = viewer_channel(&settings);
    let toggles = Arc::new(ProcessingToggles::new(settings.initial_options()));
    let factory = source_factory(settings.source, settings.resolution());
    let controller =
        CaptureController::new(settings.capture_config(), factory, Arc::new(sink), toggles);
    let mut viewer = Viewer::new(controller, settings);

    tracing::info!("Commands: start, stop, toggle, gray, overlay, snapshot, stats, quit");
    let _ = viewer.handle(Command::Start);

    drive(
        &mut viewer,
        &mut frames,
        BufReader::new(tokio::io::stdin()),
        tokio::signal::ctrl_c(),
    )
    .await;

    viewer.shutdown();
    Ok(())
}

/// Present frames and apply line commands until `quit` or `shutdown`
/// completes.
///
/// `shutdown` is pinned once for the whole loop, so a signal that arrives
/// while a command is being handled is still seen on the next pass. After
/// the command stream ends only frames and `shutdown` are watched.
pub async fn drive<R, F>(
    viewer: &mut Viewer,
    frames: &mut DisplayReceiver,
    commands: R,
    shutdown: F,
) where
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    let mut lines = commands.lines();
    let mut commands_open = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(buffer) = frames.recv() => {
                viewer.surface.present(buffer, 0);
                viewer.present_pending(frames);
            }
            line = lines.next_line(), if commands_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match Command::parse(&line) {
                    Some(command) => {
                        if viewer.handle(command).is_break() {
                            break;
                        }
                    }
                    None => tracing::warn!("Unknown command '{}'", line.trim()),
                },
                Ok(None) => {
                    tracing::info!("stdin closed, press Ctrl-C to quit");
                    commands_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    commands_open = false;
                }
            },
            signal = &mut shutdown => {
                match signal {
                    Ok(()) => tracing::info!("Shutdown signal received"),
                    Err(e) => tracing::error!("Failed to listen for Ctrl-C: {e}"),
                }
                break;
            }
        }
    }
}
