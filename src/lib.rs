pub mod camera;
pub mod diagnostics;
pub mod host;
pub mod pipeline;
pub mod preview;
pub mod settings;

pub use camera::error::{CameraError, Result};
pub use camera::source::{source_factory, FrameSource, SourceFactory};
pub use camera::types::{DeviceId, Resolution, SourceKind};
pub use diagnostics::stats::DiagnosticSnapshot;
pub use pipeline::convert::{DisplayBuffer, PixelLayout};
pub use pipeline::frame::Frame;
pub use pipeline::options::{ProcessingOptions, ProcessingToggles};
pub use preview::controller::{CaptureConfig, CaptureController, CaptureState};
pub use preview::sink::{display_channel, ChannelSink, DisplayReceiver, DisplaySink};
pub use settings::types::ViewerSettings;

/// Install the tracing subscriber, defaulting to `info` when `RUST_LOG` is
/// unset or invalid.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Load settings and run the viewer until quit or Ctrl-C.
pub fn run() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let settings = settings::store::load_default()?;
    tracing::info!(
        "Starting camera viewer ({:?} source, {}x{})",
        settings.source,
        settings.width,
        settings.height
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(host::run_viewer(settings))?;

    tracing::info!("Camera viewer exited");
    Ok(())
}
