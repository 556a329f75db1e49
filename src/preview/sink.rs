//! Display handoff: the only place frames cross from the capture worker to
//! the display context.

use tokio::sync::mpsc;

use crate::pipeline::convert::{DisplayBuffer, PixelLayout};

/// A surface that renders published frames.
///
/// `publish` is called from the capture worker and must not block: sinks
/// marshal the buffer onto their own execution context.
pub trait DisplaySink: Send + Sync {
    /// Hand a display-ready buffer to the sink.
    fn publish(&self, buffer: DisplayBuffer);

    /// Layout this sink wants for a frame with `channels` channels.
    fn layout_for(&self, channels: u8) -> PixelLayout {
        PixelLayout::native(channels)
    }
}

/// Sink that posts buffers into an unbounded channel.
///
/// Posting never blocks and preserves order. A closed receiver (display
/// gone) silently discards buffers.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<DisplayBuffer>,
    layout: Option<PixelLayout>,
}

impl ChannelSink {
    /// Force every buffer into `layout` instead of the frame's native one.
    pub fn with_layout(mut self, layout: PixelLayout) -> Self {
        self.layout = Some(layout);
        self
    }
}

impl DisplaySink for ChannelSink {
    fn publish(&self, buffer: DisplayBuffer) {
        if self.tx.send(buffer).is_err() {
            tracing::debug!("Display receiver closed, dropping frame");
        }
    }

    fn layout_for(&self, channels: u8) -> PixelLayout {
        self.layout.unwrap_or_else(|| PixelLayout::native(channels))
    }
}

/// Display-side end of a [`ChannelSink`].
pub struct DisplayReceiver {
    rx: mpsc::UnboundedReceiver<DisplayBuffer>,
}

impl DisplayReceiver {
    /// Wait for the next buffer. Returns `None` once every sink is dropped.
    pub async fn recv(&mut self) -> Option<DisplayBuffer> {
        self.rx.recv().await
    }

    /// Drain everything queued and keep only the newest buffer.
    ///
    /// Returns the newest buffer (if any) and how many older ones were
    /// coalesced away.
    pub fn drain_latest(&mut self) -> (Option<DisplayBuffer>, usize) {
        let mut latest = None;
        let mut coalesced = 0;
        while let Ok(buffer) = self.rx.try_recv() {
            if latest.replace(buffer).is_some() {
                coalesced += 1;
            }
        }
        (latest, coalesced)
    }
}

/// Create a connected sink/receiver pair.
pub fn display_channel() -> (ChannelSink, DisplayReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx, layout: None }, DisplayReceiver { rx })
}
