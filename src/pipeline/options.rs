use std::sync::atomic::{AtomicBool, Ordering};

/// Per-tick snapshot of the processing toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessingOptions {
    pub grayscale: bool,
    pub overlay: bool,
}

/// Lock-free toggles written by the controls and read once per tick by the
/// capture worker.
///
/// Relaxed ordering is enough: a toggle may take effect one tick late.
#[derive(Debug, Default)]
pub struct ProcessingToggles {
    grayscale: AtomicBool,
    overlay: AtomicBool,
}

impl ProcessingToggles {
    pub fn new(initial: ProcessingOptions) -> Self {
        Self {
            grayscale: AtomicBool::new(initial.grayscale),
            overlay: AtomicBool::new(initial.overlay),
        }
    }

    pub fn set_grayscale(&self, enabled: bool) {
        self.grayscale.store(enabled, Ordering::Relaxed);
    }

    pub fn set_overlay(&self, enabled: bool) {
        self.overlay.store(enabled, Ordering::Relaxed);
    }

    /// Flip grayscale and return the new value.
    pub fn toggle_grayscale(&self) -> bool {
        !self.grayscale.fetch_xor(true, Ordering::Relaxed)
    }

    /// Flip overlay and return the new value.
    pub fn toggle_overlay(&self) -> bool {
        !self.overlay.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ProcessingOptions {
        ProcessingOptions {
            grayscale: self.grayscale.load(Ordering::Relaxed),
            overlay: self.overlay.load(Ordering::Relaxed),
        }
    }
}
