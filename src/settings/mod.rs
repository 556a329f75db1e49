// Viewer settings: read-only JSON configuration.

pub mod store;
pub mod types;
