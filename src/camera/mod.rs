// Camera domain: device identity and frame sources.

pub mod dummy;
pub mod error;
pub mod source;
pub mod types;
#[cfg(all(feature = "v4l2", target_os = "linux"))]
pub mod v4l2;
