// Preview pipeline: capture worker, lifecycle control, display handoff and
// snapshot encoding.

pub mod capture;
pub mod compress;
pub mod controller;
pub mod sink;
