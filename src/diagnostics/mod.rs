// Per-session capture statistics.

pub mod stats;
