//! Вспомогательные модули

pub mod workspace;

pub use workspace::{JobManifest, JobWorkspace};
