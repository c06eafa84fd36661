//! Re-exports the `tracing` facade so every crate in the workspace logs
//! through a single, version-pinned entry point instead of depending on
//! `tracing` directly.

pub use tracing;
