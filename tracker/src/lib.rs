#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(
    missing_debug_implementations,
    clippy::explicit_iter_loop,
    clippy::use_self,
    clippy::clone_on_ref_ptr,
    clippy::future_not_send
)]

//! Primitives the shared scheduler builds on: a FIFO, cancellation-aware
//! concurrency limiter and the mutable progress record attached to
//! long-running jobs.

mod progress;
mod semaphore;

pub use progress::{JobProgress, JobStatus};
pub use semaphore::AsyncSemaphore;
