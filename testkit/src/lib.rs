//! In-memory fakes for every collaborator trait, the way `iox_tests` exists
//! purely to support other crates' tests in the teacher workspace: a
//! [`FakeChunkManager`], [`FakeIndexManager`], [`FakeQueryEngine`], a
//! programmable [`ScriptedIngester`], and a [`StaticConfigLoader`].

#![warn(missing_debug_implementations, clippy::clone_on_ref_ptr)]

mod chunk_manager;
mod config_loader;
mod ingester;
mod index_manager;
mod query_engine;

pub use chunk_manager::{FakeChunkManager, RotationPolicy};
pub use config_loader::StaticConfigLoader;
pub use ingester::ScriptedIngester;
pub use index_manager::FakeIndexManager;
pub use query_engine::FakeQueryEngine;
