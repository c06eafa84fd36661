//! `clap`-derived argument blocks shared between the `vaultd` binary and the
//! crate's integration tests, one block per concern, composed with
//! `#[clap(flatten)]`.

#![warn(missing_debug_implementations)]

mod run_config;

pub use run_config::RunConfig;
