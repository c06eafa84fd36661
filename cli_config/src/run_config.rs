use logging::LoggingConfig;
use std::path::PathBuf;

/// Arguments to the `run` subcommand: where to find configuration and the
/// two tunables that size the orchestrator's bounded channel and shared
/// scheduler.
#[derive(Debug, Clone, clap::Parser)]
pub struct RunConfig {
    /// Path to the TOML configuration file describing vaults, filters,
    /// routes, and retention policies.
    #[clap(long = "config-path", env = "CONFIG_PATH")]
    pub config_path: PathBuf,

    /// Capacity of the bounded ingest channel shared by every registered
    /// ingester.
    #[clap(long = "ingest-channel-size", env = "INGEST_CHANNEL_SIZE", default_value = "1000")]
    pub ingest_channel_size: usize,

    /// Maximum number of scheduler jobs (index builds, retention sweeps,
    /// transfers) allowed to run concurrently.
    #[clap(long = "scheduler-concurrency", env = "SCHEDULER_CONCURRENCY", default_value = "4")]
    pub scheduler_concurrency: usize,

    #[clap(flatten)]
    pub logging: LoggingConfig,
}
