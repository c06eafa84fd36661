use crate::{install_global, Error, LogFormat};
use std::str::FromStr;

/// CLI-visible logging knobs, merged into `vaultd run`'s argument struct via
/// `#[clap(flatten)]`.
#[derive(Debug, Clone, clap::Args)]
pub struct LoggingConfig {
    /// `tracing-subscriber` EnvFilter directive string, e.g.
    /// `"orchestrator=debug,scheduler=debug,info"`.
    #[clap(long = "log-filter", env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,

    /// Output format: `pretty` for a terminal, `json` for a collector.
    #[clap(long = "log-format", env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

impl LoggingConfig {
    pub fn install(&self) -> Result<(), Error> {
        let format = LogFormat::from_str(&self.log_format)?;
        install_global(&self.log_filter, format)
    }
}
