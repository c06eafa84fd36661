//! Installs a single `tracing-subscriber` formatter for the process, so
//! every crate logging through `observability_deps::tracing` ends up on the
//! same sink with the same filter and format. One call, made once at
//! process startup before anything else touches the orchestrator.

#![warn(missing_debug_implementations)]

use observability_deps::tracing::Subscriber;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    EnvFilter, Layer, Registry,
};

#[cfg(feature = "clap")]
mod config;
#[cfg(feature = "clap")]
pub use config::LoggingConfig;

/// Output formats available to the process. `Pretty` is meant for a human
/// at a terminal; `Json` is meant for a log collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log format '{0}', expected 'pretty' or 'json'")]
    InvalidFormat(String),

    #[error("invalid log filter directive: {0}")]
    InvalidFilter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global subscriber is already installed")]
    AlreadyInstalled(#[from] observability_deps::tracing::subscriber::SetGlobalDefaultError),
}

/// Builds the fmt layer for the requested output format. Generic over the
/// base subscriber so it composes with whatever other layers a caller (e.g.
/// a future trace exporter) wants to add.
fn fmt_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::NONE)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
    }
}

/// Installs a global subscriber built from an `EnvFilter` directive string
/// (e.g. `"orchestrator=debug,info"`) and the given format. Call exactly
/// once per process, before the orchestrator or scheduler log anything.
pub fn install_global(filter_directives: &str, format: LogFormat) -> Result<(), Error> {
    let filter = EnvFilter::try_new(filter_directives)?;
    let subscriber = Registry::default().with(filter).with(fmt_layer(format));
    observability_deps::tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init().ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(LogFormat::from_str("pretty").unwrap(), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json").unwrap(), LogFormat::Json);
        assert!(LogFormat::from_str("xml").is_err());
    }
}
