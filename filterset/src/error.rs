use snafu::Snafu;

/// Errors raised while compiling a filter expression.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FilterError {
    #[snafu(display("invalid filter expression '{expr}': {reason}"))]
    InvalidFilter { expr: String, reason: String },
}
