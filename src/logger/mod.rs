//! Diagnostics: `tracing` subscriber setup and CI workflow commands.

pub mod workflow;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Filter directive variable, e.g. `CI_ANALYTICS_LOG=ci_analytics=debug`.
pub const LOG_FILTER_ENV: &str = "CI_ANALYTICS_LOG";

/// Install the process-wide subscriber writing plain lines.
///
/// `warn` and `error` events go to stderr, everything else to stdout. CI
/// runners timestamp every line already, so events carry only level and
/// message. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.with_max_level(Level::WARN).or_else(std::io::stdout))
        .with_target(false)
        .without_time()
        .with_ansi(false)
        .try_init();
}
