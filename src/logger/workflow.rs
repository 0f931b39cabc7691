//! GitHub Actions workflow commands used to report step failure.

use std::io::Write;

/// Escape command data the way the runner expects (`%`, CR, LF).
#[must_use]
pub fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Render a workflow command line without a trailing newline.
#[must_use]
pub fn command(name: &str, message: &str) -> String {
    format!("::{name}::{}", escape_data(message))
}

/// Mark the step failed with `message` as the failure reason.
///
/// The caller is responsible for exiting non-zero.
pub fn set_failed(out: &mut impl Write, message: &str) -> std::io::Result<()> {
    writeln!(out, "{}", command("error", message))?;
    out.flush()
}
