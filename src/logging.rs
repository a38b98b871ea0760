//! Logging setup shared by both binaries.
//!
//! All diagnostics go to stderr; stdout carries tool output only.

use tracing::Level;

/// Parse a verbosity name (`error`, `warn`, `info`, `debug`, `trace`) or a
/// number (0 = error .. 4 = trace).
pub fn parse_level(verbosity: &str) -> Option<Level> {
    match verbosity.trim().to_ascii_lowercase().as_str() {
        "error" | "0" => Some(Level::ERROR),
        "warn" | "warning" | "1" => Some(Level::WARN),
        "info" | "notice" | "2" => Some(Level::INFO),
        "debug" | "3" => Some(Level::DEBUG),
        "trace" | "4" => Some(Level::TRACE),
        _ => None,
    }
}

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(verbosity: &str) {
    let level = parse_level(verbosity).unwrap_or(Level::WARN);
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("WARNING"), Some(Level::WARN));
        assert_eq!(parse_level("4"), Some(Level::TRACE));
        assert_eq!(parse_level("chatty"), None);
    }
}
