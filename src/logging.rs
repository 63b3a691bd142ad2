// src/logging.rs
use tracing_subscriber::EnvFilter;

/// Level directive used when `RUST_LOG` is not set
pub fn default_directive(verbose: bool, configured_level: &str) -> String {
    if verbose {
        "debug".to_string()
    } else if configured_level.trim().is_empty() {
        "info".to_string()
    } else {
        configured_level.trim().to_lowercase()
    }
}

/// Install the global fmt subscriber; later calls are no-ops
pub fn init_logging(verbose: bool, configured_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose, configured_level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(true, "warn"), "debug");
        assert_eq!(default_directive(false, "WARN"), "warn");
        assert_eq!(default_directive(false, " "), "info");
    }
}
