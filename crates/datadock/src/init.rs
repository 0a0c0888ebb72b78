//! Tracing initialization for binaries and integration tests.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber once: env-filtered (`RUST_LOG`,
/// default `info`) with `log` records bridged in. Safe to call repeatedly.
pub fn init_tracing() {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let _ = tracing_log::LogTracer::init();
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
