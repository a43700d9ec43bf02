//! Log setup.
//!
//! Writes to debug.log in the config directory since the TUI owns the
//! terminal in raw mode. `--debug` lowers the default level from warn to
//! debug; `RUST_LOG` overrides both.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "debug.log";

fn default_directive(debug: bool) -> &'static str {
    if debug { "domainsweep=debug" } else { "warn" }
}

/// Installs the global subscriber. Without a writable log file nothing is
/// recorded, since stderr is hidden behind the alternate screen.
pub fn init(config_dir: &Path, debug: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config_dir.join(LOG_FILE))
    else {
        return;
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init();

    if installed.is_ok() {
        tracing::info!(version = env!("CARGO_PKG_VERSION"), "session started");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "domainsweep=debug");
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        init(dir.path(), true);
        assert!(dir.path().join(LOG_FILE).exists());
    }
}
