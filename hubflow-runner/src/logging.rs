//! Subscriber setup shared by the binaries.
//!
//! `RUST_LOG` wins when set. Otherwise the level is `info`, or `debug` with
//! `--verbose`. Production output drops ANSI colours and module targets.

use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    })
}

/// Install the global subscriber writing to stderr.
///
/// Calling this twice is harmless; the second call is ignored.
pub fn init(verbose: bool, production: bool) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(!production)
        .with_target(!production);

    let _ = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(layer)
        .try_init();
}

/// Install the global subscriber appending to `path`.
///
/// The dashboard owns the terminal, so its logs go to a file instead.
pub fn init_to_file(path: &Path, verbose: bool) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    let layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(filter(verbose))
        .with(layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic() {
        init(false, true);
        init(true, false);
    }

    #[test]
    fn file_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("hubflow.log");
        init_to_file(&path, false).unwrap();
        assert!(path.exists());
    }
}
