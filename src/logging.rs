//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the configured level. When a log directory is
//! configured, output is also written to a daily-rolling file through a
//! non-blocking writer; keep the returned guard alive until shutdown so
//! buffered lines are flushed.

use crate::config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Keeps the file writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    installed: bool,
    file: Option<WorkerGuard>,
}

impl LogGuard {
    /// False when another subscriber was already installed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn writes_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Install the global subscriber. Does nothing if one is already installed.
pub fn init(config: &LoggingConfig) -> LogGuard {
    let (file_layer, guard) = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt::layer())
        .with(file_layer)
        .try_init();

    match installed {
        Ok(()) => LogGuard {
            installed: true,
            file: guard,
        },
        Err(_) => {
            tracing::debug!("Tracing subscriber already installed, keeping it");
            LogGuard {
                installed: false,
                file: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            directory: Some(dir.path().to_path_buf()),
            ..LoggingConfig::default()
        };
        let guard = init(&config);
        assert!(guard.is_installed());
        assert!(guard.writes_file());

        // The second one finds a subscriber in place and attaches no file.
        let other = tempfile::tempdir().unwrap();
        let second = init(&LoggingConfig {
            directory: Some(other.path().to_path_buf()),
            ..LoggingConfig::default()
        });
        assert!(!second.is_installed());
        assert!(!second.writes_file());
    }
}
