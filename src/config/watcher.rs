//! Configuration file watcher for hot reload.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the config keep
//! triggering reloads.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{log_warnings, read_config, ConfigError};
use crate::config::schema::ObservabilityConfig;

/// Result of re-reading the config file.
#[derive(Debug)]
pub enum ReloadOutcome {
    Changed(ObservabilityConfig),
    /// Parsed fine but equal to the last forwarded config.
    Unchanged,
    Failed(ConfigError),
}

/// Re-reads one config file and remembers the last config it handed out.
pub struct ConfigReloader {
    path: PathBuf,
    last: ObservabilityConfig,
}

impl ConfigReloader {
    pub fn new(path: &Path, current: ObservabilityConfig) -> Self {
        Self {
            path: path.to_path_buf(),
            last: current,
        }
    }

    pub fn reload(&mut self) -> ReloadOutcome {
        match read_config(&self.path) {
            Ok((config, _)) if config == self.last => ReloadOutcome::Unchanged,
            Ok((config, warnings)) => {
                log_warnings(&warnings);
                self.last = config.clone();
                ReloadOutcome::Changed(config)
            }
            Err(e) => ReloadOutcome::Failed(e),
        }
    }

    /// Whether `event` writes, creates or renames the watched file.
    pub fn is_relevant(&self, event: &Event) -> bool {
        if !(event.kind.is_modify() || event.kind.is_create()) {
            return false;
        }
        let Some(name) = self.path.file_name() else {
            return false;
        };
        event.paths.iter().any(|p| p.file_name() == Some(name))
    }
}

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    reloader: ConfigReloader,
    update_tx: mpsc::UnboundedSender<ObservabilityConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, starting from the config already applied.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(
        path: &Path,
        current: ObservabilityConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ObservabilityConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                reloader: ConfigReloader::new(path, current),
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            mut reloader,
            update_tx,
        } = self;
        let dir = watch_dir(&reloader.path);
        let path = reloader.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if reloader.is_relevant(&event) => match reloader.reload() {
                    ReloadOutcome::Changed(config) => {
                        tracing::info!("Config file changed, applying");
                        let _ = update_tx.send(config);
                    }
                    ReloadOutcome::Unchanged => {
                        tracing::debug!("Config file touched without changes");
                    }
                    ReloadOutcome::Failed(e) => {
                        tracing::error!(
                            "Failed to reload config: {}. Keeping current configuration.",
                            e
                        );
                    }
                },
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
