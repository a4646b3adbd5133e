//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::PipelineConfig;
use crate::config::validation::validate_config;

type Override = Arc<dyn Fn(&mut PipelineConfig) + Send + Sync>;

/// A watcher that monitors the configuration file for changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<PipelineConfig>,
    apply_override: Option<Override>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<PipelineConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                update_tx,
                apply_override: None,
            },
            update_rx,
        )
    }

    /// Adjust every reloaded config before it is validated, e.g. to re-apply
    /// values that came from the command line.
    pub fn with_override(mut self, f: impl Fn(&mut PipelineConfig) + Send + Sync + 'static) -> Self {
        self.apply_override = Some(Arc::new(f));
        self
    }

    fn reload(path: &Path, apply_override: Option<&Override>) -> Result<PipelineConfig, ConfigError> {
        let mut config = read_config(path)?;
        if let Some(apply) = apply_override {
            apply(&mut config);
        }
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned handle must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let apply_override = self.apply_override.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "Config file change detected, reloading");
                        match Self::reload(&path, apply_override.as_ref()) {
                            Ok(new_config) => {
                                let _ = tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Failed to reload config, keeping current configuration"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}
