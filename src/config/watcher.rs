//! Configuration file watcher for hot reload.
//!
//! Editors often replace a file instead of writing it in place, so the parent
//! directory is watched and events are filtered down to the config file.
//! Command-line overrides are applied to every reloaded file. Reloads that
//! fail to load or validate are logged and dropped; the gateway keeps its
//! current configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{apply_overrides, load_config, ConfigError, Overrides};
use crate::config::schema::GatewayConfig;

/// Watches the configuration file and publishes every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    reloader: Reloader,
}

impl ConfigWatcher {
    /// Create a watcher for `path`. `current` is the configuration the
    /// gateway is running with; a file event that reproduces it is ignored.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(
        path: &Path,
        current: &GatewayConfig,
        overrides: Overrides,
    ) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            reloader: Reloader::new(path.to_path_buf(), current, overrides, update_tx),
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let target = self.path.clone();
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &target) => reloader.reload(),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn touches(event: &Event, target: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == target.file_name())
}

/// Compare by serialized form; the schema has no PartialEq.
fn fingerprint(config: &GatewayConfig) -> String {
    toml::to_string(config).unwrap_or_default()
}

/// Loads the file, applies overrides and forwards the result unless it
/// matches the configuration in force.
struct Reloader {
    path: PathBuf,
    overrides: Overrides,
    tx: mpsc::UnboundedSender<GatewayConfig>,
    last: String,
}

impl Reloader {
    fn new(
        path: PathBuf,
        current: &GatewayConfig,
        overrides: Overrides,
        tx: mpsc::UnboundedSender<GatewayConfig>,
    ) -> Self {
        Self {
            path,
            overrides,
            tx,
            last: fingerprint(current),
        }
    }

    fn reload(&mut self) {
        match self.try_reload() {
            Ok(true) => tracing::info!(path = ?self.path, "Config file changed, reloading"),
            Ok(false) => tracing::debug!(path = ?self.path, "Config file touched, contents unchanged"),
            Err(e) => tracing::error!(error = %e, "Failed to reload config, keeping current configuration"),
        }
    }

    /// `Ok(true)` if a new configuration was published.
    fn try_reload(&mut self) -> Result<bool, ConfigError> {
        let config = apply_overrides(load_config(&self.path)?, &self.overrides)?;
        let next = fingerprint(&config);
        if next == self.last {
            return Ok(false);
        }
        self.last = next;
        Ok(self.tx.send(config).is_ok())
    }
}
