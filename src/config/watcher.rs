//! Configuration file watcher for hot reload.
//!
//! Only the endpoint list is applied live; every other field is fixed when
//! the client is built.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use crate::config::loader::load_config;
use crate::config::schema::ClientConfig;
use crate::dispatch::Client;

/// Watches a config file and emits every valid reload.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ClientConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ClientConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (Self { path: path.to_path_buf(), update_tx }, update_rx)
    }

    /// Start watching. Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, update_tx } = self;
        let reload_path = path.clone();

        let handler = move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(error = %e, "Config watch error");
                    return;
                }
            };
            if !(event.kind.is_modify() || event.kind.is_create()) {
                return;
            }

            match load_config(&reload_path) {
                Ok(config) => {
                    tracing::info!(path = ?reload_path, endpoints = config.endpoints.len(), "Config reloaded");
                    let _ = update_tx.send(config);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Config reload rejected, keeping current endpoints");
                }
            }
        };

        let mut watcher = RecommendedWatcher::new(
            handler,
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

/// Apply endpoint changes from `updates` to `client` until the channel closes.
///
/// Reloads that leave the endpoint list unchanged are skipped.
pub fn apply_endpoint_updates(
    client: Arc<Client>,
    mut updates: mpsc::UnboundedReceiver<ClientConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            // Same rule as construction: an empty list keeps the current pool
            if config.endpoints.is_empty() {
                tracing::warn!("Reload has no endpoints, keeping current pool");
                continue;
            }
            let current = client.strategy().endpoints();
            if current[..] == config.endpoints[..] {
                tracing::debug!("Reload left endpoints unchanged");
                continue;
            }
            client.update_endpoints(config.endpoints);
        }
        tracing::debug!("Endpoint update channel closed");
    })
}
