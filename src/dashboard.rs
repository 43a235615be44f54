//! Wiring of store, loader and notification relay for one client session

use crate::config::ClientConfig;
use crate::loader::ArtifactLoader;
use crate::relay::{NotificationRelay, RelayHandle};
use crate::service::{DataService, HttpDataService};
use crate::store::StateStore;
use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A running client session
///
/// Owns the shared [`StateStore`], the loader that fills it, and the relay
/// task that applies UI notifications to it.
pub struct Dashboard {
    store: Arc<StateStore>,
    loader: ArtifactLoader,
    relay: RelayHandle,
    relay_task: JoinHandle<()>,
}

impl Dashboard {
    /// Connect to the backend named in the config over HTTP
    ///
    /// The config is validated first.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let service = HttpDataService::new(&config.backend_url, config.request_timeout())?;

        tracing::info!(backend_url = %config.backend_url, "Dashboard connected");

        Ok(Self::with_service(Arc::new(service), config.relay_capacity))
    }

    /// Build a session on top of an existing transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_service(service: Arc<dyn DataService>, relay_capacity: usize) -> Self {
        let store = Arc::new(StateStore::new());
        let loader = ArtifactLoader::new(service, store.clone());
        let (relay, notifications) = NotificationRelay::channel(store.clone(), relay_capacity);
        let relay_task = tokio::spawn(notifications.run());

        Self {
            store,
            loader,
            relay,
            relay_task,
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn loader(&self) -> &ArtifactLoader {
        &self.loader
    }

    /// Handle for UI components to publish notifications
    pub fn relay(&self) -> RelayHandle {
        self.relay.clone()
    }

    /// Stop the relay once every outstanding handle is dropped
    pub async fn shutdown(self) {
        let Self {
            relay, relay_task, ..
        } = self;
        drop(relay);

        if let Err(e) = relay_task.await {
            tracing::error!(error = %e, "Notification relay task failed");
        }

        tracing::debug!("Dashboard shut down");
    }
}
