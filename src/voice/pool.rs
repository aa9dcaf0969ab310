//! Per-destination voice connection cache

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::{DestinationId, VoiceBackend, VoiceConnection};
use crate::Result;

/// Caches at most one live connection per destination
///
/// The cache lock is held across `join` and `leave`, so acquire and release
/// are linearized and a destination can never end up with two connections.
pub struct VoiceConnectionPool {
    backend: Arc<dyn VoiceBackend>,
    connections: Mutex<HashMap<DestinationId, Arc<dyn VoiceConnection>>>,
}

impl VoiceConnectionPool {
    /// Create an empty pool over a backend
    #[must_use]
    pub fn new(backend: Arc<dyn VoiceBackend>) -> Self {
        Self {
            backend,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached connection for `destination`, joining if absent
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails to join
    pub async fn acquire(&self, destination: &str) -> Result<Arc<dyn VoiceConnection>> {
        let mut connections = self.connections.lock().await;

        if let Some(existing) = connections.get(destination) {
            tracing::trace!(destination, "reusing voice connection");
            return Ok(Arc::clone(existing));
        }

        tracing::debug!(destination, backend = self.backend.name(), "joining voice destination");
        let connection = self.backend.join(destination).await?;
        connections.insert(destination.to_string(), Arc::clone(&connection));

        Ok(connection)
    }

    /// Tear down and evict the connection for `destination`
    ///
    /// Leave failures are logged; the entry is evicted regardless.
    pub async fn release(&self, destination: &str) {
        let mut connections = self.connections.lock().await;

        let Some(connection) = connections.remove(destination) else {
            return;
        };

        tracing::debug!(destination, "leaving voice destination");
        if let Err(e) = connection.leave().await {
            tracing::warn!(destination, error = %e, "failed to leave voice destination");
        }
    }

    /// Whether a connection is cached for `destination`
    pub async fn contains(&self, destination: &str) -> bool {
        self.connections.lock().await.contains_key(destination)
    }

    /// Number of cached connections
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Whether no connections are cached
    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }
}
