//! Registry of remote clients keyed by region.
//!
//! The registry is an ordinary value owned by the application's composition
//! root. It creates one client per region on first use, caches health probe
//! results for a configurable interval, and closes every client on
//! [`ClientRegistry::close`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::RemoteFailure;

/// Region used when the caller does not name one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default time a health result stays fresh.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// A client for a remote inference service.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), RemoteFailure>;

    /// Releases connections held by the client.
    async fn close(&self) {}
}

/// Last known health of a region's client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    fn healthy(at: DateTime<Utc>) -> Self {
        Self {
            healthy: true,
            last_check: at,
            error: None,
        }
    }

    fn unhealthy(at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            last_check: at,
            error: Some(error.into()),
        }
    }

    fn is_fresh(&self, now: DateTime<Utc>, interval: Duration) -> bool {
        match chrono::Duration::from_std(interval) {
            Ok(interval) => now - self.last_check < interval,
            Err(_) => true,
        }
    }
}

/// Registry holding one client per region.
pub struct ClientRegistry<C: RemoteClient> {
    clients: HashMap<String, Arc<C>>,
    health: HashMap<String, HealthStatus>,
    health_check_interval: Duration,
    default_region: String,
}

impl<C: RemoteClient> Default for ClientRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RemoteClient> ClientRegistry<C> {
    /// Creates an empty registry with the default health check interval.
    pub fn new() -> Self {
        Self::with_health_check_interval(DEFAULT_HEALTH_CHECK_INTERVAL)
    }

    /// Creates an empty registry whose health results stay fresh for `interval`.
    pub fn with_health_check_interval(interval: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            health: HashMap::new(),
            health_check_interval: interval,
            default_region: DEFAULT_REGION.to_string(),
        }
    }

    /// Sets the region used by [`get_or_create_default`](Self::get_or_create_default).
    pub fn with_default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    /// Returns the default region's client, creating it on first use.
    pub fn get_or_create_default<F>(&mut self, factory: F) -> Arc<C>
    where
        F: FnOnce(&str) -> C,
    {
        let region = self.default_region.clone();
        self.get_or_create(&region, factory)
    }

    /// Returns the region's client, creating it with `factory` on first use.
    pub fn get_or_create<F>(&mut self, region: &str, factory: F) -> Arc<C>
    where
        F: FnOnce(&str) -> C,
    {
        if let Some(client) = self.clients.get(region) {
            return Arc::clone(client);
        }

        let client = Arc::new(factory(region));
        self.clients.insert(region.to_string(), Arc::clone(&client));
        self.health
            .insert(region.to_string(), HealthStatus::healthy(Utc::now()));
        info!(region, "created remote client");
        client
    }

    /// Returns the region's client if one exists.
    pub fn get(&self, region: &str) -> Option<Arc<C>> {
        self.clients.get(region).cloned()
    }

    pub fn has(&self, region: &str) -> bool {
        self.clients.contains_key(region)
    }

    /// Registered regions, sorted.
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        regions.sort_unstable();
        regions
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Last recorded health for a region, without probing.
    pub fn health(&self, region: &str) -> Option<&HealthStatus> {
        self.health.get(region)
    }

    /// Returns the region's health, probing the client if the cached result is stale.
    pub async fn check_health(&mut self, region: &str) -> HealthStatus {
        let now = Utc::now();

        let Some(client) = self.clients.get(region).cloned() else {
            return HealthStatus::unhealthy(now, format!("no client registered for {}", region));
        };

        if let Some(status) = self.health.get(region) {
            if status.is_fresh(now, self.health_check_interval) {
                debug!(region, healthy = status.healthy, "using cached health status");
                return status.clone();
            }
        }

        let status = Self::probe(region, client.as_ref()).await;
        self.health.insert(region.to_string(), status.clone());
        status
    }

    /// Probes every registered client concurrently, ignoring cached results.
    pub async fn check_all_health(&mut self) -> HashMap<String, HealthStatus> {
        let probes = self.clients.iter().map(|(region, client)| {
            let region = region.clone();
            let client = Arc::clone(client);
            async move {
                let status = Self::probe(&region, client.as_ref()).await;
                (region, status)
            }
        });

        let results: HashMap<String, HealthStatus> = join_all(probes).await.into_iter().collect();
        for (region, status) in &results {
            self.health.insert(region.clone(), status.clone());
        }
        results
    }

    async fn probe(region: &str, client: &C) -> HealthStatus {
        match client.ping().await {
            Ok(()) => HealthStatus::healthy(Utc::now()),
            Err(err) => {
                warn!(region, error = %err, "remote client health check failed");
                HealthStatus::unhealthy(Utc::now(), err.to_string())
            }
        }
    }

    /// Closes the region's client and forgets it.
    pub async fn remove(&mut self, region: &str) -> bool {
        self.health.remove(region);
        match self.clients.remove(region) {
            Some(client) => {
                client.close().await;
                true
            }
            None => false,
        }
    }

    /// Closes every client and empties the registry.
    pub async fn close(&mut self) {
        let clients: Vec<Arc<C>> = self.clients.drain().map(|(_, client)| client).collect();
        join_all(clients.iter().map(|client| client.close())).await;
        self.health.clear();
        info!(closed = clients.len(), "closed remote clients");
    }
}
