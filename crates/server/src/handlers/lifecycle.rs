//! Install / activate state machine.
//!
//! Install fetches every seed asset and writes them into a new generation in
//! one transaction, so a single unfetchable seed leaves the store untouched
//! and the previous generation keeps serving. Activate deletes every
//! generation the registry does not name as current.

use futures_util::future::try_join_all;
use roadcache_client::Network;
use roadcache_core::{CacheStore, CachedResponse, Error, Request};
use serde::{Deserialize, Serialize};

use super::PlatformAction;
use crate::registry::VersionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Loaded, nothing installed yet.
    Parsed,
    Installing,
    /// Installed and waiting to be promoted.
    Installed,
    Activating,
    Activated,
    /// The last install failed; install may be retried.
    Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub generation: String,
    pub cached: usize,
    /// Activation should follow immediately instead of waiting.
    pub activate_now: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub generation: String,
    pub purged: Vec<String>,
    pub actions: Vec<PlatformAction>,
}

/// Owns the version registry and drives generation creation and deletion.
#[derive(Debug)]
pub struct LifecycleController {
    registry: VersionRegistry,
    seeds: Vec<Request>,
    state: LifecycleState,
    skip_waiting: bool,
    claim_clients: bool,
}

impl LifecycleController {
    pub fn new(registry: VersionRegistry, seeds: Vec<Request>, skip_waiting: bool, claim_clients: bool) -> Self {
        Self { registry, seeds, state: LifecycleState::Parsed, skip_waiting, claim_clients }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.registry
    }

    /// Ask for activation without waiting for open sessions.
    ///
    /// Returns true if a generation is installed and waiting, i.e. the caller
    /// should activate now. Otherwise the request is remembered and applies
    /// to the next successful install.
    pub fn skip_waiting(&mut self) -> bool {
        self.skip_waiting = true;
        self.state == LifecycleState::Installed
    }

    /// Fetch all seed assets and create the current generation from them.
    ///
    /// # Errors
    ///
    /// - `InvalidState` while an install or activation is in progress, or once active
    /// - `SeedFailed` if any seed fetch fails or returns a non-2xx status
    /// - cache errors from the final write
    pub async fn install(&mut self, store: &dyn CacheStore, network: &dyn Network) -> Result<InstallReport, Error> {
        match self.state {
            LifecycleState::Parsed | LifecycleState::Installed | LifecycleState::Redundant => {}
            state => return Err(Error::InvalidState(format!("cannot install while {state:?}"))),
        }

        let generation = self.registry.current().to_string();
        tracing::info!(generation = %generation, seeds = self.seeds.len(), "installing");
        self.state = LifecycleState::Installing;

        let result = async {
            let entries = try_join_all(self.seeds.iter().map(|seed| fetch_seed(network, seed))).await?;
            let cached = entries.len();
            store.put_all(&generation, entries).await?;
            Ok::<_, Error>(cached)
        }
        .await;

        match result {
            Ok(cached) => {
                self.state = LifecycleState::Installed;
                tracing::info!(generation = %generation, cached, "installed");
                Ok(InstallReport { generation, cached, activate_now: self.skip_waiting })
            }
            Err(e) => {
                self.state = LifecycleState::Redundant;
                tracing::warn!(generation = %generation, error = %e, "install failed");
                Err(e)
            }
        }
    }

    /// Promote the installed generation and purge every other one.
    ///
    /// Re-running activation on an already active, clean store is a no-op.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless installed or already active
    /// - cache errors while listing, deleting or marking generations
    pub async fn activate(&mut self, store: &dyn CacheStore) -> Result<ActivateReport, Error> {
        let previous = self.state;
        match previous {
            LifecycleState::Installed | LifecycleState::Activated => {}
            state => return Err(Error::InvalidState(format!("cannot activate while {state:?}"))),
        }

        self.state = LifecycleState::Activating;
        let generation = self.registry.current().to_string();

        let result = async {
            let generations = store.list_generations().await?;
            let mut purged = Vec::new();
            for stale in self.registry.stale(&generations) {
                tracing::info!(generation = %stale, "deleting stale generation");
                if store.delete_generation(stale).await? {
                    purged.push(stale.to_string());
                }
            }
            store.mark_activated(&generation).await?;
            Ok::<_, Error>(purged)
        }
        .await;

        match result {
            Ok(purged) => {
                self.state = LifecycleState::Activated;
                tracing::info!(generation = %generation, purged = purged.len(), "activated");
                let actions = if self.claim_clients { vec![PlatformAction::ClaimClients] } else { Vec::new() };
                Ok(ActivateReport { generation, purged, actions })
            }
            Err(e) => {
                self.state = previous;
                tracing::warn!(generation = %generation, error = %e, "activation failed");
                Err(e)
            }
        }
    }
}

async fn fetch_seed(network: &dyn Network, seed: &Request) -> Result<(Request, CachedResponse), Error> {
    let response = network
        .fetch(seed)
        .await
        .map_err(|e| Error::SeedFailed { url: seed.url.clone(), reason: e.to_string() })?;

    if !response.is_ok() {
        return Err(Error::SeedFailed { url: seed.url.clone(), reason: format!("status {}", response.status) });
    }

    Ok((seed.clone(), response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNetwork;
    use roadcache_core::CacheDb;

    const SEEDS: [&str; 3] =
        ["http://localhost:8080/index.html", "http://localhost:8080/manifest.json", "http://localhost:8080/icon.png"];

    fn seeded_network() -> FakeNetwork {
        SEEDS
            .iter()
            .fold(FakeNetwork::new(), |network, url| network.with_response(url, 200, url))
    }

    fn controller(version: &str, skip_waiting: bool) -> LifecycleController {
        let seeds = SEEDS.iter().map(|url| Request::get(*url)).collect();
        LifecycleController::new(VersionRegistry::new(version).unwrap(), seeds, skip_waiting, true)
    }

    #[tokio::test]
    async fn test_install_populates_generation() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = seeded_network();
        let mut lifecycle = controller("v1", true);

        let report = lifecycle.install(&store, &network).await.unwrap();
        assert_eq!(report.generation, "v1");
        assert_eq!(report.cached, 3);
        assert!(report.activate_now);
        assert_eq!(lifecycle.state(), LifecycleState::Installed);

        let entries = store.list_entries("v1").await.unwrap();
        let mut urls: Vec<_> = entries.iter().map(|e| e.url.as_str()).collect();
        urls.sort();
        let mut expected = SEEDS.to_vec();
        expected.sort();
        assert_eq!(urls, expected);
    }

    #[tokio::test]
    async fn test_install_fails_atomically() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = seeded_network().with_failure(SEEDS[1], "offline");
        let mut lifecycle = controller("v1", true);

        let result = lifecycle.install(&store, &network).await;
        assert!(matches!(result, Err(Error::SeedFailed { ref url, .. }) if url == SEEDS[1]));
        assert_eq!(lifecycle.state(), LifecycleState::Redundant);
        assert!(store.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_rejects_non_ok_seed() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = seeded_network().with_response(SEEDS[2], 404, "missing");
        let mut lifecycle = controller("v1", true);

        let result = lifecycle.install(&store, &network).await;
        assert!(matches!(result, Err(Error::SeedFailed { ref reason, .. }) if reason == "status 404"));
        assert!(store.list_generations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_retry_after_failure() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = seeded_network().with_failure(SEEDS[0], "offline");
        let mut lifecycle = controller("v1", true);
        assert!(lifecycle.install(&store, &network).await.is_err());

        network.set_response(SEEDS[0], 200, "index");
        let report = lifecycle.install(&store, &network).await.unwrap();
        assert_eq!(report.cached, 3);
    }

    #[tokio::test]
    async fn test_failed_install_keeps_previous_generation() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let network = seeded_network();
        let mut v1 = controller("v1", true);
        v1.install(&store, &network).await.unwrap();
        v1.activate(&store).await.unwrap();

        let broken = seeded_network().with_failure(SEEDS[2], "offline");
        let mut v2 = controller("v2", true);
        assert!(v2.install(&store, &broken).await.is_err());
        assert!(v2.activate(&store).await.is_err());

        assert_eq!(store.latest_activated().await.unwrap().as_deref(), Some("v1"));
        let names: Vec<_> = store.list_generations().await.unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["v1"]);
    }

    #[tokio::test]
    async fn test_activate_with_single_generation_purges_nothing() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let mut lifecycle = controller("v1", true);
        lifecycle.install(&store, &seeded_network()).await.unwrap();

        let report = lifecycle.activate(&store).await.unwrap();
        assert!(report.purged.is_empty());
        assert_eq!(report.actions, vec![PlatformAction::ClaimClients]);
        assert_eq!(lifecycle.state(), LifecycleState::Activated);
        assert_eq!(store.latest_activated().await.unwrap().as_deref(), Some("v1"));
    }

    #[tokio::test]
    async fn test_activate_purges_stale_generations() {
        let store = CacheDb::open_in_memory().await.unwrap();
        store.open_generation("v0").await.unwrap();
        let mut v1 = controller("v1", true);
        v1.install(&store, &seeded_network()).await.unwrap();
        v1.activate(&store).await.unwrap();

        let mut v2 = controller("v2", true);
        v2.install(&store, &seeded_network()).await.unwrap();
        let report = v2.activate(&store).await.unwrap();

        assert_eq!(report.purged, vec!["v1"]);
        let generations = store.list_generations().await.unwrap();
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].name, "v2");
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let store = CacheDb::open_in_memory().await.unwrap();
        store.open_generation("old").await.unwrap();
        let mut lifecycle = controller("v1", true);
        lifecycle.install(&store, &seeded_network()).await.unwrap();

        let first = lifecycle.activate(&store).await.unwrap();
        assert_eq!(first.purged, vec!["old"]);
        let second = lifecycle.activate(&store).await.unwrap();
        assert!(second.purged.is_empty());
        assert_eq!(store.list_generations().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_rejected() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let mut lifecycle = controller("v1", true);
        let result = lifecycle.activate(&store).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(lifecycle.state(), LifecycleState::Parsed);
    }

    #[tokio::test]
    async fn test_skip_waiting_before_and_after_install() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let mut lifecycle = controller("v1", false);

        let report = lifecycle.install(&store, &seeded_network()).await.unwrap();
        assert!(!report.activate_now);
        assert!(lifecycle.skip_waiting());

        let mut early = controller("v1", false);
        assert!(!early.skip_waiting());
        let report = early.install(&store, &seeded_network()).await.unwrap();
        assert!(report.activate_now);
    }

    #[tokio::test]
    async fn test_no_claim_when_disabled() {
        let store = CacheDb::open_in_memory().await.unwrap();
        let seeds = SEEDS.iter().map(|url| Request::get(*url)).collect();
        let mut lifecycle = LifecycleController::new(VersionRegistry::new("v1").unwrap(), seeds, true, false);
        lifecycle.install(&store, &seeded_network()).await.unwrap();
        let report = lifecycle.activate(&store).await.unwrap();
        assert!(report.actions.is_empty());
    }
}
