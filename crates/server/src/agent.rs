//! The agent: routes each platform event to its handler and turns the
//! handler's result into an outbound frame.
//!
//! Background work returned by handlers is kept in a `JoinSet` until
//! [`Agent::drain`] is called, which the runtime does before exiting.

use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use roadcache_client::{Network, canonicalize};
use roadcache_core::{AppConfig, CacheStore, Error, NotificationConfig, Request};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use url::Url;

use crate::handlers::{
    self, BackgroundTask, ControlOutcome, FetchDisposition, LifecycleController, PlatformAction, ReplyPort,
};
use crate::protocol::{Event, Outbound};
use crate::registry::VersionRegistry;

/// A running background agent bound to one store and one network.
pub struct Agent {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    lifecycle: tokio::sync::Mutex<LifecycleController>,
    /// Generation fetches are served from. Never held across an await.
    serving: RwLock<Option<String>>,
    origin: Url,
    start_url: String,
    notification: NotificationConfig,
    background: Mutex<JoinSet<()>>,
}

impl Agent {
    /// Build an agent and resume serving from the most recently activated
    /// generation left in the store by a previous run.
    pub async fn start(
        config: &AppConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>,
    ) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;

        let seeds = config
            .seed_assets
            .iter()
            .map(|asset| resolve(asset, &origin).map(Request::get))
            .collect::<Result<Vec<_>, _>>()?;
        let start_url = resolve(&config.start_url, &origin)?;

        let registry = VersionRegistry::new(config.cache_version.clone())?;
        let lifecycle = LifecycleController::new(registry, seeds, config.skip_waiting, config.claim_clients);

        let serving = store.latest_activated().await?;
        match &serving {
            Some(generation) => tracing::info!(
                generation = %generation,
                current = lifecycle.registry().current(),
                "resuming from stored generation"
            ),
            None => tracing::info!(current = lifecycle.registry().current(), "no active generation in store"),
        }

        Ok(Self {
            store,
            network,
            lifecycle: tokio::sync::Mutex::new(lifecycle),
            serving: RwLock::new(serving),
            origin,
            start_url,
            notification: config.notification.clone(),
            background: Mutex::new(JoinSet::new()),
        })
    }

    /// Generation currently answering fetches.
    pub fn serving_generation(&self) -> Option<String> {
        self.serving.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_serving(&self, generation: &str) {
        *self.serving.write().unwrap_or_else(|e| e.into_inner()) = Some(generation.to_string());
    }

    /// Keep a task alive until [`Agent::drain`].
    fn wait_until(&self, task: BackgroundTask) {
        self.background.lock().unwrap_or_else(|e| e.into_inner()).spawn(task);
    }

    /// Wait for every background task registered so far.
    pub async fn drain(&self) {
        let mut tasks = std::mem::take(&mut *self.background.lock().unwrap_or_else(|e| e.into_inner()));
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "background task failed");
            }
        }
    }

    /// Handle one event. Port replies go to `out` while the event is being
    /// handled; the returned frame completes the event.
    pub async fn handle(&self, id: u64, event: Event, out: &UnboundedSender<Outbound>) -> Outbound {
        match event {
            Event::Install => self.install(id).await,
            Event::Activate => self.activate(id).await,
            Event::Fetch { request } => self.fetch(id, request).await,
            Event::Message { data, port } => {
                let port = port.map(|port| ReplyPort::new(port, out.clone()));
                match handlers::handle_message(&data, port.as_ref(), Utc::now()) {
                    ControlOutcome::ActivateRequested => self.activate_now(id).await,
                    ControlOutcome::Alive | ControlOutcome::Ignored => Outbound::Ignored { id },
                }
            }
            Event::Push { data } => {
                Outbound::Actions { id, actions: vec![handlers::handle_push(data.as_deref(), &self.notification)] }
            }
            Event::NotificationClick { tag } => {
                Outbound::Actions { id, actions: handlers::handle_notification_click(tag, &self.start_url) }
            }
            Event::Sync { tag } => {
                handlers::handle_sync(&tag);
                Outbound::Ignored { id }
            }
            // `runtime::serve` stops reading on shutdown and never dispatches
            // it; a direct caller only gets an acknowledgement.
            Event::Shutdown => Outbound::Ignored { id },
        }
    }

    async fn install(&self, id: u64) -> Outbound {
        let mut lifecycle = self.lifecycle.lock().await;
        let report = match lifecycle.install(self.store.as_ref(), self.network.as_ref()).await {
            Ok(report) => report,
            Err(e) => return Outbound::Failed { id, error: e.into() },
        };

        if report.activate_now {
            return self.promote(id, &mut lifecycle).await;
        }
        Outbound::Done { id, state: lifecycle.state(), purged: Vec::new(), actions: Vec::new() }
    }

    async fn activate(&self, id: u64) -> Outbound {
        let mut lifecycle = self.lifecycle.lock().await;
        self.promote(id, &mut lifecycle).await
    }

    async fn activate_now(&self, id: u64) -> Outbound {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.skip_waiting() {
            self.promote(id, &mut lifecycle).await
        } else {
            Outbound::Ignored { id }
        }
    }

    async fn promote(&self, id: u64, lifecycle: &mut LifecycleController) -> Outbound {
        match lifecycle.activate(self.store.as_ref()).await {
            Ok(report) => {
                self.set_serving(&report.generation);
                Outbound::Done { id, state: lifecycle.state(), purged: report.purged, actions: report.actions }
            }
            Err(e) => Outbound::Failed { id, error: e.into() },
        }
    }

    async fn fetch(&self, id: u64, request: Request) -> Outbound {
        let request = if request.is_get() {
            match resolve(&request.url, &self.origin) {
                Ok(url) => Request { method: request.method.to_ascii_uppercase(), url, headers: request.headers },
                Err(e) => return Outbound::Failed { id, error: e.into() },
            }
        } else {
            request
        };

        let generation = self.serving_generation();
        match handlers::handle_fetch(&self.store, self.network.as_ref(), generation.as_deref(), request).await {
            FetchDisposition::Passthrough => Outbound::Passthrough { id },
            FetchDisposition::Respond(reply) => {
                if let Some(task) = reply.persist {
                    self.wait_until(task);
                }
                match reply.response {
                    Ok(response) => Outbound::Respond { id, source: reply.source, response: response.into() },
                    Err(e) => Outbound::NetworkError { id, error: e.into() },
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn lifecycle_state(&self) -> handlers::LifecycleState {
        self.lifecycle.lock().await.state()
    }
}

fn resolve(input: &str, origin: &Url) -> Result<String, Error> {
    canonicalize(input, origin)
        .map(|url| url.to_string())
        .map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))
}

/// Actions carried by a frame, for logging.
pub fn actions_of(frame: &Outbound) -> &[PlatformAction] {
    match frame {
        Outbound::Done { actions, .. } | Outbound::Actions { actions, .. } => actions.as_slice(),
        _ => &[],
    }
}
