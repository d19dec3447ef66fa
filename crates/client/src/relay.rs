//! Relay context and lifecycle.
//!
//! [`Relay`] owns the store handle, the transport, the gateway and the
//! flusher; one per process, passed explicitly to whoever drives it. External
//! triggers go through [`Relay::dispatch`].
//!
//! Lifecycle: `Uninitialized -> Purging -> Ready`. Activation purges obsolete
//! cache generations and only then enters `Ready`. Until then cacheable reads
//! are served from the network without touching the cache.

use courier_core::{AppConfig, Disposition, Error, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::fetch::{FetchConfig, HttpTransport, Transport};
use crate::flusher::{FlushOutcome, Flusher};
use crate::gateway::{Gateway, GatewayResponse, InterceptedRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Purging,
    Ready,
}

/// Something the host platform asks the relay to do.
#[derive(Debug, Clone)]
pub enum Trigger {
    RequestIntercepted(InterceptedRequest),
    ConnectivityRestored,
    ExplicitFlush { tag: String },
    LifecycleActivate,
}

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Response(GatewayResponse),
    Flush(FlushOutcome),
    Activated { purged: u64 },
    /// The trigger did not apply (e.g. a flush message with a foreign tag).
    Ignored,
}

pub struct Relay {
    config: AppConfig,
    store: Store,
    gateway: Gateway,
    flusher: Flusher,
    state: RwLock<LifecycleState>,
    activation: Mutex<()>,
}

impl Relay {
    pub fn new(config: AppConfig, store: Store, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let gateway = Gateway::new(&config, store.clone(), Arc::clone(&transport))?;
        let flusher = Flusher::new(&config, store.clone(), transport)?;
        Ok(Self {
            config,
            store,
            gateway,
            flusher,
            state: RwLock::new(LifecycleState::Uninitialized),
            activation: Mutex::new(()),
        })
    }

    /// Open the configured store and build an HTTP-backed relay.
    ///
    /// The relay still has to be activated.
    pub async fn from_config(config: AppConfig) -> Result<Self, Error> {
        let store = Store::open(&config.db_path).await?;
        let transport = HttpTransport::new(&FetchConfig {
            user_agent: config.user_agent.clone(),
            timeout: config.timeout(),
            ..Default::default()
        })?;
        Self::new(config, store, Arc::new(transport))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    /// Route a trigger to its handler.
    pub async fn dispatch(&self, trigger: Trigger) -> Result<TriggerOutcome, Error> {
        match trigger {
            Trigger::RequestIntercepted(request) => self.intercept(request).await.map(TriggerOutcome::Response),
            Trigger::ConnectivityRestored => self.flush().await.map(TriggerOutcome::Flush),
            Trigger::ExplicitFlush { tag } if tag == self.config.flush_tag => {
                self.flush().await.map(TriggerOutcome::Flush)
            }
            Trigger::ExplicitFlush { tag } => {
                tracing::debug!(%tag, "flush message with unknown tag ignored");
                Ok(TriggerOutcome::Ignored)
            }
            Trigger::LifecycleActivate => self.activate().await.map(|purged| TriggerOutcome::Activated { purged }),
        }
    }

    /// Purge obsolete cache generations, then enter `Ready`.
    ///
    /// On failure the relay falls back to `Uninitialized`.
    pub async fn activate(&self) -> Result<u64, Error> {
        let _guard = self.activation.lock().await;
        *self.state.write().await = LifecycleState::Purging;

        match self.store.purge_obsolete_generations(&self.config.cache_version).await {
            Ok(purged) => {
                *self.state.write().await = LifecycleState::Ready;
                tracing::info!(cache_version = %self.config.cache_version, purged, "relay ready");
                Ok(purged)
            }
            Err(e) => {
                *self.state.write().await = LifecycleState::Uninitialized;
                tracing::error!(error = %e, "activation failed");
                Err(e)
            }
        }
    }

    /// Handle one intercepted request.
    pub async fn intercept(&self, request: InterceptedRequest) -> Result<GatewayResponse, Error> {
        let mut disposition = self.gateway.classify(&request)?;
        if disposition == Disposition::CacheStrategy && self.state().await != LifecycleState::Ready {
            tracing::debug!(url = %request.url, "relay not ready, serving from network only");
            disposition = Disposition::Bypass;
        }
        self.gateway.dispatch(request, disposition).await
    }

    pub async fn flush(&self) -> Result<FlushOutcome, Error> {
        self.flusher.flush().await
    }
}
