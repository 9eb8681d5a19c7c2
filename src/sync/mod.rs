//! The workspace synchronization core.
//!
//! `SyncCore` owns everything mutable in this crate: the per-workspace
//! load state, the single active-workspace selection, the auto-refresh
//! timer and the action records. UI/CLI layers only call its methods
//! and read [`view::WorkspaceView`] snapshots; nothing else ever writes
//! the shared state. That single-writer discipline, plus the
//! one-in-flight-fetch rule in the coordinator, is what keeps the model
//! safe without finer locking.

mod actions;
mod coordinator;
mod scheduler;
mod view;

pub use coordinator::LoadOutcome;
pub use scheduler::AutoRefresh;
pub use view::WorkspaceView;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::backend::WorkspaceBackend;
use crate::bus::{InvalidationBus, InvalidationEvent};
use crate::config::Config;
use crate::errors::FetchError;
use crate::models::{ActionKind, ActionRecord, WorkspaceKey, WorkspaceState};
use crate::notify::Notifier;

/// Shared mutable state, always accessed through the core's lock.
#[derive(Debug, Default)]
pub(crate) struct CoreState {
    /// Every workspace touched this session, keyed by cache token.
    pub(crate) workspaces: HashMap<String, WorkspaceState>,
    /// Tokens with a completed successful load (the cache-skip set).
    pub(crate) loaded: HashSet<String>,
    /// Tokens with a fetch currently in flight (the dedup set).
    pub(crate) loading: HashSet<String>,
    /// At most one workspace is open in the editor at a time.
    pub(crate) active: Option<WorkspaceKey>,
}

/// Owner of the whole synchronization core. Construct once per session
/// and share via `Arc`.
pub struct SyncCore {
    pub(crate) config: Config,
    pub(crate) backend: Arc<dyn WorkspaceBackend>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) bus: InvalidationBus,
    pub(crate) state: Arc<RwLock<CoreState>>,
    pub(crate) scheduler: AutoRefresh,
    pub(crate) actions: std::sync::Mutex<HashMap<(ActionKind, String), ActionRecord>>,
}

impl SyncCore {
    pub fn new(
        config: Config,
        backend: Arc<dyn WorkspaceBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            backend,
            notifier,
            bus: InvalidationBus::new(),
            state: Arc::new(RwLock::new(CoreState::default())),
            scheduler: AutoRefresh::new(),
            actions: std::sync::Mutex::new(HashMap::new()),
        })
    }

    /// The bus other subsystems (chat, manual sync UI) publish to.
    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    /// The auto-refresh timer (read-only inspection; lifecycle is
    /// driven by `set_active`).
    pub fn scheduler(&self) -> &AutoRefresh {
        &self.scheduler
    }

    pub async fn active_key(&self) -> Option<WorkspaceKey> {
        self.state.read().await.active.clone()
    }

    /// Switch which workspace is open. Stops the previous workspace's
    /// refresh timer before starting the new one, so exactly one timer
    /// exists at any moment; `None` just stops it.
    pub async fn set_active(
        self: &Arc<Self>,
        key: Option<WorkspaceKey>,
    ) -> Result<(), FetchError> {
        if let Some(key) = &key {
            key.validate()?;
        }
        self.scheduler.stop();
        {
            let mut state = self.state.write().await;
            state.active = key.clone();
        }
        if let Some(key) = key {
            tracing::info!(workspace = %key, "workspace opened");
            self.scheduler
                .start(Arc::downgrade(self), key, self.config.poll_interval());
        } else {
            tracing::info!("workspace closed");
        }
        Ok(())
    }

    /// Spawn the invalidation listener. Events that succeeded and match
    /// the active workspace trigger a forced reload after the debounce
    /// window; everything queued inside the window coalesces into one
    /// reload. Returns the task handle so callers can abort on
    /// shutdown.
    pub fn start_invalidation_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let core = Arc::downgrade(self);
        let mut rx = self.bus.subscribe();
        let debounce = self.config.debounce();
        tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "invalidation listener lagged");
                        continue;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                };
                let Some(core) = core.upgrade() else { break };

                let mut pending = vec![event];
                tokio::time::sleep(debounce).await;
                while let Ok(more) = rx.try_recv() {
                    pending.push(more);
                }

                let Some(active) = core.active_key().await else {
                    tracing::debug!("invalidation ignored, no active workspace");
                    continue;
                };
                let relevant = pending
                    .iter()
                    .filter(|e| e.success && e.key == active)
                    .count();
                if relevant == 0 {
                    tracing::debug!(workspace = %active, "invalidation ignored, no matching event");
                    continue;
                }

                tracing::debug!(
                    workspace = %active,
                    coalesced = relevant,
                    "invalidation triggered forced reload"
                );
                if let Err(err) = core.load(&active, true).await {
                    tracing::warn!(workspace = %active, error = %err, "invalidation reload failed");
                }
            }
        })
    }

    /// Publish an invalidation event on behalf of an external
    /// subsystem (e.g. the chat layer's turn-completed signal).
    pub fn publish(&self, event: InvalidationEvent) {
        self.bus.publish(event);
    }
}
