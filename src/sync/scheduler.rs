//! Auto-refresh scheduler: one periodic forced reload for the open
//! workspace.
//!
//! Single-timer invariant: `start` aborts any previous task before
//! spawning, and `set_active` on the core stops the timer before
//! swapping the selection, so a stale workspace can never keep
//! fetching in the background. The task holds the core weakly; if the
//! core is dropped the loop exits on its next tick.

use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::SyncCore;
use crate::models::WorkspaceKey;

#[derive(Debug)]
struct RefreshTask {
    key: WorkspaceKey,
    handle: JoinHandle<()>,
}

/// Periodic forced-reload timer. At most one task at a time.
#[derive(Debug, Default)]
pub struct AutoRefresh {
    inner: Mutex<Option<RefreshTask>>,
}

impl AutoRefresh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin refreshing `key` every `period`. Any previous timer is
    /// stopped first, whatever key it was polling.
    pub(crate) fn start(&self, core: Weak<SyncCore>, key: WorkspaceKey, period: Duration) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = guard.take() {
            previous.handle.abort();
            tracing::debug!(workspace = %previous.key, "auto-refresh stopped before restart");
        }

        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                let Some(core) = core.upgrade() else { break };
                tracing::debug!(workspace = %task_key, "auto-refresh tick");
                // A failed tick self-heals: state shows Failed for now
                // and the next tick retries.
                if let Err(err) = core.load(&task_key, true).await {
                    tracing::warn!(
                        workspace = %task_key,
                        error = %err,
                        "auto-refresh tick failed"
                    );
                }
            }
        });
        *guard = Some(RefreshTask { key, handle });
    }

    /// Cancel the timer if one exists. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(task) = guard.take() {
            task.handle.abort();
            tracing::debug!(workspace = %task.key, "auto-refresh stopped");
        }
    }

    /// The key currently being refreshed, if any.
    pub fn target(&self) -> Option<WorkspaceKey> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|task| task.key.clone())
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}
