//! Read-only projection of workspace state for rendering.
//!
//! Views are cloned snapshots: the UI never holds a reference into the
//! shared state, so nothing it does can corrupt the coordinator's
//! bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::SyncCore;
use crate::models::{LoadStatus, WorkspaceFile, WorkspaceKey};

/// What the editor renders for one workspace.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceView {
    pub key: WorkspaceKey,
    pub files: Vec<WorkspaceFile>,
    pub selected_path: Option<String>,
    pub status: LoadStatus,
    pub exists: bool,
    pub last_loaded_at: Option<DateTime<Utc>>,
    /// Persistent inline indicator for the last failed load, cleared
    /// on the next success.
    pub last_error: Option<String>,
}

impl SyncCore {
    /// Snapshot of one workspace, if it has been touched this session.
    pub async fn view(&self, key: &WorkspaceKey) -> Option<WorkspaceView> {
        let state = self.state.read().await;
        state.workspaces.get(&key.cache_token()).map(|ws| WorkspaceView {
            key: ws.key.clone(),
            files: ws.files.clone(),
            selected_path: ws.selected_path.clone(),
            status: ws.status,
            exists: ws.exists,
            last_loaded_at: ws.last_loaded_at,
            last_error: ws.last_error.clone(),
        })
    }

    /// Snapshot of the active workspace, if one is open and loaded.
    pub async fn active_view(&self) -> Option<WorkspaceView> {
        let key = self.state.read().await.active.clone()?;
        self.view(&key).await
    }

    /// Record a user file selection. Returns false when the path is not
    /// part of the workspace (selection unchanged).
    pub async fn select_file(&self, key: &WorkspaceKey, path: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(ws) = state.workspaces.get_mut(&key.cache_token()) else {
            return false;
        };
        if !ws.files.iter().any(|f| f.path == path) {
            return false;
        }
        ws.selected_path = Some(path.to_string());
        // A user choice supersedes the one-time default rule.
        ws.default_applied = true;
        true
    }
}
