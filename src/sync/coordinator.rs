//! Load coordinator: the only writer of per-workspace state.
//!
//! Guarantees, per workspace key:
//! - at most one fetch in flight (a concurrent request is dropped, not
//!   queued);
//! - a non-forced load of an already-loaded workspace never touches the
//!   backend;
//! - failures are never recorded as loaded, so the next passive load
//!   retries.

use chrono::Utc;

use super::SyncCore;
use crate::config::SelectionConfig;
use crate::errors::FetchError;
use crate::models::{LoadStatus, WorkspaceFile, WorkspaceKey, WorkspaceState};

/// How a `load` call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Already loaded and `force` was false; the backend was not asked.
    CacheHit,
    /// A fetch for this key was already in flight; this request was
    /// dropped and the in-flight one will update state for everyone.
    InFlightDropped,
    /// Fresh load completed with at least one file.
    Loaded,
    /// Fresh load completed; the workspace exists but holds no files.
    LoadedEmpty,
    /// The workspace has never been created server-side.
    NotFound,
}

impl SyncCore {
    /// Load a workspace's files, updating the shared state.
    ///
    /// Fetch failures update `LoadStatus::Failed` and fire an error
    /// toast before returning `Err`, so schedulers can log-and-continue
    /// while interactive callers still see the cause.
    pub async fn load(&self, key: &WorkspaceKey, force: bool) -> Result<LoadOutcome, FetchError> {
        key.validate()?;
        let token = key.cache_token();

        // Phase 1: decide under the lock, before any await. Inserting
        // into `loading` here is what enforces the single-in-flight
        // invariant across the scheduler, the invalidation listener and
        // direct callers.
        {
            let mut state = self.state.write().await;
            if !force && state.loaded.contains(&token) {
                tracing::debug!(workspace = %key, "load skipped, cache hit");
                return Ok(LoadOutcome::CacheHit);
            }
            if state.loading.contains(&token) {
                tracing::debug!(workspace = %key, "load dropped, fetch already in flight");
                return Ok(LoadOutcome::InFlightDropped);
            }
            state.loading.insert(token.clone());
            let entry = state
                .workspaces
                .entry(token.clone())
                .or_insert_with(|| WorkspaceState::new(key.clone()));
            entry.status = LoadStatus::Loading;
        }

        // Phase 2: the fetch itself, with no lock held.
        let result = self.backend.load_workspace(key).await;

        // Phase 3: apply the result.
        let mut state = self.state.write().await;
        state.loading.remove(&token);
        let selection = self.config.selection.clone();
        let entry = state
            .workspaces
            .entry(token.clone())
            .or_insert_with(|| WorkspaceState::new(key.clone()));

        match result {
            Ok(payload) => {
                entry.files = payload
                    .files
                    .into_iter()
                    .map(|f| WorkspaceFile::new(f.path, f.content))
                    .collect();
                entry.exists = true;
                entry.last_loaded_at = Some(Utc::now());
                entry.last_error = None;
                // Default selection runs once per workspace; background
                // refreshes must not yank the user's current file.
                if !entry.default_applied && !entry.files.is_empty() {
                    entry.selected_path = select_default(&entry.files, &selection);
                    entry.default_applied = true;
                }
                let outcome = if entry.files.is_empty() {
                    entry.status = LoadStatus::Empty;
                    LoadOutcome::LoadedEmpty
                } else {
                    entry.status = LoadStatus::Loaded;
                    LoadOutcome::Loaded
                };
                state.loaded.insert(token);
                tracing::info!(workspace = %key, outcome = ?outcome, "workspace loaded");
                Ok(outcome)
            }
            Err(FetchError::NotFound) => {
                // Never created server-side: a legitimate empty result,
                // not a failure. Left out of the loaded set so a later
                // passive load re-checks (generation may create it).
                entry.files.clear();
                entry.exists = false;
                entry.status = LoadStatus::Idle;
                entry.last_error = None;
                state.loaded.remove(&token);
                tracing::debug!(workspace = %key, "workspace not created yet");
                Ok(LoadOutcome::NotFound)
            }
            Err(err) => {
                entry.status = LoadStatus::Failed;
                entry.last_error = Some(err.to_string());
                tracing::warn!(workspace = %key, error = %err, "workspace load failed");
                self.notifier
                    .error(&format!("Could not load workspace {}: {}", key, err));
                Err(err)
            }
        }
    }
}

/// Deterministic default-file rule: first file under the source root
/// whose name contains the entry marker, then any file whose name
/// contains the marker, then the first file in backend order.
fn select_default(files: &[WorkspaceFile], selection: &SelectionConfig) -> Option<String> {
    files
        .iter()
        .find(|f| {
            f.path.starts_with(&selection.source_root)
                && f.file_name().contains(&selection.entry_marker)
        })
        .or_else(|| {
            files
                .iter()
                .find(|f| f.file_name().contains(&selection.entry_marker))
        })
        .or_else(|| files.first())
        .map(|f| f.path.clone())
}
