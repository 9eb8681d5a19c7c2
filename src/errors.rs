//! Typed error hierarchy for the workspace synchronization core.
//!
//! Two top-level enums cover the two subsystems:
//! - `FetchError` — workspace load failures (coordinator and fetcher)
//! - `ActionError` — long-running action failures (generate, recompile,
//!   download, manual sync)

use thiserror::Error;

use crate::models::ActionKind;

/// Errors from loading a workspace's file set.
///
/// `NotFound` is deliberately separate from the failure variants: a
/// workspace that was never created server-side is a legitimate empty
/// result, not an error condition, and the coordinator maps it to
/// `exists = false` rather than `LoadStatus::Failed`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid workspace key: {message}")]
    Validation { message: String },

    #[error("Workspace has not been created yet")]
    NotFound,

    #[error("Transient backend error: {message}")]
    Transient { message: String },

    #[error("Malformed backend response: {message}")]
    Malformed { message: String },
}

impl FetchError {
    /// Whether a subsequent non-forced load should retry this failure.
    ///
    /// Validation and malformed responses will not get better on their
    /// own; transient errors and not-yet-created workspaces will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::NotFound)
    }
}

/// Errors from the generate / recompile / download state machines.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("A {kind} action is already running for workspace {workspace}")]
    AlreadyRunning { kind: ActionKind, workspace: String },

    #[error("Workspace {workspace} has not been compiled yet")]
    NotCompiled { workspace: String },

    #[error("Compiled artifact for workspace {workspace} is empty")]
    EmptyArtifact { workspace: String },

    #[error("Backend rejected the request: {message}")]
    Backend { message: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
