//! Data model for the workspace synchronization core: workspace
//! identity, the per-workspace client state, and action records.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::FetchError;

/// Separator used when flattening a key into a cache token.
///
/// The ASCII unit separator is rejected by key validation, so
/// `("a","bc")` and `("ab","c")` can never collide.
const TOKEN_SEPARATOR: char = '\u{1f}';

/// Identity of a workspace: who owns it and what it is called.
///
/// Equality is exact and case-sensitive on both fields. Used as the
/// cache and dedup key throughout the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceKey {
    pub owner_id: String,
    pub name: String,
}

impl WorkspaceKey {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            name: name.into(),
        }
    }

    /// Reject keys that cannot be loaded: empty fields never reach the
    /// backend, and the token separator is reserved.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.owner_id.is_empty() {
            return Err(FetchError::Validation {
                message: "owner id must be non-empty".to_string(),
            });
        }
        if self.name.is_empty() {
            return Err(FetchError::Validation {
                message: "workspace name must be non-empty".to_string(),
            });
        }
        if self.owner_id.contains(TOKEN_SEPARATOR) || self.name.contains(TOKEN_SEPARATOR) {
            return Err(FetchError::Validation {
                message: "workspace key fields must not contain the reserved separator"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Collision-free flattening of the key for cache bookkeeping.
    pub fn cache_token(&self) -> String {
        format!("{}{}{}", self.owner_id, TOKEN_SEPARATOR, self.name)
    }
}

impl std::fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner_id, self.name)
    }
}

/// Language tag derived from a file path, used for editor display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageTag {
    Java,
    Yaml,
    Json,
    Markdown,
    Plain,
}

impl LanguageTag {
    /// Derive the tag from the path's extension. Unknown extensions
    /// fall back to `Plain`.
    pub fn from_path(path: &str) -> Self {
        match path.rsplit('.').next().unwrap_or_default() {
            "java" => Self::Java,
            "yml" | "yaml" => Self::Yaml,
            "json" => Self::Json,
            "md" => Self::Markdown,
            _ => Self::Plain,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::Plain => "plain",
        }
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single generated source file as held client-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub path: String,
    pub content: String,
    pub language: LanguageTag,
}

impl WorkspaceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = LanguageTag::from_path(&path);
        Self {
            path,
            content: content.into(),
            language,
        }
    }

    /// File name without any leading directories.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Load lifecycle of a workspace's client-held state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Empty,
    Failed,
}

impl LoadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Empty => "empty",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "loading" => Ok(Self::Loading),
            "loaded" => Ok(Self::Loaded),
            "empty" => Ok(Self::Empty),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid load status: {}", s)),
        }
    }
}

/// Client-held state for one workspace, mutated only by the load
/// coordinator. `exists` is independent of `status`: a workspace can be
/// `Loaded` with zero files (`exists = true`) or never created at all
/// (`exists = false`).
#[derive(Debug, Clone)]
pub struct WorkspaceState {
    pub key: WorkspaceKey,
    pub files: Vec<WorkspaceFile>,
    pub status: LoadStatus,
    pub exists: bool,
    pub last_loaded_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Path the user (or the one-time default rule) has selected.
    pub selected_path: Option<String>,
    /// Set once the default-file rule has run; background refreshes
    /// must never re-run it and yank the user's selection.
    pub default_applied: bool,
}

impl WorkspaceState {
    pub fn new(key: WorkspaceKey) -> Self {
        Self {
            key,
            files: Vec::new(),
            status: LoadStatus::Idle,
            exists: false,
            last_loaded_at: None,
            last_error: None,
            selected_path: None,
            default_applied: false,
        }
    }
}

/// The three long-running actions the core coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Generate,
    Recompile,
    Download,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Recompile => "recompile",
            Self::Download => "download",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate" => Ok(Self::Generate),
            "recompile" => Ok(Self::Recompile),
            "download" => Ok(Self::Download),
            _ => Err(format!("Invalid action kind: {}", s)),
        }
    }
}

/// Lifecycle state of a single action run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl ActionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid action state: {}", s)),
        }
    }
}

/// One run of a long-running action against a target workspace.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub target: WorkspaceKey,
    pub state: ActionState,
    pub started_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ActionRecord {
    pub fn running(kind: ActionKind, target: WorkspaceKey) -> Self {
        Self {
            kind,
            target,
            state: ActionState::Running,
            started_at: Utc::now(),
            error: None,
        }
    }
}
