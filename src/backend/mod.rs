//! Backend boundary: the contract the synchronization core depends on.
//!
//! The core never talks HTTP directly; it goes through the
//! [`WorkspaceBackend`] trait so tests can substitute a mock and the
//! CLI can plug in the [`http::HttpBackend`] implementation.

mod http;

pub use http::HttpBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{ActionError, FetchError};
use crate::models::WorkspaceKey;

/// One file as returned by the backend. Order within the response is
/// meaningful and must be preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFile {
    pub path: String,
    pub content: String,
}

/// Response to a workspace load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspacePayload {
    pub files: Vec<WireFile>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Response to a generation request. `resolved_name` is authoritative:
/// it may differ from the name the user asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub resolved_name: String,
    #[serde(default)]
    pub result_text: Option<String>,
}

/// Response to a recompile request. `diagnostics` carries compiler
/// output verbatim when the build failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecompileResponse {
    pub success: bool,
    #[serde(default)]
    pub diagnostics: Option<String>,
}

/// Response to the artifact existence check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStatus {
    pub available: bool,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

/// Response to a manual file sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default)]
    pub files_count: u32,
}

/// The remote operations the core coordinates. No retries at this
/// layer; retry policy belongs to the callers.
#[async_trait]
pub trait WorkspaceBackend: Send + Sync {
    /// Load the authoritative file set for a workspace.
    async fn load_workspace(&self, key: &WorkspaceKey) -> Result<WorkspacePayload, FetchError>;

    /// Run a generation job from a free-text prompt.
    async fn generate(
        &self,
        owner_id: &str,
        prompt: &str,
        name: Option<&str>,
    ) -> Result<GenerateResponse, ActionError>;

    /// Recompile the workspace, letting the backend self-fix up to
    /// `max_fix_attempts` times.
    async fn recompile(
        &self,
        key: &WorkspaceKey,
        max_fix_attempts: u32,
    ) -> Result<RecompileResponse, ActionError>;

    /// Lightweight check for a compiled artifact.
    async fn check_artifact(&self, key: &WorkspaceKey) -> Result<ArtifactStatus, ActionError>;

    /// Transfer the compiled artifact bytes.
    async fn download_artifact(&self, key: &WorkspaceKey) -> Result<Vec<u8>, ActionError>;

    /// Push any out-of-band file edits into the workspace.
    async fn sync_files(&self, name: &str) -> Result<SyncResponse, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_payload_deserialize() {
        let json = r#"{
            "files": [
                {"path": "src/main/java/Main.java", "content": "class Main {}"},
                {"path": "plugin.yml", "content": "name: demo"}
            ],
            "metadata": {"version": 3}
        }"#;
        let payload: WorkspacePayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.files.len(), 2);
        assert_eq!(payload.files[0].path, "src/main/java/Main.java");
        assert!(payload.metadata.is_some());
    }

    #[test]
    fn test_workspace_payload_metadata_is_optional() {
        let json = r#"{"files": []}"#;
        let payload: WorkspacePayload = serde_json::from_str(json).unwrap();
        assert!(payload.files.is_empty());
        assert!(payload.metadata.is_none());
    }

    #[test]
    fn test_generate_response_deserialize() {
        let json = r#"{
            "success": true,
            "resolved_name": "ShopPlugin_v2",
            "result_text": "Generated 4 files"
        }"#;
        let resp: GenerateResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.resolved_name, "ShopPlugin_v2");
        assert_eq!(resp.result_text.as_deref(), Some("Generated 4 files"));
    }

    #[test]
    fn test_recompile_response_null_diagnostics() {
        let json = r#"{"success": true}"#;
        let resp: RecompileResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert!(resp.diagnostics.is_none());
    }

    #[test]
    fn test_recompile_response_with_diagnostics() {
        let json = r#"{"success": false, "diagnostics": "Main.java:3: error: ';' expected"}"#;
        let resp: RecompileResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.success);
        assert!(resp.diagnostics.unwrap().contains("';' expected"));
    }

    #[test]
    fn test_artifact_status_deserialize() {
        let json = r#"{"available": true, "size_bytes": 40960}"#;
        let status: ArtifactStatus = serde_json::from_str(json).unwrap();
        assert!(status.available);
        assert_eq!(status.size_bytes, Some(40960));
    }

    #[test]
    fn test_sync_response_defaults_files_count() {
        let json = r#"{"success": true}"#;
        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);
        assert_eq!(resp.files_count, 0);
    }
}
