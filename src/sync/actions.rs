//! The long-running actions: generate, recompile, download artifact,
//! and the manual file sync.
//!
//! All share a guard: a second action of the same kind against the same
//! target while one is running is rejected with `AlreadyRunning`, never
//! silently duplicated. Completion publishes to the invalidation bus
//! (with `success=false` on failure, which subscribers ignore), except
//! downloads, which change nothing server-side.

use std::sync::Arc;

use super::SyncCore;
use crate::backend::{GenerateResponse, RecompileResponse, SyncResponse};
use crate::bus::{InvalidationEvent, InvalidationTopic};
use crate::errors::ActionError;
use crate::models::{ActionKind, ActionRecord, ActionState, WorkspaceKey};

impl SyncCore {
    /// Mark an action running, rejecting a duplicate of the same kind
    /// for the same target.
    fn begin_action(&self, kind: ActionKind, target: &WorkspaceKey) -> Result<(), ActionError> {
        let mut actions = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        let slot = (kind, target.cache_token());
        if let Some(record) = actions.get(&slot)
            && record.state == ActionState::Running
        {
            return Err(ActionError::AlreadyRunning {
                kind,
                workspace: target.to_string(),
            });
        }
        actions.insert(slot, ActionRecord::running(kind, target.clone()));
        Ok(())
    }

    fn finish_action(&self, kind: ActionKind, target: &WorkspaceKey, error: Option<String>) {
        let mut actions = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = actions.get_mut(&(kind, target.cache_token())) {
            record.state = if error.is_none() {
                ActionState::Succeeded
            } else {
                ActionState::Failed
            };
            record.error = error;
        }
    }

    /// Latest record for an action kind against a target, if any ran
    /// this session.
    pub fn action_record(&self, kind: ActionKind, target: &WorkspaceKey) -> Option<ActionRecord> {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(kind, target.cache_token()))
            .cloned()
    }

    /// Run a generation job. On success the backend's `resolved_name`
    /// is authoritative (it may differ from the requested name): it
    /// becomes the active workspace, the refresh timer retargets to it,
    /// and a generation-completed event is published.
    pub async fn generate(
        self: &Arc<Self>,
        owner_id: &str,
        prompt: &str,
        name: Option<&str>,
    ) -> Result<GenerateResponse, ActionError> {
        if owner_id.is_empty() {
            return Err(ActionError::Validation {
                message: "owner id must be non-empty".to_string(),
            });
        }
        if prompt.trim().is_empty() {
            return Err(ActionError::Validation {
                message: "prompt must be non-empty".to_string(),
            });
        }

        // Dedup on the requested name; the resolved name is unknown
        // until the backend answers.
        let requested = WorkspaceKey::new(owner_id, name.unwrap_or_default());
        self.begin_action(ActionKind::Generate, &requested)?;
        tracing::info!(owner = owner_id, requested = ?name, "generation started");

        let result = self.backend.generate(owner_id, prompt, name).await;
        match result {
            Ok(resp) if resp.success => {
                let resolved = WorkspaceKey::new(owner_id, resp.resolved_name.clone());
                if let Err(err) = resolved.validate() {
                    let message = format!("backend returned unusable workspace name: {}", err);
                    self.finish_action(ActionKind::Generate, &requested, Some(message.clone()));
                    return Err(ActionError::Backend { message });
                }
                self.finish_action(ActionKind::Generate, &requested, None);
                // Adopt the resolved name, not the one the user typed.
                self.set_active(Some(resolved.clone()))
                    .await
                    .map_err(ActionError::Fetch)?;
                self.bus.publish(InvalidationEvent::succeeded(
                    InvalidationTopic::GenerationCompleted,
                    resolved.clone(),
                ));
                self.notifier
                    .success(&format!("Workspace {} generated", resolved));
                Ok(resp)
            }
            Ok(resp) => {
                let detail = resp
                    .result_text
                    .clone()
                    .unwrap_or_else(|| "generation failed".to_string());
                self.finish_action(ActionKind::Generate, &requested, Some(detail.clone()));
                self.bus.publish(InvalidationEvent::failed(
                    InvalidationTopic::GenerationCompleted,
                    requested,
                    detail.clone(),
                ));
                self.notifier.error(&detail);
                Ok(resp)
            }
            Err(err) => {
                self.finish_action(ActionKind::Generate, &requested, Some(err.to_string()));
                self.notifier
                    .error(&format!("Generation failed: {}", err));
                Err(err)
            }
        }
    }

    /// Recompile a workspace. A successful build may have changed files
    /// (the backend self-fixes), so it publishes an invalidation event;
    /// a failed build leaves the cache alone and surfaces the compiler
    /// diagnostics verbatim in the action record.
    pub async fn recompile(
        self: &Arc<Self>,
        key: &WorkspaceKey,
        max_fix_attempts: Option<u32>,
    ) -> Result<RecompileResponse, ActionError> {
        key.validate().map_err(ActionError::Fetch)?;
        self.begin_action(ActionKind::Recompile, key)?;
        let attempts = max_fix_attempts.unwrap_or(self.config.sync.max_fix_attempts);
        tracing::info!(workspace = %key, max_fix_attempts = attempts, "recompile started");

        let result = self.backend.recompile(key, attempts).await;
        match result {
            Ok(resp) if resp.success => {
                self.finish_action(ActionKind::Recompile, key, None);
                self.bus.publish(InvalidationEvent::succeeded(
                    InvalidationTopic::PluginFilesUpdated,
                    key.clone(),
                ));
                self.notifier
                    .success(&format!("Workspace {} compiled", key));
                Ok(resp)
            }
            Ok(resp) => {
                let diagnostics = resp
                    .diagnostics
                    .clone()
                    .unwrap_or_else(|| "compilation failed".to_string());
                self.finish_action(ActionKind::Recompile, key, Some(diagnostics.clone()));
                self.bus.publish(InvalidationEvent::failed(
                    InvalidationTopic::PluginFilesUpdated,
                    key.clone(),
                    diagnostics.clone(),
                ));
                self.notifier.error(&diagnostics);
                Ok(resp)
            }
            Err(err) => {
                self.finish_action(ActionKind::Recompile, key, Some(err.to_string()));
                self.notifier
                    .error(&format!("Recompile failed: {}", err));
                Err(err)
            }
        }
    }

    /// Download the compiled artifact. Refuses up front when no
    /// artifact exists, and rejects a zero-byte transfer as a failure
    /// even though the transport succeeded. Publishes nothing:
    /// downloading changes no workspace state.
    pub async fn download_artifact(
        self: &Arc<Self>,
        key: &WorkspaceKey,
    ) -> Result<Vec<u8>, ActionError> {
        key.validate().map_err(ActionError::Fetch)?;
        self.begin_action(ActionKind::Download, key)?;

        let result = self.try_download(key).await;
        match &result {
            Ok(bytes) => {
                self.finish_action(ActionKind::Download, key, None);
                self.notifier.success(&format!(
                    "Artifact for {} downloaded ({} bytes)",
                    key,
                    bytes.len()
                ));
            }
            Err(err) => {
                self.finish_action(ActionKind::Download, key, Some(err.to_string()));
                self.notifier.error(&format!("Download failed: {}", err));
            }
        }
        result
    }

    async fn try_download(&self, key: &WorkspaceKey) -> Result<Vec<u8>, ActionError> {
        let status = self.backend.check_artifact(key).await?;
        if !status.available {
            return Err(ActionError::NotCompiled {
                workspace: key.to_string(),
            });
        }
        let bytes = self.backend.download_artifact(key).await?;
        if bytes.is_empty() {
            return Err(ActionError::EmptyArtifact {
                workspace: key.to_string(),
            });
        }
        tracing::info!(workspace = %key, bytes = bytes.len(), "artifact downloaded");
        Ok(bytes)
    }

    /// Push out-of-band file edits into the workspace and announce the
    /// change so the active view reloads.
    pub async fn sync_files(self: &Arc<Self>, key: &WorkspaceKey) -> Result<SyncResponse, ActionError> {
        key.validate().map_err(ActionError::Fetch)?;
        let resp = self.backend.sync_files(&key.name).await?;
        if resp.success {
            self.bus.publish(InvalidationEvent::succeeded(
                InvalidationTopic::FilesSynced,
                key.clone(),
            ));
            self.notifier.success(&format!(
                "Synced {} files for workspace {}",
                resp.files_count, key
            ));
        } else {
            self.notifier
                .error(&format!("File sync failed for workspace {}", key));
        }
        Ok(resp)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::backend::{
        ArtifactStatus, GenerateResponse, RecompileResponse, SyncResponse, WorkspaceBackend,
        WorkspacePayload,
    };
    use crate::config::Config;
    use crate::errors::{ActionError, FetchError};
    use crate::models::{ActionKind, ActionState, WorkspaceKey};
    use crate::notify::RecordingNotifier;
    use crate::sync::SyncCore;

    /// Backend double for action tests: scripted responses plus an
    /// optional gate that holds the generate call open.
    struct ActionBackend {
        generate_response: Result<GenerateResponse, String>,
        recompile_response: Result<RecompileResponse, String>,
        artifact_available: bool,
        artifact_bytes: Vec<u8>,
        sync_response: SyncResponse,
        generate_gate: Option<Notify>,
        generate_calls: Mutex<usize>,
    }

    impl Default for ActionBackend {
        fn default() -> Self {
            Self {
                generate_response: Ok(GenerateResponse {
                    success: true,
                    resolved_name: "ShopPlugin_v2".to_string(),
                    result_text: Some("Generated 3 files".to_string()),
                }),
                recompile_response: Ok(RecompileResponse {
                    success: true,
                    diagnostics: None,
                }),
                artifact_available: true,
                artifact_bytes: vec![0x50, 0x4b, 0x03, 0x04],
                sync_response: SyncResponse {
                    success: true,
                    files_count: 2,
                },
                generate_gate: None,
                generate_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl WorkspaceBackend for ActionBackend {
        async fn load_workspace(
            &self,
            _key: &WorkspaceKey,
        ) -> Result<WorkspacePayload, FetchError> {
            Ok(WorkspacePayload::default())
        }

        async fn generate(
            &self,
            _owner_id: &str,
            _prompt: &str,
            _name: Option<&str>,
        ) -> Result<GenerateResponse, ActionError> {
            *self.generate_calls.lock().unwrap() += 1;
            if let Some(gate) = &self.generate_gate {
                gate.notified().await;
            }
            self.generate_response
                .clone()
                .map_err(|message| ActionError::Backend { message })
        }

        async fn recompile(
            &self,
            _key: &WorkspaceKey,
            _max_fix_attempts: u32,
        ) -> Result<RecompileResponse, ActionError> {
            self.recompile_response
                .clone()
                .map_err(|message| ActionError::Backend { message })
        }

        async fn check_artifact(
            &self,
            _key: &WorkspaceKey,
        ) -> Result<ArtifactStatus, ActionError> {
            Ok(ArtifactStatus {
                available: self.artifact_available,
                size_bytes: Some(self.artifact_bytes.len() as u64),
            })
        }

        async fn download_artifact(&self, _key: &WorkspaceKey) -> Result<Vec<u8>, ActionError> {
            Ok(self.artifact_bytes.clone())
        }

        async fn sync_files(&self, _name: &str) -> Result<SyncResponse, ActionError> {
            Ok(self.sync_response.clone())
        }
    }

    fn core_with(
        backend: ActionBackend,
    ) -> (Arc<SyncCore>, Arc<ActionBackend>, Arc<RecordingNotifier>) {
        let backend = Arc::new(backend);
        let notifier = Arc::new(RecordingNotifier::new());
        let core = SyncCore::new(Config::default(), backend.clone(), notifier.clone());
        (core, backend, notifier)
    }

    fn demo_key() -> WorkspaceKey {
        WorkspaceKey::new("user1", "ShopPlugin")
    }

    #[tokio::test]
    async fn test_generate_adopts_resolved_name_as_active_key() {
        let (core, _, _) = core_with(ActionBackend::default());

        let resp = core
            .generate("user1", "a shop plugin", Some("ShopPlugin"))
            .await
            .unwrap();
        assert!(resp.success);
        assert_eq!(
            core.active_key().await,
            Some(WorkspaceKey::new("user1", "ShopPlugin_v2"))
        );
        // The refresh timer follows the resolved key, not the typed one.
        assert_eq!(
            core.scheduler.target(),
            Some(WorkspaceKey::new("user1", "ShopPlugin_v2"))
        );
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_prompt() {
        let (core, backend, _) = core_with(ActionBackend::default());
        let err = core.generate("user1", "   ", None).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation { .. }));
        assert_eq!(*backend.generate_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_generate_failure_keeps_active_key_and_error_text() {
        let backend = ActionBackend {
            generate_response: Ok(GenerateResponse {
                success: false,
                resolved_name: String::new(),
                result_text: Some("model produced no files".to_string()),
            }),
            ..Default::default()
        };
        let (core, _, notifier) = core_with(backend);

        let resp = core
            .generate("user1", "a shop plugin", Some("ShopPlugin"))
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(core.active_key().await, None);

        let record = core
            .action_record(ActionKind::Generate, &demo_key())
            .unwrap();
        assert_eq!(record.state, ActionState::Failed);
        assert_eq!(record.error.as_deref(), Some("model produced no files"));
        assert_eq!(notifier.errors(), vec!["model produced no files".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_generate_for_same_target_is_rejected() {
        let backend = ActionBackend {
            generate_gate: Some(Notify::new()),
            ..Default::default()
        };
        let (core, backend, _) = core_with(backend);

        let first = {
            let core = core.clone();
            tokio::spawn(async move {
                core.generate("user1", "a shop plugin", Some("ShopPlugin"))
                    .await
            })
        };
        tokio::task::yield_now().await;

        let err = core
            .generate("user1", "a shop plugin", Some("ShopPlugin"))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::AlreadyRunning { .. }));

        backend.generate_gate.as_ref().unwrap().notify_one();
        first.await.unwrap().unwrap();
        assert_eq!(*backend.generate_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_generate_allowed_again_after_completion() {
        let (core, backend, _) = core_with(ActionBackend::default());
        core.generate("user1", "a shop plugin", Some("ShopPlugin"))
            .await
            .unwrap();
        core.generate("user1", "a shop plugin", Some("ShopPlugin"))
            .await
            .unwrap();
        assert_eq!(*backend.generate_calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recompile_success_publishes_invalidation() {
        let (core, _, _) = core_with(ActionBackend::default());
        let mut rx = core.bus().subscribe();

        let resp = core.recompile(&demo_key(), None).await.unwrap();
        assert!(resp.success);

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event.topic,
            crate::bus::InvalidationTopic::PluginFilesUpdated
        );
        assert!(event.success);
        assert_eq!(event.key, demo_key());
    }

    #[tokio::test]
    async fn test_recompile_failure_keeps_diagnostics_verbatim() {
        let diagnostics = "ShopMain.java:12: error: cannot find symbol";
        let backend = ActionBackend {
            recompile_response: Ok(RecompileResponse {
                success: false,
                diagnostics: Some(diagnostics.to_string()),
            }),
            ..Default::default()
        };
        let (core, _, notifier) = core_with(backend);
        let mut rx = core.bus().subscribe();

        let resp = core.recompile(&demo_key(), None).await.unwrap();
        assert!(!resp.success);

        let record = core
            .action_record(ActionKind::Recompile, &demo_key())
            .unwrap();
        assert_eq!(record.error.as_deref(), Some(diagnostics));
        assert_eq!(notifier.errors(), vec![diagnostics.to_string()]);

        // The failure event carries success=false; subscribers that
        // invalidate caches ignore it.
        let event = rx.try_recv().unwrap();
        assert!(!event.success);
    }

    #[tokio::test]
    async fn test_download_refuses_when_not_compiled() {
        let backend = ActionBackend {
            artifact_available: false,
            ..Default::default()
        };
        let (core, _, _) = core_with(backend);

        let err = core.download_artifact(&demo_key()).await.unwrap_err();
        assert!(matches!(err, ActionError::NotCompiled { .. }));
    }

    #[tokio::test]
    async fn test_download_rejects_empty_payload() {
        let backend = ActionBackend {
            artifact_bytes: Vec::new(),
            ..Default::default()
        };
        let (core, _, notifier) = core_with(backend);

        let err = core.download_artifact(&demo_key()).await.unwrap_err();
        assert!(matches!(err, ActionError::EmptyArtifact { .. }));
        assert_eq!(notifier.errors().len(), 1);

        let record = core
            .action_record(ActionKind::Download, &demo_key())
            .unwrap();
        assert_eq!(record.state, ActionState::Failed);
    }

    #[tokio::test]
    async fn test_download_success_publishes_no_invalidation() {
        let (core, _, _) = core_with(ActionBackend::default());
        let mut rx = core.bus().subscribe();

        let bytes = core.download_artifact(&demo_key()).await.unwrap();
        assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sync_files_publishes_files_synced() {
        let (core, _, _) = core_with(ActionBackend::default());
        let mut rx = core.bus().subscribe();

        let resp = core.sync_files(&demo_key()).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.files_count, 2);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.topic, crate::bus::InvalidationTopic::FilesSynced);
        assert!(event.success);
    }
}
