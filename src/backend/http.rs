//! HTTP implementation of the backend contract.
//!
//! Error mapping for loads: 404 → `NotFound`, connect/timeout/5xx →
//! `Transient`, undecodable bodies → `Malformed`. Action endpoints map
//! everything non-2xx to `ActionError::Backend`.

use async_trait::async_trait;
use serde::Serialize;

use super::{
    ArtifactStatus, GenerateResponse, RecompileResponse, SyncResponse, WorkspaceBackend,
    WorkspacePayload,
};
use crate::errors::{ActionError, FetchError};
use crate::models::WorkspaceKey;

/// Backend client speaking the dashboard's REST API.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequestBody<'a> {
    owner_id: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RecompileRequestBody {
    max_fix_attempts: u32,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn workspace_url(&self, key: &WorkspaceKey, suffix: &str) -> String {
        format!(
            "{}/api/workspaces/{}/{}{}",
            self.base_url, key.owner_id, key.name, suffix
        )
    }

    /// Map reqwest transport errors onto the fetch taxonomy.
    fn fetch_transport_error(err: reqwest::Error) -> FetchError {
        if err.is_decode() {
            FetchError::Malformed {
                message: err.to_string(),
            }
        } else {
            FetchError::Transient {
                message: err.to_string(),
            }
        }
    }

    async fn action_error_from_response(resp: reqwest::Response) -> ActionError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        ActionError::Backend {
            message: format!("status {}: {}", status, body),
        }
    }
}

#[async_trait]
impl WorkspaceBackend for HttpBackend {
    async fn load_workspace(&self, key: &WorkspaceKey) -> Result<WorkspacePayload, FetchError> {
        let resp = self
            .client
            .get(self.workspace_url(key, ""))
            .send()
            .await
            .map_err(Self::fetch_transport_error)?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if resp.status().is_server_error() {
            return Err(FetchError::Transient {
                message: format!("backend returned {}", resp.status()),
            });
        }
        if !resp.status().is_success() {
            return Err(FetchError::Malformed {
                message: format!("unexpected status {}", resp.status()),
            });
        }

        resp.json::<WorkspacePayload>()
            .await
            .map_err(|e| FetchError::Malformed {
                message: e.to_string(),
            })
    }

    async fn generate(
        &self,
        owner_id: &str,
        prompt: &str,
        name: Option<&str>,
    ) -> Result<GenerateResponse, ActionError> {
        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequestBody {
                owner_id,
                prompt,
                name,
            })
            .send()
            .await
            .map_err(|e| ActionError::Backend {
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Self::action_error_from_response(resp).await);
        }
        resp.json::<GenerateResponse>()
            .await
            .map_err(|e| ActionError::Backend {
                message: format!("undecodable generate response: {}", e),
            })
    }

    async fn recompile(
        &self,
        key: &WorkspaceKey,
        max_fix_attempts: u32,
    ) -> Result<RecompileResponse, ActionError> {
        let resp = self
            .client
            .post(self.workspace_url(key, "/recompile"))
            .json(&RecompileRequestBody { max_fix_attempts })
            .send()
            .await
            .map_err(|e| ActionError::Backend {
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Self::action_error_from_response(resp).await);
        }
        resp.json::<RecompileResponse>()
            .await
            .map_err(|e| ActionError::Backend {
                message: format!("undecodable recompile response: {}", e),
            })
    }

    async fn check_artifact(&self, key: &WorkspaceKey) -> Result<ArtifactStatus, ActionError> {
        let resp = self
            .client
            .get(self.workspace_url(key, "/artifact/exists"))
            .send()
            .await
            .map_err(|e| ActionError::Backend {
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Self::action_error_from_response(resp).await);
        }
        resp.json::<ArtifactStatus>()
            .await
            .map_err(|e| ActionError::Backend {
                message: format!("undecodable artifact status: {}", e),
            })
    }

    async fn download_artifact(&self, key: &WorkspaceKey) -> Result<Vec<u8>, ActionError> {
        let resp = self
            .client
            .get(self.workspace_url(key, "/artifact"))
            .send()
            .await
            .map_err(|e| ActionError::Backend {
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Self::action_error_from_response(resp).await);
        }
        let bytes = resp.bytes().await.map_err(|e| ActionError::Backend {
            message: format!("artifact transfer failed: {}", e),
        })?;
        Ok(bytes.to_vec())
    }

    async fn sync_files(&self, name: &str) -> Result<SyncResponse, ActionError> {
        let resp = self
            .client
            .post(format!("{}/api/workspaces/{}/sync", self.base_url, name))
            .send()
            .await
            .map_err(|e| ActionError::Backend {
                message: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(Self::action_error_from_response(resp).await);
        }
        resp.json::<SyncResponse>()
            .await
            .map_err(|e| ActionError::Backend {
                message: format!("undecodable sync response: {}", e),
            })
    }
}
