//! Workflow artifact upload through the Actions runtime service.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use junit_trace_core::config::Config;
use junit_trace_core::error::{JunitTraceError, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::ensure_success;

const RUNTIME_API_VERSION: &str = "6.0-preview";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadResponse {
    pub artifact_name: String,
    pub size: u64,
    pub failed_items: Vec<PathBuf>,
}

/// Uploads files as a named workflow artifact.
pub trait ArtifactClient {
    /// Files are stored under their path relative to `root_dir`. Files that fail to
    /// upload are reported in `failed_items` rather than as an error.
    fn upload_artifact(
        &self,
        name: &str,
        files: &[PathBuf],
        root_dir: &Path,
    ) -> impl Future<Output = Result<UploadResponse>> + Send;
}

/// Artifact key a job step's trace log is stored under, `{job}{step}`.
pub fn artifact_key(job_name: &str, step_name: &str) -> String {
    format!("{{{job_name}}}{{{step_name}}}")
}

pub async fn upload_trace_log_artifact<C: ArtifactClient>(
    job_name: &str,
    step_name: &str,
    path: &Path,
    client: &C,
) -> Result<()> {
    let key = artifact_key(job_name, step_name);
    let root_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let resp = client
        .upload_artifact(&key, &[path.to_path_buf()], root_dir)
        .await?;
    if !resp.failed_items.is_empty() {
        return Err(JunitTraceError::Export(format!(
            "Failed to upload {} to Artifact<{key}>",
            path.display()
        )));
    }
    info!(artifact = %key, bytes = resp.size, "uploaded trace log");
    Ok(())
}

/// Client for the artifact endpoints of the Actions runtime, available to steps as
/// `ACTIONS_RUNTIME_URL` and `ACTIONS_RUNTIME_TOKEN`.
#[derive(Debug, Clone)]
pub struct ActionsArtifactClient {
    http: Client,
    artifacts_url: String,
}

#[derive(Serialize)]
struct CreateContainer<'a> {
    #[serde(rename = "Type")]
    kind: &'a str,
    #[serde(rename = "Name")]
    name: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    file_container_resource_url: String,
}

#[derive(Serialize)]
struct FinalizeContainer {
    #[serde(rename = "Size")]
    size: u64,
}

impl ActionsArtifactClient {
    pub fn new(runtime_url: &str, runtime_token: &str, run_id: u64, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {runtime_token}"))
            .map_err(|e| JunitTraceError::Config(format!("invalid Actions runtime token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json;api-version=6.0-preview"),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| JunitTraceError::Http(format!("failed building HTTP client: {e}")))?;

        let base = if runtime_url.ends_with('/') {
            runtime_url.to_string()
        } else {
            format!("{runtime_url}/")
        };
        Ok(Self {
            http,
            artifacts_url: format!("{base}_apis/pipelines/workflows/{run_id}/artifacts"),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let url = cfg.actions_runtime_url.as_deref().ok_or_else(|| {
            JunitTraceError::Config("ACTIONS_RUNTIME_URL is not set".to_string())
        })?;
        let token = cfg.actions_runtime_token.as_deref().ok_or_else(|| {
            JunitTraceError::Config("ACTIONS_RUNTIME_TOKEN is not set".to_string())
        })?;
        let run_id = cfg
            .run_id
            .ok_or_else(|| JunitTraceError::Config("GITHUB_RUN_ID is not set".to_string()))?;
        Self::new(url, token, run_id, cfg.http_timeout)
    }

    async fn create_container(&self, name: &str) -> Result<String> {
        let url = &self.artifacts_url;
        let resp = self
            .http
            .post(url)
            .query(&[("api-version", RUNTIME_API_VERSION)])
            .json(&CreateContainer {
                kind: "actions_storage",
                name,
            })
            .send()
            .await
            .map_err(|e| JunitTraceError::Http(format!("POST {url} failed: {e}")))?;
        let container: Container = ensure_success(resp, "POST", url)
            .await?
            .json()
            .await
            .map_err(|e| JunitTraceError::Http(format!("POST {url} returned bad JSON: {e}")))?;
        Ok(container.file_container_resource_url)
    }

    async fn put_file(&self, container_url: &str, item_path: &str, content: Vec<u8>) -> Result<()> {
        let len = content.len() as u64;
        let mut req = self
            .http
            .request(Method::PUT, container_url)
            .query(&[("itemPath", item_path)])
            .header(CONTENT_TYPE, "application/octet-stream");
        if len > 0 {
            req = req.header(CONTENT_RANGE, format!("bytes 0-{}/{len}", len - 1));
        }
        let resp = req
            .body(content)
            .send()
            .await
            .map_err(|e| JunitTraceError::Http(format!("PUT {container_url} failed: {e}")))?;
        ensure_success(resp, "PUT", container_url).await?;
        Ok(())
    }

    async fn finalize(&self, name: &str, size: u64) -> Result<()> {
        let url = &self.artifacts_url;
        let resp = self
            .http
            .patch(url)
            .query(&[("api-version", RUNTIME_API_VERSION), ("artifactName", name)])
            .json(&FinalizeContainer { size })
            .send()
            .await
            .map_err(|e| JunitTraceError::Http(format!("PATCH {url} failed: {e}")))?;
        ensure_success(resp, "PATCH", url).await?;
        Ok(())
    }
}

impl ArtifactClient for ActionsArtifactClient {
    async fn upload_artifact(
        &self,
        name: &str,
        files: &[PathBuf],
        root_dir: &Path,
    ) -> Result<UploadResponse> {
        let container_url = self.create_container(name).await?;
        debug!(artifact = name, files = files.len(), "created artifact container");

        let mut response = UploadResponse {
            artifact_name: name.to_string(),
            ..UploadResponse::default()
        };
        for file in files {
            let relative = file.strip_prefix(root_dir).unwrap_or(file);
            let item_path = format!("{name}/{}", relative.to_string_lossy().replace('\\', "/"));

            let outcome = match tokio::fs::read(file).await {
                Ok(content) => {
                    let len = content.len() as u64;
                    self.put_file(&container_url, &item_path, content)
                        .await
                        .map(|_| len)
                }
                Err(e) => Err(JunitTraceError::Io(format!(
                    "failed reading {}: {e}",
                    file.display()
                ))),
            };
            match outcome {
                Ok(len) => response.size += len,
                Err(err) => {
                    warn!(file = %file.display(), error = %err, "artifact file upload failed");
                    response.failed_items.push(file.clone());
                }
            }
        }

        self.finalize(name, response.size).await?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Default)]
    struct RecordingClient {
        fail: bool,
        calls: Mutex<Vec<(String, Vec<PathBuf>, PathBuf)>>,
    }

    impl ArtifactClient for RecordingClient {
        async fn upload_artifact(
            &self,
            name: &str,
            files: &[PathBuf],
            root_dir: &Path,
        ) -> Result<UploadResponse> {
            self.calls.lock().unwrap().push((
                name.to_string(),
                files.to_vec(),
                root_dir.to_path_buf(),
            ));
            Ok(UploadResponse {
                artifact_name: name.to_string(),
                size: 10,
                failed_items: if self.fail { files.to_vec() } else { Vec::new() },
            })
        }
    }

    #[test]
    fn key_wraps_job_and_step_in_braces() {
        assert_eq!(artifact_key("build", "run tests"), "{build}{run tests}");
    }

    #[tokio::test]
    async fn trace_log_is_uploaded_under_step_key() {
        let client = RecordingClient::default();
        upload_trace_log_artifact("build", "test", Path::new("trace.log"), &client)
            .await
            .unwrap();

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "{build}{test}");
        assert_eq!(calls[0].1, vec![PathBuf::from("trace.log")]);
        assert_eq!(calls[0].2, PathBuf::from("."));
    }

    #[tokio::test]
    async fn failed_items_are_an_error() {
        let client = RecordingClient {
            fail: true,
            ..RecordingClient::default()
        };
        let err = upload_trace_log_artifact("build", "test", Path::new("trace.log"), &client)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "export error: Failed to upload trace.log to Artifact<{build}{test}>"
        );
    }

    #[tokio::test]
    async fn runtime_protocol_creates_uploads_and_finalizes() {
        let server = MockServer::start().await;
        let artifacts_path = "/_apis/pipelines/workflows/42/artifacts";
        Mock::given(method("POST"))
            .and(path(artifacts_path))
            .and(query_param("api-version", RUNTIME_API_VERSION))
            .and(header("authorization", "Bearer runtime"))
            .and(body_json(json!({"Type": "actions_storage", "Name": "{build}{test}"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "fileContainerResourceUrl": format!("{}/container/9", server.uri()),
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/container/9"))
            .and(query_param("itemPath", "{build}{test}/trace.log"))
            .and(header("content-range", "bytes 0-4/5"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(artifacts_path))
            .and(query_param("artifactName", "{build}{test}"))
            .and(body_json(json!({"Size": 5})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("trace.log");
        std::fs::write(&log, "spans").unwrap();

        let client =
            ActionsArtifactClient::new(&server.uri(), "runtime", 42, Duration::from_secs(5)).unwrap();
        upload_trace_log_artifact("build", "test", &log, &client)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejected_file_is_reported_as_failed_item() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "fileContainerResourceUrl": format!("{}/container/9", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("trace.log");
        std::fs::write(&log, "spans").unwrap();

        let client =
            ActionsArtifactClient::new(&server.uri(), "runtime", 42, Duration::from_secs(5)).unwrap();
        let resp = client
            .upload_artifact("a", &[log.clone()], temp.path())
            .await
            .unwrap();
        assert_eq!(resp.failed_items, vec![log]);
        assert_eq!(resp.size, 0);
    }
}
