use std::path::Path;
use std::time::Duration;

use junit_trace_core::config::Config;
use junit_trace_core::error::{JunitTraceError, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::debug;

pub const API_VERSION: &str = "2022-11-28";
pub const PAGE_SIZE: u32 = 100;

const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";
const USER_AGENT_VALUE: &str = concat!("junit-trace/", env!("CARGO_PKG_VERSION"));

/// Authenticated client for the repository-scoped GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_url: String,
    owner: String,
    repo: String,
}

/// One artifact of a workflow run.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Artifact {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size_in_bytes: u64,
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
}

#[derive(Debug, Deserialize)]
struct ArtifactsPage {
    total_count: usize,
    #[serde(default)]
    artifacts: Vec<Artifact>,
}

impl GitHubClient {
    pub fn new(
        api_url: &str,
        token: &str,
        owner: &str,
        repo: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| JunitTraceError::Config(format!("invalid GitHub token: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GITHUB_JSON));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| JunitTraceError::Http(format!("failed building HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let token = cfg
            .github_token
            .as_deref()
            .ok_or_else(|| JunitTraceError::Config("Missing GITHUB_TOKEN secret".to_string()))?;
        let (owner, repo) = cfg.owner_repo()?;
        Self::new(&cfg.api_url, token, &owner, &repo, cfg.http_timeout)
    }

    pub(crate) fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{path}",
            self.api_url, self.owner, self.repo
        )
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!(url, ?query, "GitHub API request");
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| JunitTraceError::Http(format!("GET {url} failed: {e}")))?;
        let resp = ensure_success(resp, "GET", url).await?;
        resp.json()
            .await
            .map_err(|e| JunitTraceError::Http(format!("GET {url} returned bad JSON: {e}")))
    }

    /// Every artifact of a run, following pagination.
    pub async fn list_run_artifacts(&self, run_id: u64) -> Result<Vec<Artifact>> {
        let url = self.repo_url(&format!("/actions/runs/{run_id}/artifacts"));
        let mut artifacts = Vec::new();
        for page in 1.. {
            let resp: ArtifactsPage = self
                .get_json(
                    &url,
                    &[
                        ("page", page.to_string()),
                        ("per_page", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            if resp.artifacts.is_empty() {
                break;
            }
            artifacts.extend(resp.artifacts);
            if artifacts.len() >= resp.total_count {
                break;
            }
        }
        Ok(artifacts)
    }

    /// Saves the artifact's zip archive to `dest` and returns the number of bytes written.
    pub async fn download_artifact(&self, artifact: &Artifact, dest: &Path) -> Result<u64> {
        let url = artifact.archive_download_url.as_str();
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| JunitTraceError::Http(format!("GET {url} failed: {e}")))?;
        let resp = ensure_success(resp, "GET", url).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| JunitTraceError::Http(format!("GET {url} body failed: {e}")))?;

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                JunitTraceError::Io(format!("failed creating {}: {e}", parent.display()))
            })?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| JunitTraceError::Io(format!("failed creating {}: {e}", dest.display())))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| JunitTraceError::Io(format!("failed writing {}: {e}", dest.display())))?;
        file.flush()
            .await
            .map_err(|e| JunitTraceError::Io(format!("failed writing {}: {e}", dest.display())))?;

        debug!(artifact = %artifact.name, bytes = bytes.len(), "downloaded artifact");
        Ok(bytes.len() as u64)
    }
}

pub(crate) async fn ensure_success(resp: Response, method: &str, url: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(JunitTraceError::NotFound(format!("{method} {url}: {body}")));
    }
    Err(JunitTraceError::Http(format!(
        "{method} {url} returned {status}: {body}"
    )))
}
