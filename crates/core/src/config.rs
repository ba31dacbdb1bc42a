use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{JunitTraceError, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_REPORT_TYPE: &str = "junit";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub job_name: Option<String>,
    pub step_name: Option<String>,
    pub path: Option<String>,
    pub report_type: String,
    pub github_token: Option<String>,
    pub api_url: String,
    pub repository: Option<String>,
    pub run_id: Option<u64>,
    pub workflow: Option<String>,
    pub sha: Option<String>,
    pub trace_log_path: PathBuf,
    pub service_version: String,
    pub actions_runtime_url: Option<String>,
    pub actions_runtime_token: Option<String>,
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_name: None,
            step_name: None,
            path: None,
            report_type: DEFAULT_REPORT_TYPE.to_string(),
            github_token: None,
            api_url: DEFAULT_API_URL.to_string(),
            repository: None,
            run_id: None,
            workflow: None,
            sha: None,
            trace_log_path: PathBuf::from("trace.log"),
            service_version: "1.0.0".to_string(),
            actions_runtime_url: None,
            actions_runtime_token: None,
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides(|key| env::var(key).ok())?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        let env_overrides = load_env_overrides(|key| env::var(key).ok())?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }

    /// Splits `repository` into `(owner, repo)`.
    pub fn owner_repo(&self) -> Result<(String, String)> {
        let raw = self
            .repository
            .as_deref()
            .ok_or_else(|| JunitTraceError::Config("repository is not set".to_string()))?;
        parse_repository(raw)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    job_name: Option<String>,
    step_name: Option<String>,
    path: Option<String>,
    report_type: Option<String>,
    github_token: Option<String>,
    api_url: Option<String>,
    repository: Option<String>,
    run_id: Option<u64>,
    workflow: Option<String>,
    sha: Option<String>,
    trace_log_path: Option<PathBuf>,
    service_version: Option<String>,
    actions_runtime_url: Option<String>,
    actions_runtime_token: Option<String>,
    http_timeout: Option<String>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("JUNIT_TRACE_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("junit-trace/config.toml")
}

fn load_file_overrides(path: &PathBuf) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path).map_err(|e| {
        JunitTraceError::Config(format!("failed reading {}: {e}", path.display()))
    })?;
    let parsed: ConfigOverrides = toml::from_str(&raw).map_err(|e| {
        JunitTraceError::Config(format!("failed parsing {}: {e}", path.display()))
    })?;
    Ok(Some(parsed))
}

/// Reads GitHub Actions inputs (`INPUT_*`) and runner variables. The runner exports
/// unset inputs as empty strings, so empty values count as missing.
fn load_env_overrides<F>(lookup: F) -> Result<ConfigOverrides>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let run_id = match var("GITHUB_RUN_ID") {
        Some(v) => Some(v.trim().parse::<u64>().map_err(|e| {
            JunitTraceError::Config(format!("bad GITHUB_RUN_ID in environment: {e}"))
        })?),
        None => None,
    };

    Ok(ConfigOverrides {
        job_name: var("INPUT_JOBNAME"),
        step_name: var("INPUT_STEPNAME"),
        path: var("INPUT_PATH"),
        report_type: var("INPUT_TYPE"),
        github_token: var("INPUT_GITHUBTOKEN").or_else(|| var("GITHUB_TOKEN")),
        api_url: var("GITHUB_API_URL"),
        repository: var("GITHUB_REPOSITORY"),
        run_id,
        workflow: var("GITHUB_WORKFLOW"),
        sha: var("GITHUB_SHA"),
        trace_log_path: var("JUNIT_TRACE_LOG_PATH").map(PathBuf::from),
        service_version: None,
        actions_runtime_url: var("ACTIONS_RUNTIME_URL"),
        actions_runtime_token: var("ACTIONS_RUNTIME_TOKEN"),
        http_timeout: var("JUNIT_TRACE_HTTP_TIMEOUT"),
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.job_name {
        cfg.job_name = Some(v);
    }
    if let Some(v) = overrides.step_name {
        cfg.step_name = Some(v);
    }
    if let Some(v) = overrides.path {
        cfg.path = Some(v);
    }
    if let Some(v) = overrides.report_type {
        cfg.report_type = v;
    }
    if let Some(v) = overrides.github_token {
        cfg.github_token = Some(v);
    }
    if let Some(v) = overrides.api_url {
        cfg.api_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = overrides.repository {
        parse_repository(&v).map_err(|e| {
            JunitTraceError::Config(format!("bad repository in {source}: {e} (value={v})"))
        })?;
        cfg.repository = Some(v);
    }
    if let Some(v) = overrides.run_id {
        cfg.run_id = Some(v);
    }
    if let Some(v) = overrides.workflow {
        cfg.workflow = Some(v);
    }
    if let Some(v) = overrides.sha {
        cfg.sha = Some(v);
    }
    if let Some(v) = overrides.trace_log_path {
        cfg.trace_log_path = v;
    }
    if let Some(v) = overrides.service_version {
        cfg.service_version = v;
    }
    if let Some(v) = overrides.actions_runtime_url {
        cfg.actions_runtime_url = Some(v);
    }
    if let Some(v) = overrides.actions_runtime_token {
        cfg.actions_runtime_token = Some(v);
    }
    if let Some(v) = overrides.http_timeout {
        cfg.http_timeout = humantime::parse_duration(&v).map_err(|e| {
            JunitTraceError::Config(format!("bad http_timeout in {source}: {e} (value={v})"))
        })?;
    }
    Ok(())
}

fn parse_repository(raw: &str) -> Result<(String, String)> {
    let Some((owner, repo)) = raw.trim().split_once('/') else {
        return Err(JunitTraceError::Config(
            "repository must use owner/repo syntax".to_string(),
        ));
    };
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(JunitTraceError::Config(
            "repository must use owner/repo syntax".to_string(),
        ));
    }
    Ok((owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_targets_public_api_and_junit() {
        let cfg = Config::default();
        assert_eq!(cfg.api_url, "https://api.github.com");
        assert_eq!(cfg.report_type, "junit");
        assert_eq!(cfg.trace_log_path, PathBuf::from("trace.log"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn actions_inputs_and_runner_vars_apply() {
        let overrides = load_env_overrides(env_of(&[
            ("INPUT_JOBNAME", "build"),
            ("INPUT_STEPNAME", "run tests"),
            ("INPUT_PATH", "reports/*.xml"),
            ("INPUT_TYPE", "junit"),
            ("GITHUB_TOKEN", "ghs_token"),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_RUN_ID", "42"),
            ("GITHUB_WORKFLOW", "CI"),
            ("GITHUB_SHA", "abc123"),
        ]))
        .unwrap();

        let mut cfg = Config::default();
        apply_overrides(&mut cfg, overrides, "environment").unwrap();

        assert_eq!(cfg.job_name.as_deref(), Some("build"));
        assert_eq!(cfg.step_name.as_deref(), Some("run tests"));
        assert_eq!(cfg.path.as_deref(), Some("reports/*.xml"));
        assert_eq!(cfg.github_token.as_deref(), Some("ghs_token"));
        assert_eq!(cfg.run_id, Some(42));
        assert_eq!(
            cfg.owner_repo().unwrap(),
            ("acme".to_string(), "widgets".to_string())
        );
    }

    #[test]
    fn explicit_token_input_wins_and_empty_inputs_are_missing() {
        let overrides = load_env_overrides(env_of(&[
            ("INPUT_GITHUBTOKEN", "from-input"),
            ("GITHUB_TOKEN", "from-env"),
            ("INPUT_JOBNAME", ""),
        ]))
        .unwrap();
        assert_eq!(overrides.github_token.as_deref(), Some("from-input"));
        assert!(overrides.job_name.is_none());
    }

    #[test]
    fn bad_run_id_is_config_error() {
        assert!(load_env_overrides(env_of(&[("GITHUB_RUN_ID", "abc")])).is_err());
    }

    #[test]
    fn file_overrides_update_timeout_and_api() {
        let mut cfg = Config::default();
        let file = ConfigOverrides {
            api_url: Some("https://ghe.example.com/api/v3/".to_string()),
            http_timeout: Some("5s".to_string()),
            trace_log_path: Some(PathBuf::from("out/trace.log")),
            ..ConfigOverrides::default()
        };
        apply_overrides(&mut cfg, file, "config file").unwrap();
        assert_eq!(cfg.api_url, "https://ghe.example.com/api/v3");
        assert_eq!(cfg.http_timeout, Duration::from_secs(5));
        assert_eq!(cfg.trace_log_path, PathBuf::from("out/trace.log"));
    }

    #[test]
    fn rejects_bad_repository() {
        assert!(parse_repository("acme").is_err());
        assert!(parse_repository("/widgets").is_err());
        assert!(parse_repository("a/b/c").is_err());
        let mut cfg = Config::default();
        let bad = ConfigOverrides {
            repository: Some("nope".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad, "config file").is_err());
    }
}
