use chrono::{DateTime, Utc};
use junit_trace_core::error::Result;
use serde::Deserialize;
use tracing::debug;

use crate::client::{GitHubClient, PAGE_SIZE};

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkflowStep {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    pub number: u64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepLookup {
    pub job: WorkflowJob,
    pub step: WorkflowStep,
}

#[derive(Debug, Deserialize)]
struct JobsPage {
    total_count: usize,
    #[serde(default)]
    jobs: Vec<WorkflowJob>,
}

impl GitHubClient {
    /// Jobs of the latest attempt of a run, following pagination.
    pub async fn list_run_jobs(&self, run_id: u64) -> Result<Vec<WorkflowJob>> {
        let url = self.repo_url(&format!("/actions/runs/{run_id}/jobs"));
        let mut jobs = Vec::new();
        for page in 1.. {
            let resp: JobsPage = self
                .get_json(
                    &url,
                    &[
                        ("filter", "latest".to_string()),
                        ("page", page.to_string()),
                        ("per_page", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            if resp.jobs.is_empty() {
                break;
            }
            jobs.extend(resp.jobs);
            if jobs.len() >= resp.total_count {
                break;
            }
        }
        debug!(run_id, jobs = jobs.len(), "listed workflow jobs");
        Ok(jobs)
    }

    /// Finds the named step of the named job. Names match exactly; the first match wins.
    pub async fn get_workflow_run_step(
        &self,
        run_id: u64,
        job_name: &str,
        step_name: &str,
    ) -> Result<Option<StepLookup>> {
        let jobs = self.list_run_jobs(run_id).await?;
        Ok(find_step(jobs, job_name, step_name))
    }
}

fn find_step(jobs: Vec<WorkflowJob>, job_name: &str, step_name: &str) -> Option<StepLookup> {
    let job = jobs.into_iter().find(|job| job.name == job_name)?;
    let step = job.steps.iter().find(|step| step.name == step_name)?.clone();
    Some(StepLookup { job, step })
}
