use anyhow::{Context, bail};
use junit_trace_core::config::{Config, DEFAULT_REPORT_TYPE};
use junit_trace_github::{
    ActionsArtifactClient, ArtifactClient, GitHubClient, upload_trace_log_artifact,
};
use junit_trace_tracer::{
    TRACER_NAME, TraceJunitParams, TracerProviderParams, create_tracer_provider,
    trace_junit_artifact,
};
use opentelemetry::Context as OtelContext;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::{info, warn};

/// Inputs the step needs once configuration has been validated.
struct StepInputs<'a> {
    job_name: &'a str,
    step_name: &'a str,
    path: &'a str,
    run_id: u64,
}

/// Traces the reports of a finished job step and uploads the trace log as an artifact.
///
/// The tracer provider is shut down whatever the outcome.
pub async fn run_action(cfg: &Config) -> anyhow::Result<()> {
    if cfg.github_token.is_none() {
        bail!("Missing GITHUB_TOKEN secret");
    }
    if cfg.report_type != DEFAULT_REPORT_TYPE {
        bail!("Test file Type<{}> is not supported", cfg.report_type);
    }
    let inputs = StepInputs {
        job_name: cfg.job_name.as_deref().context("input jobName is required")?,
        step_name: cfg.step_name.as_deref().context("input stepName is required")?,
        path: cfg.path.as_deref().context("input path is required")?,
        run_id: cfg.run_id.context("GITHUB_RUN_ID is not set")?,
    };
    let (owner, repo) = cfg.owner_repo()?;

    let provider = create_tracer_provider(TracerProviderParams {
        trace_log_path: cfg.trace_log_path.clone(),
        service_name: cfg.workflow.clone().unwrap_or_default(),
        service_instance_id: cfg.sha.clone().unwrap_or_default(),
        service_namespace: format!("{owner}/{repo}"),
        service_version: cfg.service_version.clone(),
    })?;
    let result = match clients(cfg) {
        Ok((github, artifacts)) => trace_step(cfg, &inputs, &provider, &github, &artifacts).await,
        Err(err) => Err(err.into()),
    };

    info!("shutting down tracer provider");
    if let Err(err) = provider.shutdown() {
        warn!(error = %err, "tracer provider shutdown failed");
    }
    result
}

fn clients(cfg: &Config) -> junit_trace_core::Result<(GitHubClient, ActionsArtifactClient)> {
    Ok((
        GitHubClient::from_config(cfg)?,
        ActionsArtifactClient::from_config(cfg)?,
    ))
}

async fn trace_step<A: ArtifactClient>(
    cfg: &Config,
    inputs: &StepInputs<'_>,
    provider: &SdkTracerProvider,
    github: &GitHubClient,
    artifacts: &A,
) -> anyhow::Result<()> {
    let tracer = provider.tracer(TRACER_NAME);

    info!(job = inputs.job_name, step = inputs.step_name, "verifying job and step");
    let lookup = github
        .get_workflow_run_step(inputs.run_id, inputs.job_name, inputs.step_name)
        .await?;
    let Some((lookup, started_at)) =
        lookup.and_then(|l| l.step.started_at.map(|started_at| (l, started_at)))
    else {
        bail!(
            "Job<{}> and Step<{}> does not exist",
            inputs.job_name,
            inputs.step_name
        );
    };

    info!(path = inputs.path, start = %started_at, "tracing test reports");
    let traced = trace_junit_artifact(TraceJunitParams {
        tracer: &tracer,
        start_time: started_at,
        path: inputs.path,
        base_html_url: lookup.job.html_url.as_deref(),
        parent: &OtelContext::new(),
    })
    .await?;
    info!(
        status = ?traced.status,
        duration_secs = traced.duration_secs,
        "traced test reports"
    );

    provider.force_flush().context("failed flushing trace log")?;

    info!(path = %cfg.trace_log_path.display(), "uploading trace log");
    upload_trace_log_artifact(
        inputs.job_name,
        inputs.step_name,
        &cfg.trace_log_path,
        artifacts,
    )
    .await?;
    Ok(())
}
