mod actions;
mod output;
mod run;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use junit_trace_core::JunitTraceError;
use junit_trace_core::config::Config;
use junit_trace_core::time::parse_time_or_relative;
use junit_trace_github::{GitHubClient, artifact_key};
use junit_trace_store::read_trace_log;
use junit_trace_tracer::{
    TRACER_NAME, TraceJunitParams, TracerProviderParams, create_tracer_provider,
    trace_junit_artifact,
};
use opentelemetry::trace::TracerProvider;
use tracing::{info, warn};

use crate::output::print_trace_log_human;
use crate::run::run_action;
use crate::telemetry::init_cli_tracing;

#[derive(Parser, Debug)]
#[command(name = "junit-trace")]
#[command(about = "Turn JUnit XML test reports into OpenTelemetry traces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Trace a finished workflow step and upload the trace log (GitHub Action entry point)")]
    Run {
        #[arg(long)]
        job_name: Option<String>,
        #[arg(long)]
        step_name: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long = "type")]
        report_type: Option<String>,
        #[arg(long)]
        trace_log: Option<PathBuf>,
    },

    #[command(about = "Trace local JUnit reports into a trace log")]
    Trace {
        /// Glob pattern selecting the report files.
        path: String,
        /// Root span start, RFC3339 or a duration ago (`5m`). Defaults to now.
        #[arg(long)]
        start: Option<String>,
        #[arg(long, default_value = "trace.log")]
        trace_log: PathBuf,
        #[arg(long, default_value = "junit-trace")]
        service_name: String,
        #[arg(long)]
        base_html_url: Option<String>,
    },

    #[command(about = "Print the spans of a trace log as a tree")]
    Show {
        #[arg(default_value = "trace.log")]
        log: PathBuf,
    },

    #[command(about = "Download the trace log artifact of a workflow step")]
    Download {
        #[arg(long)]
        run_id: Option<u64>,
        #[arg(long)]
        job_name: String,
        #[arg(long)]
        step_name: String,
        #[arg(long, default_value = "trace-log.zip")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_cli_tracing();
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Commands::Run {
            job_name,
            step_name,
            path,
            report_type,
            trace_log,
        } => {
            let result = load_run_config(job_name, step_name, path, report_type, trace_log);
            let result = match result {
                Ok(cfg) => run_action(&cfg).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    actions::set_failed(&format!("{err:#}"));
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Trace {
            path,
            start,
            trace_log,
            service_name,
            base_html_url,
        } => report(
            run_trace(path, start, trace_log, service_name, base_html_url, json).await,
        ),
        Commands::Show { log } => report(run_show(&log, json)),
        Commands::Download {
            run_id,
            job_name,
            step_name,
            out,
        } => report(run_download(run_id, &job_name, &step_name, &out).await),
    }
}

fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_run_config(
    job_name: Option<String>,
    step_name: Option<String>,
    path: Option<String>,
    report_type: Option<String>,
    trace_log: Option<PathBuf>,
) -> anyhow::Result<Config> {
    let mut cfg = Config::load()?;
    apply_run_flags(&mut cfg, job_name, step_name, path, report_type, trace_log);
    Ok(cfg)
}

fn apply_run_flags(
    cfg: &mut Config,
    job_name: Option<String>,
    step_name: Option<String>,
    path: Option<String>,
    report_type: Option<String>,
    trace_log: Option<PathBuf>,
) {
    if job_name.is_some() {
        cfg.job_name = job_name;
    }
    if step_name.is_some() {
        cfg.step_name = step_name;
    }
    if path.is_some() {
        cfg.path = path;
    }
    if let Some(v) = report_type {
        cfg.report_type = v;
    }
    if let Some(v) = trace_log {
        cfg.trace_log_path = v;
    }
}

async fn run_trace(
    path: String,
    start: Option<String>,
    trace_log: PathBuf,
    service_name: String,
    base_html_url: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let start_time: DateTime<Utc> = match start {
        Some(raw) => parse_time_or_relative(&raw)?,
        None => Utc::now(),
    };
    let provider = create_tracer_provider(TracerProviderParams {
        trace_log_path: trace_log.clone(),
        service_name,
        service_instance_id: String::new(),
        service_namespace: String::new(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
    })?;
    let tracer = provider.tracer(TRACER_NAME);

    let result = trace_junit_artifact(TraceJunitParams {
        tracer: &tracer,
        start_time,
        path: &path,
        base_html_url: base_html_url.as_deref(),
        parent: &opentelemetry::Context::new(),
    })
    .await;
    if let Err(err) = provider.shutdown() {
        warn!(error = %err, "tracer provider shutdown failed");
    }
    let traced = result?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "trace_log": trace_log,
                "duration_secs": traced.duration_secs,
                "error": traced.status.is_error(),
            })
        );
    } else {
        println!(
            "traced {path} into {} duration={}ms status={}",
            trace_log.display(),
            (traced.duration_secs * 1000.0).round() as i64,
            if traced.status.is_error() { "ERROR" } else { "OK" }
        );
    }
    Ok(())
}

fn run_show(log: &Path, json: bool) -> anyhow::Result<()> {
    let spans = read_trace_log(log)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&spans)?);
    } else {
        print_trace_log_human(&spans);
    }
    Ok(())
}

async fn run_download(
    run_id: Option<u64>,
    job_name: &str,
    step_name: &str,
    out: &Path,
) -> anyhow::Result<()> {
    let cfg = Config::load()?;
    let run_id = run_id
        .or(cfg.run_id)
        .context("pass --run-id or set GITHUB_RUN_ID")?;
    let client = GitHubClient::from_config(&cfg)?;

    let key = artifact_key(job_name, step_name);
    let artifacts = client.list_run_artifacts(run_id).await?;
    let artifact = artifacts
        .iter()
        .find(|a| a.name == key && !a.expired)
        .ok_or_else(|| JunitTraceError::NotFound(format!("Artifact<{key}> in run {run_id}")))?;

    info!(artifact = %artifact.name, run_id, "downloading trace log artifact");
    let bytes = client.download_artifact(artifact, out).await?;
    println!("saved {} ({bytes} bytes) to {}", artifact.name, out.display());
    Ok(())
}
