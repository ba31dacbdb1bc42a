pub mod artifact;
pub mod client;
pub mod jobs;

pub use artifact::{
    ActionsArtifactClient, ArtifactClient, UploadResponse, artifact_key, upload_trace_log_artifact,
};
pub use client::{Artifact, GitHubClient};
pub use jobs::{StepLookup, WorkflowJob, WorkflowStep};
