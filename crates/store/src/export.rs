use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use junit_trace_core::error::{JunitTraceError, Result};
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::transform::common::tonic::ResourceAttributesWithSchema;
use opentelemetry_proto::transform::trace::tonic::group_spans_by_resource_and_scope;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use tracing::debug;

/// Span exporter that appends each batch to a file as one OTLP/JSON
/// `ExportTraceServiceRequest` line.
#[derive(Debug)]
pub struct FileSpanExporter {
    path: PathBuf,
    file: Option<File>,
    resource: ResourceAttributesWithSchema,
}

impl FileSpanExporter {
    /// Opens `path` for appending, creating it and its parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                JunitTraceError::Io(format!("failed creating {}: {e}", parent.display()))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| JunitTraceError::Io(format!("failed opening {}: {e}", path.display())))?;

        Ok(Self {
            path,
            file: Some(file),
            resource: ResourceAttributesWithSchema::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&mut self, batch: Vec<SpanData>) -> OTelSdkResult {
        if batch.is_empty() {
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            return Err(OTelSdkError::AlreadyShutdown);
        };

        let count = batch.len();
        let request = ExportTraceServiceRequest {
            resource_spans: group_spans_by_resource_and_scope(batch, &self.resource),
        };
        let mut buf = serde_json::to_vec(&request)
            .map_err(|e| OTelSdkError::InternalFailure(format!("encode spans failed: {e}")))?;
        buf.push(b'\n');
        file.write_all(&buf)
            .and_then(|_| file.flush())
            .map_err(|e| {
                OTelSdkError::InternalFailure(format!(
                    "write {} failed: {e}",
                    self.path.display()
                ))
            })?;

        debug!(spans = count, path = %self.path.display(), "appended span batch");
        Ok(())
    }
}

impl SpanExporter for FileSpanExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, OTelSdkResult> {
        let result = self.write_batch(batch);
        Box::pin(std::future::ready(result))
    }

    fn shutdown(&mut self) -> OTelSdkResult {
        match self.file.take() {
            Some(mut file) => file
                .flush()
                .map_err(|e| OTelSdkError::InternalFailure(format!("flush failed: {e}"))),
            None => Err(OTelSdkError::AlreadyShutdown),
        }
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.into();
    }
}
