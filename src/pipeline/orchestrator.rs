//! End-to-end template fill and conversion.
//!
//! One call walks `Loaded -> Substituted -> Staged -> Converted -> Verified`
//! and stops at the first failure. The intermediate document and any output
//! produced by a failed conversion are removed before returning.

use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use uuid::Uuid;

use super::artifacts::{ArtifactStore, OutputArtifact};
use super::converter::{ConverterInvoker, TARGET_FORMAT};
use super::docx::DocxDocument;
use super::values::normalize_data;
use super::PipelineError;
use crate::template::models::TemplateKind;

/// A stored template resolved to a file on disk.
#[derive(Debug, Clone)]
pub struct TemplateHandle {
    pub path: PathBuf,
    pub kind: TemplateKind,
}

impl TemplateHandle {
    pub fn new(path: impl Into<PathBuf>, kind: TemplateKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Loaded,
    Substituted,
    Staged,
    Converted,
    Verified,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "LOADED",
            Stage::Substituted => "SUBSTITUTED",
            Stage::Staged => "STAGED",
            Stage::Converted => "CONVERTED",
            Stage::Verified => "VERIFIED",
        };
        f.write_str(name)
    }
}

pub struct ConversionPipeline {
    artifacts: ArtifactStore,
    converter: ConverterInvoker,
}

impl ConversionPipeline {
    pub fn new(artifacts: ArtifactStore, converter: ConverterInvoker) -> Self {
        Self {
            artifacts,
            converter,
        }
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn converter(&self) -> &ConverterInvoker {
        &self.converter
    }

    /// Fill `template` with `data` and convert it to PDF.
    ///
    /// The returned artifact lives in the working directory until the caller
    /// reads or drops it.
    pub async fn generate(
        &self,
        template: &TemplateHandle,
        data: &Map<String, Value>,
    ) -> Result<OutputArtifact, PipelineError> {
        let request_id = Uuid::new_v4();
        let result = self.run(request_id, template, data).await;
        if let Err(e) = &result {
            match e.diagnostics() {
                Some(output) => log::error!("[{}] conversion failed: {} | converter output: {}", request_id, e, output),
                None => log::error!("[{}] conversion failed: {}", request_id, e),
            }
        }
        result
    }

    async fn run(
        &self,
        request_id: Uuid,
        template: &TemplateHandle,
        data: &Map<String, Value>,
    ) -> Result<OutputArtifact, PipelineError> {
        if !template.kind.is_convertible() {
            return Err(PipelineError::InvalidTemplateType {
                kind: template.kind.to_string(),
            });
        }
        let values = normalize_data(data)?;

        let template_path = template.path.clone();
        let document = tokio::task::spawn_blocking(move || -> Result<DocxDocument, PipelineError> {
            let mut document = DocxDocument::open(&template_path)?;
            log::debug!("[{}] {} {}", request_id, Stage::Loaded, template_path.display());
            document.substitute(&values);
            Ok(document)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;

        log::debug!("[{}] {}", request_id, Stage::Substituted);
        let unresolved = document.unresolved();
        if !unresolved.is_empty() {
            log::debug!(
                "[{}] placeholders without data: {}",
                request_id,
                unresolved.join(", ")
            );
        }

        self.artifacts
            .ensure_dir()
            .await
            .map_err(|source| PipelineError::Staging {
                path: self.artifacts.root().to_path_buf(),
                source,
            })?;

        let intermediate_path = self.artifacts.intermediate_path(&template.path, &request_id);
        // The guard is created inside the blocking task so that a cancelled
        // request still removes the file once the write finishes.
        let intermediate = tokio::task::spawn_blocking(move || -> Result<TempPath, PipelineError> {
            let guard = TempPath::from_path(intermediate_path);
            document.write_to(&guard)?;
            Ok(guard)
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;
        log::debug!("[{}] {} {}", request_id, Stage::Staged, intermediate.display());

        let output = OutputArtifact::new(
            self.artifacts.expected_output_path(&intermediate),
            download_name(&template.path),
        );

        self.converter
            .convert(&intermediate, self.artifacts.root())
            .await?;
        log::debug!("[{}] {}", request_id, Stage::Converted);

        if !tokio::fs::try_exists(output.path()).await.unwrap_or(false) {
            return Err(PipelineError::OutputMissing {
                path: output.path().to_path_buf(),
            });
        }
        log::debug!("[{}] {} {}", request_id, Stage::Verified, output.path().display());

        if let Err(e) = intermediate.close() {
            log::warn!("[{}] failed to remove intermediate document: {}", request_id, e);
        }
        log::info!("[{}] generated {}", request_id, output.path().display());
        Ok(output)
    }
}

/// `<template stem>.pdf`, used as the client-facing file name.
fn download_name(template: &Path) -> String {
    let stem = template
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{}.{}", stem, TARGET_FORMAT)
}
