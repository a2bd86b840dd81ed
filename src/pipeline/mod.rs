//! Pipeline module - fills document templates and converts them to PDF.
//!
//! The pieces, leaf first:
//! - `substitution` - replaces `{{.key}}` placeholders in document text
//! - `values` - normalizes caller JSON values into substitution text
//! - `docx` - reads and rewrites the word-processor container
//! - `resolver` - finds the external converter binary
//! - `converter` - runs the converter with a wall-clock timeout
//! - `artifacts` - working directory, file naming and orphan sweeping
//! - `orchestrator` - sequences all of the above for one request

pub mod artifacts;
pub mod converter;
pub mod docx;
pub mod orchestrator;
pub mod resolver;
pub mod substitution;
pub mod values;

pub use artifacts::{ArtifactStore, OutputArtifact};
pub use converter::ConverterInvoker;
pub use orchestrator::{ConversionPipeline, TemplateHandle};
pub use substitution::{find_placeholders, substitute};
pub use values::{normalize_data, Substitutions};

use std::path::PathBuf;
use thiserror::Error;

/// Machine-readable failure class, surfaced to HTTP callers as `ErrorResponse::error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    ConverterUnavailable,
    ConversionFailed,
    ConversionTimeout,
    OutputMissing,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::InvalidInput => "InvalidInput",
            Self::ConverterUnavailable => "ConverterUnavailable",
            Self::ConversionFailed => "ConversionFailed",
            Self::ConversionTimeout => "ConversionTimeout",
            Self::OutputMissing => "OutputMissing",
            Self::Internal => "InternalServerError",
        }
    }
}

/// Errors that can occur while filling and converting a template.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid template type: {kind}")]
    InvalidTemplateType { kind: String },
    #[error("invalid data type for key {key}")]
    InvalidDataType { key: String },
    #[error("template file not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },
    #[error("template unreadable: {}: {source}", path.display())]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template is not a valid document: {reason}")]
    MalformedDocument { reason: String },
    #[error("failed to stage intermediate document {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("converter not found in any of: {}", format_candidates(searched))]
    ConverterUnavailable { searched: Vec<PathBuf> },
    #[error("conversion failed: {reason}")]
    ConversionFailed { reason: String, output: String },
    #[error("conversion timed out after {timeout_secs} seconds")]
    ConversionTimeout { timeout_secs: u64, output: String },
    #[error("output not produced: {}", path.display())]
    OutputMissing { path: PathBuf },
    #[error("pipeline worker failed: {0}")]
    Worker(String),
}

fn format_candidates(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TemplateNotFound { .. } | Self::TemplateUnreadable { .. } => ErrorKind::NotFound,
            Self::InvalidTemplateType { .. }
            | Self::InvalidDataType { .. }
            | Self::MalformedDocument { .. } => ErrorKind::InvalidInput,
            Self::ConverterUnavailable { .. } => ErrorKind::ConverterUnavailable,
            Self::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            Self::ConversionTimeout { .. } => ErrorKind::ConversionTimeout,
            Self::OutputMissing { .. } => ErrorKind::OutputMissing,
            Self::Staging { .. } | Self::Worker(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status class for this failure.
    pub fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Captured converter output, if this failure came from the subprocess.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::ConversionFailed { output, .. } | Self::ConversionTimeout { output, .. }
                if !output.is_empty() =>
            {
                Some(output.as_str())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_kinds_map_to_status_classes() {
        let not_found = PipelineError::TemplateNotFound {
            path: PathBuf::from("storage/templates/missing.docx"),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let bad_type = PipelineError::InvalidDataType { key: "paid".into() };
        assert_eq!(bad_type.kind(), ErrorKind::InvalidInput);
        assert_eq!(bad_type.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad_type.to_string(), "invalid data type for key paid");

        let timeout = PipelineError::ConversionTimeout {
            timeout_secs: 30,
            output: String::new(),
        };
        assert_eq!(timeout.kind(), ErrorKind::ConversionTimeout);
        assert_eq!(timeout.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(timeout.diagnostics().is_none());
    }

    #[test]
    fn test_conversion_failure_carries_output() {
        let err = PipelineError::ConversionFailed {
            reason: "exit status 1".into(),
            output: "Error: source file could not be loaded\n".into(),
        };
        assert_eq!(
            err.diagnostics(),
            Some("Error: source file could not be loaded\n")
        );
    }

    #[test]
    fn test_unavailable_lists_searched_paths() {
        let err = PipelineError::ConverterUnavailable {
            searched: vec![PathBuf::from("/usr/bin/soffice"), PathBuf::from("/opt/x")],
        };
        assert_eq!(
            err.to_string(),
            "converter not found in any of: /usr/bin/soffice, /opt/x"
        );
    }
}
