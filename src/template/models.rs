use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of stored template. Only `docx` can be filled and converted.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Excel,
    Docx,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Docx => "docx",
        }
    }

    pub fn is_convertible(&self) -> bool {
        matches!(self, Self::Docx)
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excel" => Ok(Self::Excel),
            "docx" => Ok(Self::Docx),
            other => Err(format!(
                "unknown template type '{}', expected one of: excel, docx",
                other
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct Template {
    #[schema(example = "0b9f2d4e-3c1a-4f6b-9d2e-7a8b9c0d1e2f")]
    pub id: Uuid,
    #[schema(example = "Monthly invoice")]
    pub name: String,
    pub template_type: TemplateKind,
    #[schema(example = "storage/templates/1735689600000000000_invoice.docx")]
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(name: String, template_type: TemplateKind, path: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            template_type,
            path,
            created_at: now,
            updated_at: now,
        }
    }

    /// Stored file name without its directory.
    pub fn file_name(&self) -> String {
        Path::new(&self.path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.clone())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct TemplateResponse {
    pub id: Uuid,
    #[schema(example = "Monthly invoice")]
    pub name: String,
    pub template_type: TemplateKind,
    /// Public download URL of the stored template.
    #[schema(example = "http://127.0.0.1:8080/storage/templates/1735689600000000000_invoice.docx")]
    pub url: String,
    #[schema(example = "storage/templates/1735689600000000000_invoice.docx")]
    pub path_original: String,
}

impl TemplateResponse {
    pub fn from_template(template: &Template, base_url: &str) -> Self {
        Self {
            id: template.id,
            name: template.name.clone(),
            template_type: template.template_type,
            url: format!(
                "{}/storage/templates/{}",
                base_url.trim_end_matches('/'),
                template.file_name()
            ),
            path_original: template.path.clone(),
        }
    }
}

/// Multipart form accepted by `POST /api/v1/templates/store` (documentation only).
#[derive(Debug, Deserialize, ToSchema)]
pub struct UploadTemplateRequest {
    #[allow(unused)]
    #[schema(example = "Monthly invoice")]
    pub name: String,
    #[allow(unused)]
    #[schema(example = "docx")]
    pub template_type: String,
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GeneratePdfRequest {
    #[schema(example = "0b9f2d4e-3c1a-4f6b-9d2e-7a8b9c0d1e2f")]
    pub template_id: String,
    /// Placeholder values; each must be a string or a number.
    #[schema(value_type = Object, example = json!({"customer": "ACME", "total": 42}))]
    pub data: Map<String, Value>,
}
