use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures::StreamExt;
use sanitize_filename::sanitize;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::template::models::TemplateKind;
use crate::ErrorResponse;

/// Fields of a template upload, with the file still in memory.
#[derive(Debug)]
pub struct ParsedUpload {
    pub name: String,
    pub template_type: TemplateKind,
    pub file_name: String,
    pub file_data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid template type: {0}")]
    InvalidTemplateType(String),
    #[error("Invalid UTF-8 data: {0}")]
    Utf8Error(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<UploadError> for HttpResponse {
    fn from(error: UploadError) -> Self {
        match error {
            UploadError::IoError(_) => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&error.to_string())),
            _ => HttpResponse::BadRequest().json(ErrorResponse::bad_request(&error.to_string())),
        }
    }
}

async fn read_text(field: &mut actix_multipart::Field) -> Result<String, UploadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| UploadError::IoError(e.to_string()))?;
        bytes.extend_from_slice(&chunk);
    }
    let value = String::from_utf8(bytes).map_err(|e| UploadError::Utf8Error(e.to_string()))?;
    Ok(value.trim().to_string())
}

/// Read `name`, `template_type` and `file` from the form. Unknown fields are skipped.
pub async fn parse_template_upload(mut multipart: Multipart) -> Result<ParsedUpload, UploadError> {
    let mut name: Option<String> = None;
    let mut template_type: Option<TemplateKind> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(item) = multipart.next().await {
        let mut field = item.map_err(|e| UploadError::FieldError(e.to_string()))?;
        let content_disposition = field
            .content_disposition()
            .ok_or_else(|| UploadError::FieldError("Content disposition not found".to_string()))?;
        let field_name = content_disposition
            .get_name()
            .ok_or_else(|| UploadError::FieldError("Field name not found".to_string()))?
            .to_string();
        let file_name = content_disposition.get_filename().map(sanitize);

        match field_name.as_str() {
            "name" => {
                let value = read_text(&mut field).await?;
                if !value.is_empty() {
                    name = Some(value);
                }
            }
            "template_type" => {
                let value = read_text(&mut field).await?;
                if !value.is_empty() {
                    template_type = Some(
                        value
                            .parse()
                            .map_err(UploadError::InvalidTemplateType)?,
                    );
                }
            }
            "file" => {
                let file_name = file_name
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| UploadError::FieldError("No filename in file field".to_string()))?;
                let mut data = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk.map_err(|e| UploadError::IoError(e.to_string()))?;
                    data.extend_from_slice(&chunk);
                }
                file = Some((file_name, data));
            }
            _ => continue,
        }
    }

    let name = name.ok_or(UploadError::MissingField("name"))?;
    let template_type = template_type.ok_or(UploadError::MissingField("template_type"))?;
    let (file_name, file_data) = file.ok_or(UploadError::MissingField("file"))?;

    Ok(ParsedUpload {
        name,
        template_type,
        file_name,
        file_data,
    })
}

/// `<unix nanos>_<file name>` inside `dir`.
pub fn stored_path(dir: &Path, file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    dir.join(format!("{}_{}", nanos, file_name))
}

/// Write the uploaded bytes under `dir` and return where they landed.
pub async fn save_upload(dir: &Path, upload: &ParsedUpload) -> Result<PathBuf, UploadError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| UploadError::IoError(format!("Failed to create {}: {}", dir.display(), e)))?;

    let path = stored_path(dir, &upload.file_name);
    tokio::fs::write(&path, &upload.file_data)
        .await
        .map_err(|e| UploadError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_stored_path_is_prefixed_with_timestamp() {
        let path = stored_path(Path::new("storage/templates"), "invoice.docx");
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        let (prefix, rest) = file_name.split_once('_').unwrap();

        assert_eq!(rest, "invoice.docx");
        assert!(prefix.parse::<u128>().is_ok());
        assert_eq!(path.parent().unwrap(), Path::new("storage/templates"));
    }

    #[tokio::test]
    async fn test_save_upload_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let upload = ParsedUpload {
            name: "Invoice".into(),
            template_type: TemplateKind::Docx,
            file_name: "invoice.docx".into(),
            file_data: b"PK-bytes".to_vec(),
        };

        let path = save_upload(&dir.path().join("templates"), &upload).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK-bytes");
    }

    #[test]
    fn test_error_status_mapping() {
        let bad: HttpResponse = UploadError::MissingField("file").into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let bad: HttpResponse = UploadError::InvalidTemplateType("pdf".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let io: HttpResponse = UploadError::IoError("disk full".into()).into();
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
