mod common;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{docx_with_body, test_state};
use report_converter::template::models::{Template, TemplateKind, TemplateResponse};
use report_converter::{configure, AppState, ErrorResponse};

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(configure),
        )
        .await
    };
}

async fn seed_template(state: &AppState, file_name: &str, kind: TemplateKind, bytes: &[u8]) -> Template {
    let dir = state.config.templates_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(file_name);
    std::fs::write(&path, bytes).unwrap();
    let template = Template::new("Invoice".into(), kind, path.to_string_lossy().into_owned());
    state.insert_template(&template).await.unwrap();
    template
}

fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[actix_web::test]
async fn test_health_and_welcome() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(test_state(dir.path(), None));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");

    let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_list_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(test_state(dir.path(), None));

    let req = test::TestRequest::get().uri("/api/v1/templates").to_request();
    let body: Vec<TemplateResponse> = test::call_and_read_body_json(&app, req).await;
    assert!(body.is_empty());
}

#[actix_web::test]
async fn test_get_by_id_status_codes() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), None);
    let template = seed_template(&state, "invoice.docx", TemplateKind::Docx, b"x").await;
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/api/v1/templates/not-a-uuid").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/templates/{}", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "NotFound");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/templates/{}", template.id))
        .to_request();
    let body: TemplateResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.id, template.id);
    assert_eq!(body.url, "http://127.0.0.1:8080/storage/templates/invoice.docx");
}

#[actix_web::test]
async fn test_upload_stores_file_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), None);
    let templates_dir = state.config.templates_dir();
    let app = init_app!(state);

    let boundary = "----report-converter-test";
    let req = test::TestRequest::post()
        .uri("/api/v1/templates/store")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(multipart_body(
            boundary,
            &[("name", "Monthly invoice"), ("template_type", "docx")],
            Some(("invoice.docx", &b"docx-bytes"[..])),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: TemplateResponse = test::read_body_json(resp).await;
    assert_eq!(created.name, "Monthly invoice");
    assert_eq!(created.template_type, TemplateKind::Docx);

    let stored = std::path::PathBuf::from(&created.path_original);
    assert_eq!(stored.parent().unwrap(), templates_dir.as_path());
    assert!(stored.to_string_lossy().ends_with("_invoice.docx"));
    assert_eq!(std::fs::read(&stored).unwrap(), b"docx-bytes");

    let req = test::TestRequest::get().uri("/api/v1/templates").to_request();
    let all: Vec<TemplateResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.len(), 1);
}

#[actix_web::test]
async fn test_upload_rejects_missing_file_and_unknown_type() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(test_state(dir.path(), None));
    let boundary = "----report-converter-test";

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/store")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(multipart_body(
            boundary,
            &[("name", "Invoice"), ("template_type", "docx")],
            None,
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/store")
        .insert_header((
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        ))
        .set_payload(multipart_body(
            boundary,
            &[("name", "Invoice"), ("template_type", "pdf")],
            Some(("invoice.docx", &b"x"[..])),
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_delete_removes_record_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), None);
    let template = seed_template(&state, "invoice.docx", TemplateKind::Docx, b"x").await;
    let app = init_app!(state);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/templates/{}", template.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!std::path::Path::new(&template.path).exists());

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/templates/{}", template.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/v1/templates/{}", template.id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_generate_pdf_unknown_template_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(test_state(dir.path(), None));

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/generate-pdf")
        .set_json(json!({ "template_id": Uuid::new_v4().to_string(), "data": {} }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_generate_pdf_rejects_excel_and_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path(), None);
    let excel = seed_template(&state, "report.xlsx", TemplateKind::Excel, b"x").await;
    let docx = seed_template(&state, "invoice.docx", TemplateKind::Docx, &docx_with_body("{{.total}}")).await;
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/generate-pdf")
        .set_json(json!({ "template_id": excel.id.to_string(), "data": { "total": 1 } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "InvalidInput");

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/generate-pdf")
        .set_json(json!({ "template_id": docx.id.to_string(), "data": { "paid": true } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert!(body.message.contains("paid"));
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let app = init_app!(test_state(dir.path(), None));

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/generate-pdf")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "BadRequest");
}

#[cfg(unix)]
#[actix_web::test]
async fn test_generate_pdf_returns_attachment() {
    use common::{entries_in, read_document_xml, stub_converter, COPYING_STUB};

    let dir = tempfile::tempdir().unwrap();
    let bin = stub_converter(dir.path(), "soffice", COPYING_STUB);
    let state = test_state(dir.path(), Some(bin));
    let generated_dir = state.config.generated_dir();
    let template = seed_template(&state, "invoice.docx", TemplateKind::Docx, &docx_with_body("Total: {{.total}}")).await;
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/generate-pdf")
        .set_json(json!({ "template_id": template.id.to_string(), "data": { "total": 42 } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("attachment"));
    assert!(disposition.contains("invoice.pdf"));

    let bytes = test::read_body(resp).await;
    assert!(read_document_xml(&bytes).contains("Total: 42"));
    assert!(entries_in(&generated_dir).is_empty());
}

#[cfg(unix)]
#[actix_web::test]
async fn test_generate_pdf_failure_carries_converter_output() {
    use common::stub_converter;

    let dir = tempfile::tempdir().unwrap();
    let bin = stub_converter(dir.path(), "soffice", "echo 'general I/O error'\nexit 81");
    let state = test_state(dir.path(), Some(bin));
    let template = seed_template(&state, "invoice.docx", TemplateKind::Docx, &docx_with_body("{{.total}}")).await;
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/templates/generate-pdf")
        .set_json(json!({ "template_id": template.id.to_string(), "data": { "total": 42 } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "ConversionFailed");
    assert!(body.detail.unwrap().contains("general I/O error"));
}
