use actix_multipart::Multipart;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpResponse, Responder};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::pipeline::{PipelineError, TemplateHandle};
use crate::template::models::{GeneratePdfRequest, Template, TemplateResponse};
use crate::template::upload::{parse_template_upload, save_upload};
use crate::{AppState, ErrorResponse};

fn parse_id(raw: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw).map_err(|_| {
        HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
            "Invalid template id '{}'",
            raw
        )))
    })
}

fn pipeline_error_response(e: &PipelineError) -> HttpResponse {
    let mut body = ErrorResponse::new(e.kind().as_str(), &e.to_string());
    if let Some(output) = e.diagnostics() {
        body = body.with_detail(output);
    }
    HttpResponse::build(e.status_code()).json(body)
}

#[utoipa::path(
    context_path = "/api/v1/templates",
    tag = "Template Service",
    post,
    path = "/store",
    request_body(content = inline(crate::template::models::UploadTemplateRequest), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Template stored", body = TemplateResponse),
        (status = 400, description = "Missing or invalid form field", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn create_template(payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    info!("Executing create_template handler");
    let upload = match parse_template_upload(payload).await {
        Ok(upload) => upload,
        Err(e) => {
            warn!("Rejected template upload: {}", e);
            return HttpResponse::from(e);
        }
    };

    let path = match save_upload(&data.config.templates_dir(), &upload).await {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to save template file: {}", e);
            return HttpResponse::from(e);
        }
    };
    debug!("Template file written to {}", path.display());

    let template = Template::new(
        upload.name,
        upload.template_type,
        path.to_string_lossy().into_owned(),
    );
    if let Err(e) = data.insert_template(&template).await {
        error!("Failed to insert template into db: {}", e);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove orphaned upload {}: {}", path.display(), e);
        }
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::internal_error("Failed to save template"));
    }

    info!("Template {} stored at {}", template.id, template.path);
    HttpResponse::Created().json(TemplateResponse::from_template(&template, &data.config.app_url))
}

#[utoipa::path(
    context_path = "/api/v1/templates",
    tag = "Template Service",
    get,
    path = "/",
    responses(
        (status = 200, description = "All stored templates", body = Vec<TemplateResponse>),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn get_all_templates(data: web::Data<AppState>) -> impl Responder {
    info!("Executing get_all_templates handler");
    match data.templates.find_all().await {
        Ok(templates) => {
            debug!("Found {} templates", templates.len());
            let body: Vec<TemplateResponse> = templates
                .iter()
                .map(|t| TemplateResponse::from_template(t, &data.config.app_url))
                .collect();
            HttpResponse::Ok().json(body)
        }
        Err(e) => {
            error!("Failed to list templates: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve templates"))
        }
    }
}

#[utoipa::path(
    context_path = "/api/v1/templates",
    tag = "Template Service",
    get,
    path = "/{id}",
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template found", body = TemplateResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn get_template_by_id(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let id = match parse_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return response,
    };
    info!("Executing get_template_by_id for {}", id);

    match data.get_template(&id).await {
        Ok(Some(template)) => {
            HttpResponse::Ok().json(TemplateResponse::from_template(&template, &data.config.app_url))
        }
        Ok(None) => HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
            "Template with id {} not found",
            id
        ))),
        Err(e) => {
            error!("Failed to fetch template {}: {}", id, e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve template"))
        }
    }
}

#[utoipa::path(
    context_path = "/api/v1/templates",
    tag = "Template Service",
    delete,
    path = "/{id}",
    params(("id" = String, Path, description = "Template id")),
    responses(
        (status = 200, description = "Template deleted", body = TemplateResponse),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Template not found", body = ErrorResponse),
        (status = 500, description = "Internal Server Error", body = ErrorResponse)
    )
)]
pub async fn delete_template(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let id = match parse_id(&path.into_inner()) {
        Ok(id) => id,
        Err(response) => return response,
    };
    info!("Executing delete_template for {}", id);

    let template = match data.get_template(&id).await {
        Ok(Some(template)) => template,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template with id {} not found",
                id
            )))
        }
        Err(e) => {
            error!("Failed to fetch template {}: {}", id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve template"));
        }
    };

    match data.remove_template(&id).await {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template with id {} not found",
                id
            )))
        }
        Err(e) => {
            error!("Failed to delete template {}: {}", id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to delete template"));
        }
    }

    if let Err(e) = tokio::fs::remove_file(&template.path).await {
        warn!("Template {} deleted but file {} was not removed: {}", id, template.path, e);
    }

    info!("Template {} deleted", id);
    HttpResponse::Ok().json(TemplateResponse::from_template(&template, &data.config.app_url))
}

#[utoipa::path(
    context_path = "/api/v1/templates",
    tag = "Template Service",
    post,
    path = "/generate-pdf",
    request_body = GeneratePdfRequest,
    responses(
        (status = 200, description = "Filled template rendered as PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 400, description = "Wrong template kind or unsupported data value", body = ErrorResponse),
        (status = 404, description = "Template or template file not found", body = ErrorResponse),
        (status = 500, description = "Converter missing, failed or timed out", body = ErrorResponse)
    )
)]
pub async fn generate_pdf(
    request: web::Json<GeneratePdfRequest>,
    data: web::Data<AppState>,
) -> impl Responder {
    let request = request.into_inner();
    let id = match parse_id(&request.template_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    info!("Executing generate_pdf for template {}", id);

    let template = match data.get_template(&id).await {
        Ok(Some(template)) => template,
        Ok(None) => {
            return HttpResponse::NotFound().json(ErrorResponse::not_found(&format!(
                "Template with id {} not found",
                id
            )))
        }
        Err(e) => {
            error!("Failed to fetch template {}: {}", id, e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to retrieve template"));
        }
    };

    let handle = TemplateHandle::new(&template.path, template.template_type);
    let artifact = match data.pipeline.generate(&handle, &request.data).await {
        Ok(artifact) => artifact,
        Err(e) => return pipeline_error_response(&e),
    };

    let download_name = artifact.download_name().to_string();
    match artifact.into_bytes().await {
        Ok(bytes) => {
            info!("Returning {} ({} bytes) for template {}", download_name, bytes.len(), id);
            HttpResponse::Ok()
                .content_type("application/pdf")
                .insert_header(ContentDisposition {
                    disposition: DispositionType::Attachment,
                    parameters: vec![DispositionParam::Filename(download_name)],
                })
                .body(bytes)
        }
        Err(e) => {
            error!("Failed to read generated document: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Failed to read generated document"))
        }
    }
}

/// Routes mounted under `/api/v1/templates`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/store").route(web::post().to(create_template)))
        .service(web::resource("/generate-pdf").route(web::post().to(generate_pdf)))
        .service(
            web::resource(["", "/"]).route(web::get().to(get_all_templates)),
        )
        .service(
            web::resource("/{id}")
                .route(web::get().to(get_template_by_id))
                .route(web::delete().to(delete_template)),
        );
}
