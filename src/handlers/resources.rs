// src/handlers/resources.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::resource::{
        MAX_FILE_BYTES, Resource, ResourceKind, ResourceSummary, UploadResourceRequest,
        content_type_for,
    },
    store::{DocStore, RESOURCES, StoredDoc},
    utils::{html::clean_text, jwt::Claims},
};

/// Query parameters for listing resources. Filtering happens in memory
/// after a full collection fetch; the store does not support queries.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn matches(params: &ListParams, doc: &StoredDoc<Resource>) -> bool {
    if let Some(q) = &params.q {
        let q = q.to_lowercase();
        if !doc.data.title.to_lowercase().contains(&q)
            && !doc.data.description.to_lowercase().contains(&q)
        {
            return false;
        }
    }
    if let Some(subject) = &params.subject {
        if !doc.data.subject.eq_ignore_ascii_case(subject) {
            return false;
        }
    }
    if let Some(semester) = &params.semester {
        if !doc.data.semester.eq_ignore_ascii_case(semester) {
            return false;
        }
    }
    if let Some(kind) = &params.kind {
        let kind_str = match doc.data.kind {
            ResourceKind::Pdf => "pdf",
            ResourceKind::Video => "video",
            ResourceKind::Notes => "notes",
        };
        if !kind.eq_ignore_ascii_case(kind_str) {
            return false;
        }
    }
    true
}

/// Lists uploaded resources, newest first, optionally filtered by search
/// keyword, subject, semester and type.
#[utoipa::path(
    get,
    path = "/api/resources",
    responses((status = 200, description = "Resource summaries", body = [ResourceSummary]))
)]
pub async fn list_resources(
    State(store): State<DocStore>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut docs = store.list::<Resource>(RESOURCES).await?;
    docs.retain(|doc| matches(&params, doc));
    docs.reverse();

    let summaries: Vec<ResourceSummary> = docs.iter().map(ResourceSummary::from).collect();
    Ok(Json(summaries))
}

/// Retrieves a single resource's metadata by ID.
#[utoipa::path(
    get,
    path = "/api/resources/{id}",
    responses(
        (status = 200, description = "Resource metadata", body = ResourceSummary),
        (status = 404, description = "No such resource"),
    )
)]
pub async fn get_resource(
    State(store): State<DocStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let docs = store.list::<Resource>(RESOURCES).await?;
    let doc = docs
        .iter()
        .find(|doc| doc.id == id)
        .ok_or(AppError::NotFound("Resource not found".to_string()))?;

    Ok(Json(ResourceSummary::from(doc)))
}

/// Serves the embedded file blob as a download.
#[utoipa::path(
    get,
    path = "/api/resources/{id}/download",
    responses(
        (status = 200, description = "File bytes"),
        (status = 404, description = "No such resource"),
    )
)]
pub async fn download_resource(
    State(store): State<DocStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let docs = store.list::<Resource>(RESOURCES).await?;
    let doc = docs
        .into_iter()
        .find(|doc| doc.id == id)
        .ok_or(AppError::NotFound("Resource not found".to_string()))?;

    let bytes = BASE64.decode(doc.data.file_data.as_bytes()).map_err(|e| {
        AppError::InternalServerError(format!("stored file data is not valid base64: {}", e))
    })?;

    let headers = [
        (
            header::CONTENT_TYPE,
            content_type_for(&doc.data.file_name).to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", doc.data.file_name),
        ),
    ];

    Ok((headers, bytes))
}

/// Uploads a new resource.
///
/// The file travels base64-encoded inside the JSON body and is stored as-is
/// in the resource document. Enforces the extension allow-list and the 10 MB
/// decoded-size ceiling; free-text fields are stripped of HTML.
#[utoipa::path(
    post,
    path = "/api/resources/upload",
    request_body = UploadResourceRequest,
    responses(
        (status = 201, description = "Resource stored"),
        (status = 400, description = "Validation failed or payload too large"),
        (status = 401, description = "Not logged in"),
    )
)]
pub async fn upload_resource(
    State(store): State<DocStore>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UploadResourceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let bytes = BASE64
        .decode(payload.file_data.as_bytes())
        .map_err(|_| AppError::BadRequest("fileData is not valid base64".to_string()))?;

    if bytes.len() > MAX_FILE_BYTES {
        return Err(AppError::BadRequest(
            "File size must be less than 10MB".to_string(),
        ));
    }

    let resource = Resource {
        title: clean_text(&payload.title),
        description: clean_text(&payload.description),
        subject: clean_text(&payload.subject),
        semester: clean_text(&payload.semester),
        kind: payload.kind,
        file_name: payload.file_name,
        file_size: bytes.len() as i64,
        file_data: payload.file_data,
        uploader: claims.user_id(),
        uploader_email: claims.email.clone(),
        created_at: Utc::now(),
    };

    let id = store.add(RESOURCES, &resource).await.map_err(|e| {
        tracing::error!("Failed to store resource: {}", e);
        e
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}
