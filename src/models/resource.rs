// src/models/resource.rs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::store::StoredDoc;

/// Upload ceiling for the embedded file blob, enforced on the decoded bytes.
pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;

/// File extensions the upload flow accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "txt", "md", "mp4", "avi", "mov", "png", "jpg", "jpeg",
];

/// One uploaded study resource. The file bytes travel inside the document
/// itself (base64), Firestore-style; there is no separate blob storage.
/// Immutable after upload; removed only through the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub semester: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub file_name: String,
    /// Decoded size in bytes, computed at upload time.
    pub file_size: i64,
    /// Base64-encoded file contents.
    pub file_data: String,
    pub uploader: i64,
    pub uploader_email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Pdf,
    Video,
    Notes,
}

/// Listing/detail DTO: everything except the embedded blob, which is only
/// served by the download route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub semester: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub file_name: String,
    pub file_size: i64,
    pub uploader_email: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&StoredDoc<Resource>> for ResourceSummary {
    fn from(doc: &StoredDoc<Resource>) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.data.title.clone(),
            description: doc.data.description.clone(),
            subject: doc.data.subject.clone(),
            semester: doc.data.semester.clone(),
            kind: doc.data.kind,
            file_name: doc.data.file_name.clone(),
            file_size: doc.data.file_size,
            uploader_email: doc.data.uploader_email.clone(),
            created_at: doc.data.created_at,
        }
    }
}

/// DTO for the upload flow.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResourceRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub description: String,
    #[validate(length(min = 1, max = 100))]
    pub subject: String,
    #[validate(length(min = 1, max = 20))]
    pub semester: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[validate(custom(function = validate_extension))]
    pub file_name: String,
    /// Base64-encoded file contents. Size is checked against the decoded
    /// length in the handler, after the payload proves to be valid base64.
    #[validate(length(min = 1))]
    pub file_data: String,
}

fn validate_extension(file_name: &str) -> Result<(), validator::ValidationError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(validator::ValidationError::new("unsupported_file_extension")),
    }
}

/// Best-effort content type for the download route, derived from the
/// stored file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    match file_name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()) {
        Some(ext) => match ext.as_str() {
            "pdf" => "application/pdf",
            "doc" => "application/msword",
            "docx" => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            "ppt" => "application/vnd.ms-powerpoint",
            "pptx" => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            "txt" | "md" => "text/plain; charset=utf-8",
            "mp4" => "video/mp4",
            "avi" => "video/x-msvideo",
            "mov" => "video/quicktime",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            _ => "application/octet-stream",
        },
        None => "application/octet-stream",
    }
}
