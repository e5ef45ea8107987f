// src/handlers/admin.rs
//
// The out-of-band surface: portal flows never delete documents, admins do.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::user::User,
    store::{DocStore, RESOURCES, TESTS},
};

/// Lists all users in the system.
/// Admin only.
#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "All accounts"),
        (status = 403, description = "Not an admin"),
    )
)]
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, email, password, role, created_at FROM users ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Deletes an uploaded resource by ID.
/// Admin only.
#[utoipa::path(
    delete,
    path = "/api/admin/resources/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such resource"),
    )
)]
pub async fn delete_resource(
    State(store): State<DocStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete(RESOURCES, &id).await? {
        return Err(AppError::NotFound("Resource not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Deletes a test by ID. Existing results for it keep their numbers and
/// degrade to the "Unknown Test" label in listings.
/// Admin only.
#[utoipa::path(
    delete,
    path = "/api/admin/tests/{id}",
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such test"),
    )
)]
pub async fn delete_test(
    State(store): State<DocStore>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !store.delete(TESTS, &id).await? {
        return Err(AppError::NotFound("Test not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
