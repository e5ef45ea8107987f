// src/handlers/profile.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{resource::Resource, test_result::TestResult, user::{MeResponse, User}},
    store::{DocStore, RESOURCES, TEST_RESULTS},
    utils::jwt::Claims,
};

/// Get the current user's profile and dashboard statistics.
///
/// The counters come from full collection scans filtered in memory, the
/// same access pattern the rest of the portal uses.
#[utoipa::path(
    get,
    path = "/api/profile/me",
    responses(
        (status = 200, description = "Profile with aggregates", body = MeResponse),
        (status = 401, description = "Not logged in"),
    )
)]
pub async fn get_me(
    State(pool): State<SqlitePool>,
    State(store): State<DocStore>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, password, role, created_at FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let uploads_count = store
        .list::<Resource>(RESOURCES)
        .await?
        .iter()
        .filter(|doc| doc.data.uploader == user_id)
        .count();

    let my_results: Vec<f64> = store
        .list::<TestResult>(TEST_RESULTS)
        .await?
        .iter()
        .filter(|doc| doc.data.user_id == user_id)
        .map(|doc| doc.data.score)
        .collect();

    let best_score = my_results.iter().cloned().reduce(f64::max);

    Ok(Json(MeResponse {
        id: user.id,
        email: user.email,
        role: user.role,
        created_at: user.created_at,
        uploads_count,
        attempts_count: my_results.len(),
        best_score,
    }))
}
