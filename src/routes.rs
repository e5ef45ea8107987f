// src/routes.rs

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::Method,
    middleware,
    routing::{delete, get, post},
};
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    handlers::{admin, ai, auth, exams, profile, resources, tests},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "StudyHub API",
        description = "Student portal: study resources, MCQ tests, AI question tooling."
    ),
    paths(
        auth::register,
        auth::login,
        resources::list_resources,
        resources::get_resource,
        resources::download_resource,
        resources::upload_resource,
        tests::list_tests,
        tests::get_test,
        tests::create_test,
        exams::start_exam,
        exams::exam_status,
        exams::select_answer,
        exams::navigate,
        exams::submit_exam,
        exams::review_exam,
        exams::list_my_results,
        ai::generate_questions,
        ai::transcribe_notes,
        ai::analyze_paper,
        profile::get_me,
        admin::list_users,
        admin::delete_resource,
        admin::delete_test,
    )
)]
struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, resources, tests, exams, ai, admin).
/// * Applies global middleware (Trace, CORS) and rate limiting on the AI
///   routes, which proxy a metered upstream.
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:5173".parse().unwrap(),
        "http://127.0.0.1:5173".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .unwrap(),
    );

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let resource_routes = Router::new()
        .route("/", get(resources::list_resources))
        .route("/{id}", get(resources::get_resource))
        .route("/{id}/download", get(resources::download_resource))
        // Protected upload route
        .merge(
            Router::new()
                .route("/upload", post(resources::upload_resource))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let test_routes = Router::new()
        .route("/", get(tests::list_tests))
        .route("/{id}", get(tests::get_test))
        .merge(
            Router::new()
                .route("/create", post(tests::create_test))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let exam_routes = Router::new()
        .route("/start", post(exams::start_exam))
        .route("/{id}", get(exams::exam_status))
        .route("/{id}/answers", post(exams::select_answer))
        .route("/{id}/navigate", post(exams::navigate))
        .route("/{id}/submit", post(exams::submit_exam))
        .route("/{id}/review", get(exams::review_exam))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let result_routes = Router::new()
        .route("/", get(exams::list_my_results))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let ai_routes = Router::new()
        .route("/questions", post(ai::generate_questions))
        .route("/ocr", post(ai::transcribe_notes))
        .route("/paper-analysis", post(ai::analyze_paper))
        .layer(GovernorLayer::new(governor_conf))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let profile_routes = Router::new()
        .route("/me", get(profile::get_me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/resources/{id}", delete(admin::delete_resource))
        .route("/tests/{id}", delete(admin::delete_test))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let docs_routes = Router::new().route("/openapi.json", get(openapi_json));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/resources", resource_routes)
        .nest("/api/tests", test_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/results", result_routes)
        .nest("/api/ai", ai_routes)
        .nest("/api/profile", profile_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/docs", docs_routes)
        // Global Middleware (applied from outside in)
        // Uploads and image payloads travel base64-inflated in JSON bodies,
        // so the limit sits above the 10 MB decoded ceiling.
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
