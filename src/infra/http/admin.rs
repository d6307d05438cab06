use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::repos::{BlogRepo, RepoError};
use crate::cache::CacheInvalidator;

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AdminState {
    pub blogs: Arc<dyn BlogRepo>,
    pub invalidator: Arc<CacheInvalidator>,
}

#[derive(Debug, Serialize)]
struct InvalidationResponse {
    entry_id: Uuid,
    removed: usize,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/_cache/blog/{id}", post(invalidate_entry))
        .route("/_cache/clear", post(clear_cache))
        .route("/_health/db", get(db_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn invalidate_entry(State(state): State<AdminState>, Path(id): Path<String>) -> Response {
    let Ok(entry_id) = Uuid::parse_str(id.trim()) else {
        return HttpError::new(
            "infra::http::admin::invalidate_entry",
            StatusCode::BAD_REQUEST,
            "Invalid entry id",
            format!("`{id}` is not a uuid"),
        )
        .into_response();
    };

    let removed = state.invalidator.entry_changed(entry_id);
    Json(InvalidationResponse { entry_id, removed }).into_response()
}

async fn clear_cache(State(state): State<AdminState>) -> Response {
    state.invalidator.clear_all();
    StatusCode::NO_CONTENT.into_response()
}

async fn db_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.blogs.health_check().await)
}

fn db_health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::admin::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
