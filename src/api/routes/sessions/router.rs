//! Router for the sessions API

use std::sync::{Arc, RwLock};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use super::public;
use crate::agent::SessionRegistry;
use crate::api::state::AppState;
use crate::time::parse_timezone;

type SharedState = Arc<RwLock<AppState>>;

fn registry(state: &SharedState) -> Arc<SessionRegistry> {
    Arc::clone(&state.read().expect("Unable to read share state").registry)
}

/// Start a new scheduling conversation
async fn create_session(
    State(state): State<SharedState>,
    Json(body): Json<public::CreateSessionRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let default_tz = state
        .read()
        .expect("Unable to read share state")
        .config
        .timezone;
    let timezone = match body.timezone {
        Some(name) => match parse_timezone(&name) {
            Some(tz) => tz,
            None => {
                return Ok(
                    (StatusCode::BAD_REQUEST, format!("Unknown timezone {}", name)).into_response(),
                );
            }
        },
        None => default_tz,
    };

    let session = registry(&state).create(&body.user_id, timezone).await;

    Ok((
        StatusCode::CREATED,
        Json(public::SessionResponse::from(session)),
    )
        .into_response())
}

/// Get the current state of a session
async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    match registry(&state).get(&id).await {
        Some(session) => Ok(Json(public::SessionResponse::from(session)).into_response()),
        None => Ok((StatusCode::NOT_FOUND, format!("Session {} not found", id)).into_response()),
    }
}

/// Send one user message and get the assistant's reply
async fn post_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(body): Json<public::MessageRequest>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    let registry = registry(&state);

    if !body.is_final {
        if registry.get(&id).await.is_none() {
            return Ok((StatusCode::NOT_FOUND, format!("Session {} not found", id)).into_response());
        }
        return Ok((
            StatusCode::ACCEPTED,
            Json(public::AcceptedResponse { accepted: true }),
        )
            .into_response());
    }

    match registry.process(&id, &body.text).await {
        Some(outcome) => Ok(Json(outcome).into_response()),
        None => Ok((StatusCode::NOT_FOUND, format!("Session {} not found", id)).into_response()),
    }
}

/// End a session and drop its state
async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, crate::api::public::ApiError> {
    if registry(&state).remove(&id).await {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok((StatusCode::NOT_FOUND, format!("Session {} not found", id)).into_response())
    }
}

/// Create the sessions router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", get(get_session).delete(delete_session))
        .route("/{id}/messages", post(post_message))
}
