//! Router for an app's sessions. The same routes serve every app, each
//! nested under its own prefix with its own registry as state.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use uuid::Uuid;

use super::public;
use crate::ai::responder::{Request, Responder};
use crate::api::public::ApiError;
use crate::api::state::AppRegistry;
use crate::core::{Configuration, Session, SessionError, Validation};

fn not_found(id: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Session {} not found", id)).into_response()
}

fn session_response<R: Responder>(
    app: &str,
    id: &str,
    session: &Session<R>,
) -> public::SessionResponse {
    let validation = session.validation();
    let missing = match &validation {
        Validation::Complete => vec![],
        Validation::Incomplete { missing } => missing.iter().cloned().collect(),
    };
    public::SessionResponse {
        id: id.to_string(),
        app: app.to_string(),
        state: session.state(),
        configured: session
            .config()
            .field_names()
            .into_iter()
            .map(String::from)
            .collect(),
        missing,
        message: validation.message(),
        transcript: session.transcript().to_vec(),
    }
}

/// Start a new session with a generated ID
async fn create<R: Responder + 'static>(
    State(registry): State<Arc<AppRegistry<R>>>,
    body: Option<Json<Configuration>>,
) -> (StatusCode, Json<public::SessionResponse>) {
    let id = Uuid::new_v4().to_string();
    let session = registry.get_or_create(&id);
    let mut session = session.lock().await;
    if let Some(Json(fields)) = body {
        session.configure(fields);
    }
    (
        StatusCode::CREATED,
        Json(session_response(registry.name(), &id, &session)),
    )
}

/// Replace the configuration of a session, starting it if needed
async fn configure<R: Responder + 'static>(
    State(registry): State<Arc<AppRegistry<R>>>,
    Path(id): Path<String>,
    Json(fields): Json<Configuration>,
) -> Json<public::SessionResponse> {
    let session = registry.get_or_create(&id);
    let mut session = session.lock().await;
    session.configure(fields);
    Json(session_response(registry.name(), &id, &session))
}

/// Get a session's state and transcript
async fn show<R: Responder + 'static>(
    State(registry): State<Arc<AppRegistry<R>>>,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = registry.find(&id) else {
        return not_found(&id);
    };
    let session = session.lock().await;
    Json(session_response(registry.name(), &id, &session)).into_response()
}

/// Submit a message and wait for the answer. Failed answers are still
/// a successful response with the entry flagged as an error.
async fn send_message<R: Responder + 'static>(
    State(registry): State<Arc<AppRegistry<R>>>,
    Path(id): Path<String>,
    Json(payload): Json<public::MessageRequest>,
) -> Result<Response, ApiError> {
    let Some(session) = registry.find(&id) else {
        return Ok(not_found(&id));
    };
    // One request at a time per session, others wait here
    let mut session = session.lock_owned().await;

    let request = Request {
        text: payload.text,
        language: payload.language,
    };
    // The turn runs on its own task so a client hanging up doesn't
    // abandon it halfway
    let turn = tokio::spawn(async move {
        let entry = session.submit(request).await.cloned()?;
        Ok::<_, SessionError>(public::MessageResponse {
            entry,
            state: session.state(),
            transcript_len: session.transcript().len(),
        })
    });
    let response = turn.await??;

    Ok(Json(response).into_response())
}

/// End a session and forget its history
async fn remove<R: Responder + 'static>(
    State(registry): State<Arc<AppRegistry<R>>>,
    Path(id): Path<String>,
) -> Response {
    match registry.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(&id),
    }
}

/// Clear a session's history back to the greeting
async fn clear<R: Responder + 'static>(
    State(registry): State<Arc<AppRegistry<R>>>,
    Path(id): Path<String>,
) -> Response {
    let Some(session) = registry.find(&id) else {
        return not_found(&id);
    };
    let mut session = session.lock().await;
    session.clear();
    Json(session_response(registry.name(), &id, &session)).into_response()
}

/// Create the session router for one app
pub fn router<R: Responder + 'static, S>(registry: Arc<AppRegistry<R>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/sessions", post(create::<R>))
        .route("/sessions/{id}", get(show::<R>).delete(remove::<R>))
        .route("/sessions/{id}/config", put(configure::<R>))
        .route(
            "/sessions/{id}/messages",
            post(send_message::<R>).delete(clear::<R>),
        )
        .with_state(registry)
}
