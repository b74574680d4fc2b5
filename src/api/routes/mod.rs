//! API routes module

mod health;
pub mod session;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

pub(crate) type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router(state: &AppState) -> Router<SharedState> {
    Router::new()
        .nest("/health", health::router())
        // One set of session routes per app
        .nest("/mysql", session::router(Arc::clone(&state.mysql)))
        .nest("/sqlite", session::router(Arc::clone(&state.sqlite)))
        .nest("/summarize", session::router(Arc::clone(&state.summarize)))
        .nest("/groq", session::router(Arc::clone(&state.groq)))
        .nest("/huggingface", session::router(Arc::clone(&state.huggingface)))
}
