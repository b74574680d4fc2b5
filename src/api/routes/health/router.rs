//! Router for the health check

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};

use crate::api::routes::SharedState;

async fn health(State(state): State<SharedState>) -> Json<Value> {
    let state = state.read().expect("Unable to read shared state");
    Json(json!({
        "status": "ok",
        "sessions": {
            "mysql": state.mysql.len(),
            "sqlite": state.sqlite.len(),
            "summarize": state.summarize.len(),
            "groq": state.groq.len(),
            "huggingface": state.huggingface.len(),
        }
    }))
}

/// Create the health router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health))
}
