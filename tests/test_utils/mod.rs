//! Test utilities for integration tests
#![allow(dead_code)]
use std::env;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{Router, body::Body};

use parley::api::AppState;
use parley::api::app;
use parley::core::AppConfig;

/// Creates a test application router with every model and content
/// endpoint pointed at `server_url` (usually a `mockito` server).
pub fn test_app(server_url: &str) -> Router {
    let app_config = AppConfig {
        groq_api_hostname: server_url.to_string(),
        huggingface_api_hostname: server_url.to_string(),
        wikipedia_api_hostname: Some(server_url.to_string()),
        sql_model: String::from("llama3-8b-8192"),
        summary_model: String::from("gemma2-9b-it"),
        max_iterations: 15,
        summary_max_words: 400,
        summary_max_tokens: 500,
        summary_max_input_tokens: 6000,
        cache_ttl: Duration::from_secs(60 * 60 * 2),
        request_timeout: Duration::from_secs(5),
    };
    let app_state = AppState::new(app_config);
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}

/// Creates a SQLite database file with a students table in a unique
/// temp location and returns its path.
pub fn school_db_file() -> String {
    let path = env::temp_dir().join(format!("parley-{}.db", uuid::Uuid::new_v4()));
    let conn = rusqlite::Connection::open(&path).expect("Failed to create test db");
    conn.execute_batch(
        r"
        CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT NOT NULL, marks REAL);
        INSERT INTO students (name, marks) VALUES
          ('Asha', 95.5), ('Ravi', 88.0), ('Meera', 91.0), ('Kiran', NULL);
        ",
    )
    .expect("Failed to seed test db");
    path.display().to_string()
}
