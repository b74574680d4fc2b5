//! Public types for the session API
use serde::{Deserialize, Serialize};

use crate::ai::chat::models::TranscriptEntry;
use crate::ai::responder::Language;
use crate::core::SessionState;

#[derive(Deserialize)]
pub struct MessageRequest {
    pub text: String,
    // Only used by the summarizer
    pub language: Option<Language>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub app: String,
    pub state: SessionState,
    // Names only, values can be secrets
    pub configured: Vec<String>,
    pub missing: Vec<String>,
    pub message: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub entry: TranscriptEntry,
    pub state: SessionState,
    pub transcript_len: usize,
}
