//! Strategies that turn a user request into a response by calling out
//! to a model (and for the SQL agent, a database). Each strategy also
//! declares what configuration it needs and how to build the expensive
//! client it works against, so the session loop can gate and cache it.

pub mod direct;
pub mod sql_agent;
pub mod summarize;

pub use direct::{GroqPrompt, HuggingFacePrompt, Provider};
pub use sql_agent::SqlAgent;
pub use summarize::{Language, Summarizer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::chat::models::TranscriptEntry;
use crate::core::error::SessionError;
use crate::core::gate::Configuration;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Request {
    pub text: String,
    #[serde(default)]
    pub language: Option<Language>,
}

impl Request {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }
}

/// The full text of an answer, or why there isn't one.
pub type Response = Result<String, SessionError>;

#[async_trait]
pub trait Responder: Send + Sync {
    /// The client built from a complete configuration, e.g. a database
    /// pool or a model client.
    type Resource: Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Fields that must be non-empty before anything is attempted.
    fn required_fields(&self) -> &'static [&'static str];

    /// First entry of every new or cleared transcript.
    fn greeting(&self) -> String;

    /// Builds the resource. Errors here are reported as connection
    /// failures and the result is never cached.
    async fn connect(&self, config: Configuration) -> anyhow::Result<Self::Resource>;

    /// Answers a single request. Every failure of the underlying calls
    /// is returned as an error response, never raised.
    async fn respond(
        &self,
        request: &Request,
        resource: &Self::Resource,
        history: &[TranscriptEntry],
    ) -> Response;
}
