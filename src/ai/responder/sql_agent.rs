//! Natural language questions over a SQL database. The model works out
//! which tables to look at and what to query using tools and then
//! answers in plain language.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use super::{Request, Responder, Response};
use crate::ai::chat::models::{Speaker, TranscriptEntry};
use crate::ai::prompt::{Prompt, templates};
use crate::ai::tools::{ListTablesTool, QuerySqlTool, TableInfoTool};
use crate::core::AppConfig;
use crate::core::db::{DbBackend, SqlDatabase};
use crate::core::error::SessionError;
use crate::core::gate::Configuration;
use crate::openai::{BoxedToolCall, ChatClient, GenerationParams, Message, Role, chat};

const MYSQL_FIELDS: &[&str] = &["host", "user", "password", "database", "api_key"];
const SQLITE_FIELDS: &[&str] = &["sqlite_path", "api_key"];

// Default number of rows the model is told to limit queries to
const TOP_K: usize = 10;

pub struct SqlAgentResource {
    pub db: SqlDatabase,
    pub llm: ChatClient,
}

pub struct SqlAgent {
    backend: DbBackend,
    api_hostname: String,
    model: String,
    max_iterations: usize,
    timeout: Duration,
    observer: Option<mpsc::UnboundedSender<String>>,
}

impl SqlAgent {
    pub fn new(backend: DbBackend, config: &AppConfig) -> Self {
        Self {
            backend,
            api_hostname: config.groq_api_hostname.clone(),
            model: config.sql_model.clone(),
            max_iterations: config.max_iterations,
            timeout: config.request_timeout,
            observer: None,
        }
    }

    /// Sends each tool invocation and its result to `tx` while the
    /// agent works so the caller can show progress.
    pub fn streaming(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.observer = Some(tx);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    fn history_messages(&self, dialect: &str, history: &[TranscriptEntry]) -> anyhow::Result<Vec<Message>> {
        let system_msg = templates()
            .render(
                &Prompt::SqlAgent.to_string(),
                &json!({"dialect": dialect, "top_k": TOP_K}),
            )
            .context("Failed to render SQL agent prompt")?;

        let mut messages = vec![Message::new(Role::System, system_msg.trim())];
        // Earlier turns give the model context for follow up questions.
        // Failed turns are left out since they only add noise.
        for entry in history.iter().filter(|e| !e.error) {
            let role = match entry.role {
                Speaker::User => Role::User,
                Speaker::Assistant => Role::Assistant,
            };
            messages.push(Message::new(role, &entry.content));
        }
        Ok(messages)
    }
}

#[async_trait]
impl Responder for SqlAgent {
    type Resource = SqlAgentResource;

    fn name(&self) -> &'static str {
        "sql"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self.backend {
            DbBackend::Mysql => MYSQL_FIELDS,
            DbBackend::Sqlite => SQLITE_FIELDS,
        }
    }

    fn greeting(&self) -> String {
        format!(
            "Hello! I can chat with your {} database. What would you like to know?",
            self.backend.dialect()
        )
    }

    async fn connect(&self, config: Configuration) -> anyhow::Result<SqlAgentResource> {
        let db = SqlDatabase::connect(self.backend, &config).await?;
        let api_key = config.get("api_key").unwrap_or_default();
        let llm = ChatClient::new(
            &self.api_hostname,
            api_key,
            &self.model,
            GenerationParams::default(),
            self.timeout,
        )?;
        Ok(SqlAgentResource { db, llm })
    }

    async fn respond(
        &self,
        request: &Request,
        resource: &SqlAgentResource,
        history: &[TranscriptEntry],
    ) -> Response {
        let mut messages = self
            .history_messages(resource.db.dialect(), history)
            .map_err(SessionError::responder)?;
        messages.push(Message::new(Role::User, &request.text));

        let tools: Option<Vec<BoxedToolCall>> = Some(vec![
            Box::new(ListTablesTool::new(&resource.db)),
            Box::new(TableInfoTool::new(&resource.db)),
            Box::new(QuerySqlTool::new(&resource.db)),
        ]);

        let result = chat(
            &resource.llm,
            &tools,
            &messages,
            self.max_iterations,
            self.observer.as_ref(),
        )
        .await;

        match result {
            Ok(generated) => generated
                .last()
                .and_then(|m| m.content.clone())
                .ok_or_else(|| SessionError::ResponderFailed("No answer received".to_string())),
            Err(e) => {
                tracing::warn!("SQL agent failed: {:#}", e);
                Err(SessionError::responder(e))
            }
        }
    }
}
