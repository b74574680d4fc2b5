//! A plain question and answer chatbot against one of two providers.
//! Every question is answered on its own with a fixed system prompt, no
//! tools and no memory of earlier turns.

use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::{Request, Responder, Response};
use crate::ai::chat::models::TranscriptEntry;
use crate::ai::prompt::{Prompt, templates};
use crate::core::AppConfig;
use crate::core::error::SessionError;
use crate::core::gate::Configuration;
use crate::huggingface::InferenceClient;
use crate::openai::{ChatClient, GenerationParams, Message, Role};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 150;
const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
const MAX_TOKENS_RANGE: (u32, u32) = (50, 800);

const REQUIRED_FIELDS: &[&str] = &["api_key"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    #[value(name = "huggingface")]
    HuggingFace,
}

impl Provider {
    pub fn label(&self) -> &'static str {
        match self {
            Provider::Groq => "Groq",
            Provider::HuggingFace => "HuggingFace",
        }
    }

    /// Models offered for the provider, the first one is the default.
    pub fn models(&self) -> &'static [&'static str] {
        match self {
            Provider::Groq => &["llama3-8b-8192", "mistral-saba-24b", "gemma2-9b-it"],
            Provider::HuggingFace => &[
                "mistralai/Mixtral-8x7B-Instruct-v0.1",
                "meta-llama/Llama-3.2-11B-Vision-Instruct",
                "google/flan-t5-large",
            ],
        }
    }

    pub fn default_model(&self) -> &'static str {
        self.models()[0]
    }
}

/// Model and sampling settings read from a session configuration.
/// Anything left blank falls back to the defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct PromptSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl PromptSettings {
    pub fn from_config(provider: Provider, config: &Configuration) -> Result<Self> {
        let model = config
            .get("model")
            .unwrap_or(provider.default_model())
            .to_string();

        let temperature = match config.get("temperature") {
            Some(t) => t
                .parse::<f32>()
                .map_err(|_| anyhow!("Temperature must be a number, got {}", t))?,
            None => DEFAULT_TEMPERATURE,
        };
        let (lo, hi) = TEMPERATURE_RANGE;
        if !(lo..=hi).contains(&temperature) {
            return Err(anyhow!(
                "Temperature must be between {} and {}, got {}",
                lo,
                hi,
                temperature
            ));
        }

        let max_tokens = match config.get("max_tokens") {
            Some(t) => t
                .parse::<u32>()
                .map_err(|_| anyhow!("Max tokens must be a whole number, got {}", t))?,
            None => DEFAULT_MAX_TOKENS,
        };
        let (lo, hi) = MAX_TOKENS_RANGE;
        if !(lo..=hi).contains(&max_tokens) {
            return Err(anyhow!(
                "Max tokens must be between {} and {}, got {}",
                lo,
                hi,
                max_tokens
            ));
        }

        Ok(Self {
            model,
            temperature,
            max_tokens,
        })
    }
}

fn system_prompt() -> Result<String> {
    Ok(templates().render(&Prompt::DirectAnswer.to_string(), &json!({}))?)
}

fn question(text: &str) -> String {
    format!("Question: {}", text.trim())
}

fn greeting(provider: Provider) -> String {
    format!(
        "Hello! Ask me anything and I'll answer using {}.",
        provider.label()
    )
}

// Pulls the text out of each streamed chunk and forwards it. Ends once
// the stream's sender is dropped.
async fn forward_content(
    mut rx: mpsc::UnboundedReceiver<String>,
    tx: &mpsc::UnboundedSender<String>,
) {
    while let Some(data) = rx.recv().await {
        let Ok(chunk) = serde_json::from_str::<Value>(&data) else {
            continue;
        };
        if let Some(content) = chunk["choices"][0]["delta"]["content"].as_str()
            && !content.is_empty()
            && tx.send(content.to_string()).is_err()
        {
            break;
        }
    }
}

pub struct GroqPrompt {
    api_hostname: String,
    timeout: Duration,
    observer: Option<mpsc::UnboundedSender<String>>,
}

impl GroqPrompt {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_hostname: config.groq_api_hostname.clone(),
            timeout: config.request_timeout,
            observer: None,
        }
    }

    /// Sends the answer to `tx` piece by piece as it's generated.
    pub fn streaming(mut self, tx: mpsc::UnboundedSender<String>) -> Self {
        self.observer = Some(tx);
        self
    }

    async fn answer(&self, text: &str, llm: &ChatClient) -> Result<String> {
        let messages = vec![
            Message::new(Role::System, &system_prompt()?),
            Message::new(Role::User, &question(text)),
        ];
        let resp = match &self.observer {
            Some(observer) => {
                let (tx, rx) = mpsc::unbounded_channel();
                // Every piece is forwarded before the answer is returned
                let (resp, _) = tokio::join!(
                    llm.completion_stream(tx, &messages, &None),
                    forward_content(rx, observer)
                );
                resp?
            }
            None => llm.completion(&messages, &None).await?,
        };
        resp["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("No message received. Resp:\n\n {}", resp))
    }
}

#[async_trait]
impl Responder for GroqPrompt {
    type Resource = ChatClient;

    fn name(&self) -> &'static str {
        "groq"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED_FIELDS
    }

    fn greeting(&self) -> String {
        greeting(Provider::Groq)
    }

    async fn connect(&self, config: Configuration) -> anyhow::Result<ChatClient> {
        let settings = PromptSettings::from_config(Provider::Groq, &config)?;
        ChatClient::new(
            &self.api_hostname,
            config.get("api_key").unwrap_or_default(),
            &settings.model,
            GenerationParams {
                temperature: Some(settings.temperature),
                max_tokens: Some(settings.max_tokens),
            },
            self.timeout,
        )
    }

    async fn respond(
        &self,
        request: &Request,
        resource: &ChatClient,
        _history: &[TranscriptEntry],
    ) -> Response {
        self.answer(&request.text, resource).await.map_err(|e| {
            tracing::warn!("Groq request failed: {:#}", e);
            SessionError::responder(e)
        })
    }
}

pub struct HuggingFacePrompt {
    api_hostname: String,
    timeout: Duration,
}

impl HuggingFacePrompt {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_hostname: config.huggingface_api_hostname.clone(),
            timeout: config.request_timeout,
        }
    }

    async fn answer(&self, text: &str, client: &InferenceClient) -> Result<String> {
        // Text generation takes a single string so the system prompt and
        // question are laid out the way a chat template would
        let inputs = format!("System: {}\nHuman: {}\nAI:", system_prompt()?, question(text));
        let out = client.generate(&inputs).await?;
        if out.is_empty() {
            return Err(anyhow!("No text generated by {}", client.model));
        }
        Ok(out)
    }
}

#[async_trait]
impl Responder for HuggingFacePrompt {
    type Resource = InferenceClient;

    fn name(&self) -> &'static str {
        "huggingface"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        REQUIRED_FIELDS
    }

    fn greeting(&self) -> String {
        greeting(Provider::HuggingFace)
    }

    async fn connect(&self, config: Configuration) -> anyhow::Result<InferenceClient> {
        let settings = PromptSettings::from_config(Provider::HuggingFace, &config)?;
        InferenceClient::new(
            &self.api_hostname,
            config.get("api_key").unwrap_or_default(),
            &settings.model,
            settings.temperature,
            settings.max_tokens,
            self.timeout,
        )
    }

    async fn respond(
        &self,
        request: &Request,
        resource: &InferenceClient,
        _history: &[TranscriptEntry],
    ) -> Response {
        self.answer(&request.text, resource).await.map_err(|e| {
            tracing::warn!("Hugging Face request failed: {:#}", e);
            SessionError::responder(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn app_config(url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.groq_api_hostname = url.to_string();
        config.huggingface_api_hostname = url.to_string();
        config.request_timeout = Duration::from_secs(5);
        config
    }

    #[test]
    fn test_settings_defaults() {
        let config = Configuration::new().with("api_key", "k");
        let settings = PromptSettings::from_config(Provider::Groq, &config).unwrap();
        assert_eq!(
            settings,
            PromptSettings {
                model: "llama3-8b-8192".to_string(),
                temperature: 0.7,
                max_tokens: 150,
            }
        );
    }

    #[test]
    fn test_settings_bounds() {
        let ok = Configuration::new()
            .with("model", "google/flan-t5-large")
            .with("temperature", "2.0")
            .with("max_tokens", "50");
        let settings = PromptSettings::from_config(Provider::HuggingFace, &ok).unwrap();
        assert_eq!(settings.model, "google/flan-t5-large");
        assert_eq!(settings.max_tokens, 50);

        let hot = Configuration::new().with("temperature", "2.5");
        assert!(PromptSettings::from_config(Provider::Groq, &hot).is_err());

        let long = Configuration::new().with("max_tokens", "801");
        assert!(PromptSettings::from_config(Provider::Groq, &long).is_err());

        let garbage = Configuration::new().with("max_tokens", "lots");
        let err = PromptSettings::from_config(Provider::Groq, &garbage).unwrap_err();
        assert_eq!(err.to_string(), "Max tokens must be a whole number, got lots");
    }

    #[tokio::test]
    async fn test_out_of_range_settings_fail_connect() {
        let responder = GroqPrompt::new(&app_config("http://localhost:1"));
        let config = Configuration::new()
            .with("api_key", "gsk_test")
            .with("temperature", "-1");
        assert!(responder.connect(config).await.is_err());
    }

    #[tokio::test]
    async fn test_groq_answer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("Question: What is the capital of France\\?".to_string()),
                Matcher::Regex("You are a helpful assistant".to_string()),
                Matcher::PartialJson(json!({"model": "gemma2-9b-it", "max_tokens": 200})),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#)
            .create();

        let responder = GroqPrompt::new(&app_config(&server.url()));
        let client = responder
            .connect(
                Configuration::new()
                    .with("api_key", "gsk_test")
                    .with("model", "gemma2-9b-it")
                    .with("max_tokens", "200"),
            )
            .await
            .unwrap();

        let answer = responder
            .respond(&Request::new("What is the capital of France?"), &client, &[])
            .await
            .unwrap();
        mock.assert();
        assert_eq!(answer, "Paris.");
    }

    #[tokio::test]
    async fn test_groq_streaming_answer() {
        let mut server = mockito::Server::new_async().await;
        let body = [
            r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"Par"},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"content":"is."},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            "data: [DONE]",
        ]
        .join("\n\n")
            + "\n\n";
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let responder = GroqPrompt::new(&app_config(&server.url())).streaming(tx);
        let client = responder
            .connect(Configuration::new().with("api_key", "gsk_test"))
            .await
            .unwrap();

        let answer = responder
            .respond(&Request::new("What is the capital of France?"), &client, &[])
            .await
            .unwrap();
        assert_eq!(answer, "Paris.");

        // Every piece is already waiting by the time the answer returns
        let mut streamed = String::new();
        while let Ok(piece) = rx.try_recv() {
            streamed.push_str(&piece);
        }
        assert_eq!(streamed, "Paris.");
    }

    #[tokio::test]
    async fn test_groq_failure_is_responder_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid API Key"}}"#)
            .create();

        let responder = GroqPrompt::new(&app_config(&server.url()));
        let client = responder
            .connect(Configuration::new().with("api_key", "bad"))
            .await
            .unwrap();
        let err = responder
            .respond(&Request::new("Hi"), &client, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ResponderFailed(_)));
        assert!(err.to_string().contains("Invalid API Key"));
    }

    #[tokio::test]
    async fn test_huggingface_answer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/mistralai/Mixtral-8x7B-Instruct-v0.1")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("Question: What is Rust\\?".to_string()),
                Matcher::PartialJson(json!({"parameters": {"max_new_tokens": 150}})),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"generated_text":" A systems programming language."}]"#)
            .create();

        let responder = HuggingFacePrompt::new(&app_config(&server.url()));
        let client = responder
            .connect(Configuration::new().with("api_key", "hf_test"))
            .await
            .unwrap();
        let answer = responder
            .respond(&Request::new("What is Rust?"), &client, &[])
            .await
            .unwrap();
        mock.assert();
        assert_eq!(answer, "A systems programming language.");
    }

    #[test]
    fn test_provider_models() {
        assert_eq!(Provider::Groq.default_model(), "llama3-8b-8192");
        assert_eq!(
            Provider::HuggingFace.default_model(),
            "mistralai/Mixtral-8x7B-Instruct-v0.1"
        );
        assert_eq!(
            serde_json::to_string(&Provider::HuggingFace).unwrap(),
            "\"huggingface\""
        );
    }
}
