//! Summarizes the content behind a URL in one of a handful of
//! languages.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Request, Responder, Response};
use crate::ai::chat::models::TranscriptEntry;
use crate::ai::prompt::{Prompt, templates};
use crate::core::AppConfig;
use crate::core::error::SessionError;
use crate::core::gate::Configuration;
use crate::loaders::{loader_for, parse_url};
use crate::openai::{ChatClient, GenerationParams, Message, Role};

const SUMMARY_TEMPERATURE: f32 = 0.3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Marathi,
    Kannada,
    Tamil,
    Telugu,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Cuts `text` down to at most `max_tokens` tokens of the cl100k
/// encoding.
pub fn truncate_tokens(text: &str, max_tokens: usize) -> Result<String> {
    // Building the encoding is expensive, it's loaded once per process
    let bpe = tiktoken_rs::cl100k_base_singleton();
    let bpe = bpe.lock();
    let tokens = bpe.encode_with_special_tokens(text);
    if tokens.len() <= max_tokens {
        return Ok(text.to_string());
    }
    tracing::debug!(
        "Truncating document from {} to {} tokens",
        tokens.len(),
        max_tokens
    );
    // A cut can land inside a multi-byte character so back off a few
    // tokens until it decodes
    for end in (max_tokens.saturating_sub(4)..=max_tokens).rev() {
        if let Ok(out) = bpe.decode(tokens[..end].to_vec()) {
            return Ok(out);
        }
    }
    Err(anyhow!("Failed to truncate document to {} tokens", max_tokens))
}

/// Keeps the first `max_words` words of `text`, leaving formatting
/// inside that range untouched.
pub fn limit_words(text: &str, max_words: usize) -> String {
    let mut words = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            in_word = false;
        } else if !in_word {
            if words == max_words {
                return text[..i].trim_end().to_string();
            }
            in_word = true;
            words += 1;
        }
    }
    text.to_string()
}

pub struct SummarizerResource {
    pub llm: ChatClient,
    pub http: reqwest::Client,
}

pub struct Summarizer {
    api_hostname: String,
    model: String,
    wikipedia_api_hostname: Option<String>,
    max_words: usize,
    max_tokens: u32,
    max_input_tokens: usize,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_hostname: config.groq_api_hostname.clone(),
            model: config.summary_model.clone(),
            wikipedia_api_hostname: config.wikipedia_api_hostname.clone(),
            max_words: config.summary_max_words,
            max_tokens: config.summary_max_tokens,
            max_input_tokens: config.summary_max_input_tokens,
            timeout: config.request_timeout,
        }
    }

    async fn summarize(
        &self,
        url: &reqwest::Url,
        language: Language,
        resource: &SummarizerResource,
    ) -> Result<String> {
        let loader = loader_for(url, self.wikipedia_api_hostname.as_deref());
        tracing::info!("Summarizing {} with the {} loader", url, loader.name());
        let doc = loader
            .load(&resource.http)
            .await
            .with_context(|| format!("Failed to load {}", url))?;

        let text = truncate_tokens(&doc.content, self.max_input_tokens)?;
        let prompt = templates().render(
            &Prompt::Summary.to_string(),
            &json!({
                "language": language.to_string(),
                "max_words": self.max_words,
                "text": text,
            }),
        )?;

        let resp = resource
            .llm
            .completion(&[Message::new(Role::User, &prompt)], &None)
            .await?;
        let summary = resp["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Empty summary received"))?;

        Ok(limit_words(&summary, self.max_words))
    }
}

#[async_trait]
impl Responder for Summarizer {
    type Resource = SummarizerResource;

    fn name(&self) -> &'static str {
        "summarize"
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["api_key"]
    }

    fn greeting(&self) -> String {
        "Hello! Give me the URL of a web page or Wikipedia article and I will summarize it for you."
            .to_string()
    }

    async fn connect(&self, config: Configuration) -> anyhow::Result<SummarizerResource> {
        let params = GenerationParams {
            temperature: Some(SUMMARY_TEMPERATURE),
            max_tokens: Some(self.max_tokens),
        };
        let llm = ChatClient::new(
            &self.api_hostname,
            config.get("api_key").unwrap_or_default(),
            &self.model,
            params,
            self.timeout,
        )?;
        let http = reqwest::Client::builder().timeout(self.timeout).build()?;
        Ok(SummarizerResource { llm, http })
    }

    async fn respond(
        &self,
        request: &Request,
        resource: &SummarizerResource,
        _history: &[TranscriptEntry],
    ) -> Response {
        if request.text.trim().is_empty() {
            return Err(SessionError::InvalidRequest(
                "Please provide the URL".to_string(),
            ));
        }
        let url = parse_url(&request.text)
            .map_err(|_| SessionError::InvalidRequest("Please enter a valid URL".to_string()))?;
        let language = request.language.unwrap_or_default();

        self.summarize(&url, language, resource).await.map_err(|e| {
            tracing::warn!("Summarizing {} failed: {:#}", url, e);
            SessionError::responder(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn summarizer(server_url: &str) -> Summarizer {
        let mut config = AppConfig::default();
        config.groq_api_hostname = server_url.to_string();
        config.wikipedia_api_hostname = Some(server_url.to_string());
        config.summary_max_words = 400;
        config.summary_max_tokens = 500;
        config.request_timeout = Duration::from_secs(5);
        Summarizer::new(&config)
    }

    async fn resource(summarizer: &Summarizer) -> SummarizerResource {
        let config = Configuration::new().with("api_key", "gsk_test");
        summarizer.connect(config).await.unwrap()
    }

    #[test]
    fn test_limit_words() {
        assert_eq!(limit_words("one two three", 5), "one two three");
        assert_eq!(limit_words("one two three", 3), "one two three");
        assert_eq!(limit_words("## one\ntwo\n\nthree", 3), "## one\ntwo");
        assert_eq!(limit_words("one two", 0), "");
    }

    #[test]
    fn test_truncate_tokens() {
        let text = "word ".repeat(100);
        assert_eq!(truncate_tokens(&text, 1000).unwrap(), text);
        let short = truncate_tokens(&text, 10).unwrap();
        assert!(short.len() < text.len());
        assert!(text.starts_with(&short));
    }

    #[test]
    fn test_truncate_tokens_from_many_threads() {
        let text = "नमस्ते दुनिया ".repeat(50);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let text = text.clone();
                std::thread::spawn(move || truncate_tokens(&text, 20).unwrap())
            })
            .collect();
        let outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(outputs.iter().all(|o| o == &outputs[0]));
        assert!(text.starts_with(&outputs[0]));
    }

    #[test]
    fn test_language_values() {
        assert_eq!(Language::default(), Language::English);
        assert_eq!(Language::Hindi.to_string(), "Hindi");
        let parsed: Language = serde_json::from_str("\"Telugu\"").unwrap();
        assert_eq!(parsed, Language::Telugu);
    }

    #[tokio::test]
    async fn test_rejects_missing_and_invalid_urls() {
        let summarizer = summarizer("http://localhost:1");
        let resource = resource(&summarizer).await;

        let err = summarizer
            .respond(&Request::new("  "), &resource, &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please provide the URL");

        let err = summarizer
            .respond(&Request::new("not a url"), &resource, &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid URL");
        assert!(err.is_responder_failure());
    }

    #[tokio::test]
    async fn test_summarizes_wikipedia_article_in_hindi() {
        let mut server = mockito::Server::new_async().await;
        let wiki_mock = server
            .mock("GET", "/w/api.php")
            .match_query(Matcher::UrlEncoded("titles".into(), "Alan Turing".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"query":{"pages":{"21501970":{"title":"Alan Turing","extract":"Alan Mathison Turing was an English mathematician, computer scientist, logician and cryptanalyst."}}}}"#,
            )
            .create();
        let llm_mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("in Hindi".to_string()),
                Matcher::Regex("cryptanalyst".to_string()),
                Matcher::PartialJson(json!({"max_tokens": 500})),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "## एलन ट्यूरिंग\n- एक अंग्रेज़ गणितज्ञ और कंप्यूटर वैज्ञानिक।"}}]})
                    .to_string(),
            )
            .create();

        let summarizer = summarizer(&server.url());
        let resource = resource(&summarizer).await;
        let request =
            Request::new("https://en.wikipedia.org/wiki/Alan_Turing").with_language(Language::Hindi);

        let summary = summarizer.respond(&request, &resource, &[]).await.unwrap();

        wiki_mock.assert();
        llm_mock.assert();
        assert!(!summary.is_empty());
        assert!(summary.split_whitespace().count() <= 400);
        assert!(summary.contains("एलन ट्यूरिंग"));
    }

    #[tokio::test]
    async fn test_long_summary_is_cut_to_word_bound() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/post")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html><body><p>A post about Rust.</p></body></html>")
            .create();
        let long = "word ".repeat(450);
        let _llm = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": long}}]})
                    .to_string(),
            )
            .create();

        let summarizer = summarizer(&server.url());
        let resource = resource(&summarizer).await;
        let request = Request::new(&format!("{}/post", server.url()));

        let summary = summarizer.respond(&request, &resource, &[]).await.unwrap();
        assert_eq!(summary.split_whitespace().count(), 400);
    }

    #[tokio::test]
    async fn test_loader_failure_is_responder_error() {
        let mut server = mockito::Server::new_async().await;
        let _page = server.mock("GET", "/missing").with_status(404).create();

        let summarizer = summarizer(&server.url());
        let resource = resource(&summarizer).await;
        let request = Request::new(&format!("{}/missing", server.url()));

        let err = summarizer.respond(&request, &resource, &[]).await.unwrap_err();
        assert!(matches!(err, SessionError::ResponderFailed(_)));
        assert!(err.to_string().contains("Failed to load"));
    }
}
