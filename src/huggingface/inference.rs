//! Client for the Hugging Face serverless inference API.
//!
//! Text generation models take a single prompt string and return the
//! generated continuation. Errors (model loading, bad token, rate
//! limits) come back as a JSON object with an `error` field.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Generation settings for a text generation request
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct TextGenerationParams {
    pub temperature: f32,
    pub max_new_tokens: u32,
    /// Only return the generated text, not the prompt
    pub return_full_text: bool,
}

#[derive(Serialize, Debug)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParams,
}

/// A successful response is a list with one generation per input
#[derive(Deserialize, Debug)]
pub struct Generation {
    pub generated_text: String,
}

/// Error body returned for failed requests
#[derive(Deserialize, Debug)]
pub struct InferenceError {
    pub error: String,
    /// Seconds until the model is loaded, if it's still warming up
    pub estimated_time: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum InferenceResponse {
    Generations(Vec<Generation>),
    Error(InferenceError),
}

/// A client bound to one model and one set of generation settings
#[derive(Clone, Debug)]
pub struct InferenceClient {
    api_hostname: String,
    api_key: String,
    pub model: String,
    pub params: TextGenerationParams,
    http: reqwest::Client,
}

impl InferenceClient {
    pub fn new(
        api_hostname: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        max_new_tokens: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            params: TextGenerationParams {
                temperature,
                max_new_tokens,
                return_full_text: false,
            },
            http,
        })
    }

    /// Generate text for `inputs` and return it trimmed
    pub async fn generate(&self, inputs: &str) -> Result<String> {
        let url = format!("{}/models/{}", self.api_hostname, self.model);
        let body = TextGenerationRequest {
            inputs,
            parameters: self.params,
        };
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Inference request failed")?;
        let status = resp.status();
        let text = resp.text().await?;

        match serde_json::from_str::<InferenceResponse>(&text) {
            Ok(InferenceResponse::Generations(generations)) if status.is_success() => generations
                .into_iter()
                .next()
                .map(|g| g.generated_text.trim().to_string())
                .ok_or_else(|| anyhow!("Inference response contained no generations")),
            Ok(InferenceResponse::Error(err)) => match err.estimated_time {
                Some(secs) => Err(anyhow!(
                    "Inference request returned {}: {} (ready in ~{:.0}s)",
                    status,
                    err.error,
                    secs
                )),
                None => Err(anyhow!("Inference request returned {}: {}", status, err.error)),
            },
            _ => Err(anyhow!("Inference request returned {}: {}", status, text)),
        }
    }
}
