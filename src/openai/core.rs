use std::{collections::HashMap, time::Duration};
use tokio::sync::mpsc;

use anyhow::{Context, Error, Result, bail};
use async_trait::async_trait;
use erased_serde;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "tool")]
    Tool,
}

// Object {
//     "content": Null,
//     "role": String("assistant"),
//     "tool_calls": Array [
//         Object {
//             "function": Object {
//                 "arguments": String("{\"query\":\"SELECT COUNT(*) FROM students\"}"),
//                 "name": String("sql_db_query")
//             },
//             "id": String("call_KCg5V0N5E7hHHrUwdefHBfgL"),
//             "type": String("function")
//         }
//     ]
// }
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FunctionCallFn {
    pub arguments: String,
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FunctionCall {
    pub function: FunctionCallFn,
    pub id: String,
    pub r#type: String,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<FunctionCall>>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
    pub fn new_tool_call_request(tool_calls: Vec<FunctionCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }
    pub fn new_tool_call_response(content: &str, tool_call_id: &str) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
        }
    }
}

#[derive(Serialize)]
pub struct Property {
    pub r#type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct Parameters<Props: Serialize> {
    pub r#type: String,
    pub properties: Props,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Serialize)]
pub struct Function<Props: Serialize> {
    pub name: String,
    pub description: String,
    pub parameters: Parameters<Props>,
    pub strict: bool,
}

#[derive(Serialize)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

// Tools are passed around as trait objects but also need to be
// serialized into the request payload. `serde::Serialize` isn't object
// safe so `erased_serde` stands in for it.
#[async_trait]
pub trait ToolCall: erased_serde::Serialize {
    async fn call(&self, args: &str) -> Result<String, Error>;
    fn function_name(&self) -> String;
}
erased_serde::serialize_trait_object!(ToolCall);

pub type BoxedToolCall = Box<dyn ToolCall + Send + Sync + 'static>;

/// Sampling settings sent with every completion request.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Client for an OpenAI compatible chat completions API such as Groq.
#[derive(Clone, Debug)]
pub struct ChatClient {
    api_hostname: String,
    api_key: String,
    pub model: String,
    pub params: GenerationParams,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(
        api_hostname: &str,
        api_key: &str,
        model: &str,
        params: GenerationParams,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            params,
            http,
        })
    }

    fn payload(&self, messages: &[Message], tools: &Option<Vec<BoxedToolCall>>) -> Value {
        let mut payload = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(temperature) = self.params.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = self.params.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(tools) = tools {
            payload["tools"] = json!(tools);
        }
        payload
    }

    async fn send(&self, payload: &Value) -> Result<reqwest::Response, Error> {
        let url = format!("{}/v1/chat/completions", self.api_hostname);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await
            .context("Completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Completion request returned {}: {}", status, api_error_message(&body));
        }
        Ok(response)
    }

    pub async fn completion(
        &self,
        messages: &[Message],
        tools: &Option<Vec<BoxedToolCall>>,
    ) -> Result<Value, Error> {
        let payload = self.payload(messages, tools);
        let response = self
            .send(&payload)
            .await?
            .json()
            .await
            .context("Invalid completion response")?;

        Ok(response)
    }

    /// Same as `completion` but streams each raw SSE data payload to
    /// `tx` as it arrives. Returns the assembled response in the same
    /// shape as the non-streaming endpoint.
    pub async fn completion_stream(
        &self,
        tx: mpsc::UnboundedSender<String>,
        messages: &[Message],
        tools: &Option<Vec<BoxedToolCall>>,
    ) -> Result<Value, Error> {
        let mut payload = self.payload(messages, tools);
        payload["stream"] = json!(true);

        let response = self.send(&payload).await?;
        let mut stream = response.bytes_stream();

        let mut content_buf = String::from("");
        let mut tool_calls: HashMap<usize, ToolCallFinal> = HashMap::new();
        let mut buffer: Vec<u8> = Vec::new();

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Completion stream interrupted")?;

            // SSE events and multi-byte characters can be split across
            // network frames so only complete events are decoded
            buffer.extend_from_slice(&chunk);

            while let Some(event_end) = find_event_end(&buffer) {
                let event_bytes: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_data = std::str::from_utf8(&event_bytes[..event_end])
                    .context("Completion stream event is not valid UTF-8")?;

                let event_data = event_data.trim();
                let Some(data) = event_data.strip_prefix("data: ") else {
                    continue;
                };
                let data = data.trim();
                if data.is_empty() {
                    continue;
                }

                // The receiver going away shouldn't stop the response
                // from being assembled
                let _ = tx.send(data.to_string());

                if data == "[DONE]" {
                    break 'outer;
                }

                let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
                    tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
                })?;
                // Usage-only chunks have no choices
                let Some(choice) = chunk.choices.first() else {
                    continue;
                };

                match &choice.delta {
                    Delta::Content { content } => {
                        content_buf += content;
                    }
                    Delta::ToolCall {
                        tool_calls: tool_call_deltas,
                    } => {
                        for tool_call_delta in tool_call_deltas.iter() {
                            match tool_call_delta {
                                ToolCallChunk::Init {
                                    id,
                                    index,
                                    function,
                                    r#type,
                                } => {
                                    tool_calls.insert(
                                        *index,
                                        ToolCallFinal {
                                            index: *index,
                                            id: id.clone(),
                                            function: FunctionFinal {
                                                name: function.name.clone(),
                                                arguments: function.arguments.clone(),
                                            },
                                            r#type: r#type.clone(),
                                        },
                                    );
                                }
                                ToolCallChunk::ArgsDelta { index, function } => {
                                    tool_calls.entry(*index).and_modify(|v| {
                                        v.function.arguments += &function.arguments;
                                    });
                                }
                            }
                        }
                    }
                    Delta::Stop {} => {}
                }

                if choice.finish_reason.is_some() {
                    break 'outer;
                }
            }
        }

        if !tool_calls.is_empty() {
            let mut tool_call_message = tool_calls.into_values().collect::<Vec<_>>();
            tool_call_message.sort_by_key(|t| t.index);
            return Ok(json!({
                "choices": [{"message": {"tool_calls": tool_call_message}}]
            }));
        }

        Ok(json!({
            "choices": [
                {"message": {"content": content_buf}}
            ]
        }))
    }
}

/// Pulls `error.message` out of an OpenAI style error body, falling
/// back to the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionInitDelta {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionArgsDelta {
    arguments: String,
}

// The first delta for a tool call carries its id and name, later
// deltas only carry more of the arguments.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ToolCallChunk {
    Init {
        id: String,
        index: usize,
        function: FunctionInitDelta,
        r#type: String,
    },
    ArgsDelta {
        index: usize,
        function: FunctionArgsDelta,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionFinal {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ToolCallFinal {
    id: String,
    index: usize,
    function: FunctionFinal,
    r#type: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delta {
    ToolCall { tool_calls: Vec<ToolCallChunk> },

    Content { content: String },

    Stop {},
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Position of the blank line that ends the first complete SSE event.
fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}
