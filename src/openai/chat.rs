use anyhow::{Error, Result, anyhow, bail};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::openai::{
    BoxedToolCall, ChatClient, FunctionCall, FunctionCallFn, Message, Role,
};

/// Raised when the model keeps asking for tools past the allowed
/// number of invocations.
#[derive(Debug, thiserror::Error)]
#[error("Agent stopped due to iteration limit ({0} tool calls)")]
pub struct IterationLimitReached(pub usize);

// Bad tool calls (unknown tool, arguments the tool can't parse, a
// failing query) are reported back to the model as the tool result so
// it can correct itself instead of failing the whole turn.
async fn handle_tool_call(
    tools: &[BoxedToolCall],
    tool_call: &Value,
    observer: Option<&mpsc::UnboundedSender<String>>,
) -> Result<Vec<Message>, Error> {
    let tool_call_id = tool_call["id"]
        .as_str()
        .ok_or(anyhow!("Tool call missing ID: {}", tool_call))?;
    let tool_call_function = &tool_call["function"];
    let tool_call_args = tool_call_function["arguments"].as_str().unwrap_or("{}");
    let tool_call_name = tool_call_function["name"]
        .as_str()
        .ok_or(anyhow!("Tool call missing name: {}", tool_call))?;

    tracing::debug!(
        "\nTool call: {}\nargs: {}",
        &tool_call_name,
        &tool_call_args
    );
    if let Some(tx) = observer {
        let _ = tx.send(format!("Invoking `{}` with {}", tool_call_name, tool_call_args));
    }

    let tool_call_result = match tools.iter().find(|i| *i.function_name() == *tool_call_name) {
        Some(tool) => match tool.call(tool_call_args).await {
            Ok(out) => out,
            Err(e) => format!("Error: {:#}", e),
        },
        None => format!(
            "Error: {} is not a valid tool, try one of [{}].",
            tool_call_name,
            tools
                .iter()
                .map(|t| t.function_name())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    };

    if let Some(tx) = observer {
        let _ = tx.send(tool_call_result.clone());
    }

    let tool_call_request = vec![FunctionCall {
        function: FunctionCallFn {
            arguments: tool_call_args.to_string(),
            name: tool_call_name.to_string(),
        },
        id: tool_call_id.to_string(),
        r#type: String::from("function"),
    }];
    let results = vec![
        Message::new_tool_call_request(tool_call_request),
        Message::new_tool_call_response(&tool_call_result, tool_call_id),
    ];

    Ok(results)
}

/// Runs the next turn in chat by passing a transcript to the LLM for
/// the next response, executing tool calls until the model answers
/// with content. Tool calls run one at a time in the order requested
/// and at most `max_tool_calls` are executed.
///
/// Returns every message generated during the turn, the last one being
/// the assistant's answer.
pub async fn chat(
    client: &ChatClient,
    tools: &Option<Vec<BoxedToolCall>>,
    history: &[Message],
    max_tool_calls: usize,
    observer: Option<&mpsc::UnboundedSender<String>>,
) -> Result<Vec<Message>, Error> {
    let mut updated_history = history.to_owned();
    let mut messages = Vec::new();
    let mut tool_call_count = 0;

    let mut resp = client.completion(&updated_history, tools).await?;

    // Tool calls need to be handled for the chat to proceed
    while let Some(tool_calls) = resp["choices"][0]["message"]["tool_calls"].as_array() {
        if tool_calls.is_empty() {
            break;
        }
        let Some(tools_ref) = tools.as_ref() else {
            bail!("Received tool call but no tools were specified");
        };

        for call in tool_calls {
            if tool_call_count >= max_tool_calls {
                return Err(IterationLimitReached(max_tool_calls).into());
            }
            tool_call_count += 1;

            for m in handle_tool_call(tools_ref, call, observer).await? {
                messages.push(m.clone());
                updated_history.push(m);
            }
        }

        // Provide the results of the tool calls back to the chat
        resp = client.completion(&updated_history, tools).await?;
    }

    match resp["choices"][0]["message"]["content"].as_str() {
        Some(msg) if !msg.trim().is_empty() => {
            messages.push(Message::new(Role::Assistant, msg.trim()));
        }
        _ => bail!("No message received. Resp:\n\n {}", resp),
    }

    Ok(messages)
}
