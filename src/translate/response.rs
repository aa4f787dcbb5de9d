use serde_json::Value;

use super::types::{
    find_text, ChatChoice, ChatCompletionResponse, ChatMessage, ChatToolCall, ChatToolCallFunction,
    OutputContent, ResponsesOutput, ResponsesResponse,
};

struct MessageItem<'a> {
    role: Option<&'a str>,
    status: Option<&'a str>,
    content: Option<&'a [OutputContent]>,
}

/// Translate a non-streaming responses-API body into a chat completion.
///
/// Every message item becomes its own choice. Reasoning text and tool calls are not
/// tied to a particular message in the responses output, so they are attached to
/// every choice. `usage` is copied as-is (no `input_tokens` -> `prompt_tokens`
/// renaming, unlike the streaming path).
pub fn responses_to_chat(resp: &ResponsesResponse) -> ChatCompletionResponse {
    let mut reasoning_text: Option<&str> = None;
    let mut seen_reasoning = false;
    let mut messages: Vec<MessageItem<'_>> = Vec::new();
    let mut tool_calls: Vec<ChatToolCall> = Vec::new();

    for output in &resp.output {
        match output {
            ResponsesOutput::Reasoning { content, .. } => {
                // Only the first reasoning item counts
                if !seen_reasoning {
                    seen_reasoning = true;
                    reasoning_text = find_text(content.as_deref(), "reasoning_text");
                }
            }
            ResponsesOutput::Message {
                role,
                status,
                content,
                ..
            } => messages.push(MessageItem {
                role: role.as_deref(),
                status: status.as_deref(),
                content: content.as_deref(),
            }),
            ResponsesOutput::FunctionCall {
                id,
                call_id,
                name,
                arguments,
            } => tool_calls.push(ChatToolCall {
                id: call_id.clone().or_else(|| id.clone()).unwrap_or_default(),
                call_type: "function".to_string(),
                function: ChatToolCallFunction {
                    name: name.clone(),
                    arguments: arguments.clone().unwrap_or_else(|| "{}".to_string()),
                },
            }),
            ResponsesOutput::Other => {}
        }
    }

    let reasoning = reasoning_text.map(str::to_string);
    let tool_calls = if tool_calls.is_empty() {
        None
    } else {
        Some(tool_calls)
    };

    let choices = if messages.is_empty() {
        let finish_reason = tool_calls.as_ref().map(|_| "tool_calls".to_string());
        vec![ChatChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: if tool_calls.is_some() {
                    None
                } else {
                    Some(String::new())
                },
                reasoning,
                tool_calls,
            },
            finish_reason,
        }]
    } else {
        messages
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let text = find_text(item.content, "output_text").unwrap_or("");
                let finish_reason = if item.status == Some("completed") {
                    "stop"
                } else {
                    "length"
                };
                ChatChoice {
                    index,
                    message: ChatMessage {
                        role: item.role.unwrap_or("assistant").to_string(),
                        content: if tool_calls.is_some() {
                            None
                        } else {
                            Some(text.to_string())
                        },
                        reasoning: reasoning.clone(),
                        tool_calls: tool_calls.clone(),
                    },
                    finish_reason: Some(finish_reason.to_string()),
                }
            })
            .collect()
    };

    ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: resp.created_at,
        model: resp.model.clone(),
        choices,
        usage: resp
            .usage
            .clone()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())),
    }
}
