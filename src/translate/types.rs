//! Type definitions for both sides of the bridge.
//!
//! The chat-completions side is what callers send and receive; the responses side is
//! what the upstream server (LM Studio) speaks when running in responses mode. Request
//! bodies keep every field they don't model in a flattened `extra` map so unknown
//! parameters survive translation.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// Treat an explicit `null` like a missing field. Pair with `#[serde(default)]`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ReasoningEffort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chat completions: request (what callers send to us)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<ChatRequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    // temperature, max_tokens, stream, ...
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Any JSON value is accepted; non-objects become a message with null role and content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct ChatRequestMessage {
    pub role: Value,
    /// Usually a string; anything else contributes nothing to the flattened input.
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<Value> for ChatRequestMessage {
    fn from(value: Value) -> Self {
        let Value::Object(mut extra) = value else {
            return Self {
                role: Value::Null,
                content: Value::Null,
                extra: Map::new(),
            };
        };
        Self {
            role: extra.remove("role").unwrap_or_default(),
            content: extra.remove("content").unwrap_or_default(),
            extra,
        }
    }
}

impl ChatRequestMessage {
    pub fn text(role: &str, content: &str) -> Self {
        Self {
            role: Value::String(role.to_string()),
            content: Value::String(content.to_string()),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat completions: response (what callers get back)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    /// Copied from the upstream body without renaming.
    pub usage: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    /// `None` exactly when `tool_calls` is present.
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // "function"
    pub function: ChatToolCallFunction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatToolCallFunction {
    pub name: String,
    pub arguments: String,
}

// Streaming chunks

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ChunkUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatErrorResponse {
    pub error: ChatErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
}

impl ChatErrorResponse {
    pub fn new(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            error: ChatErrorDetail {
                message: message.into(),
                error_type: error_type.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Responses API: request (what we send upstream)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: String,
}

// ---------------------------------------------------------------------------
// Responses API: non-streaming response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<ResponsesOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesOutput {
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Vec<OutputContent>>,
    },
    Reasoning {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Vec<OutputContent>>,
    },
    FunctionCall {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        #[serde(default, deserialize_with = "null_as_default")]
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<String>,
    },
    /// Item types this bridge doesn't translate (web search calls, etc.)
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type")]
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_type: String, // "output_text" | "reasoning_text"
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}

/// First content entry of the given type, e.g. `output_text`.
pub fn find_text<'a>(content: Option<&'a [OutputContent]>, content_type: &str) -> Option<&'a str> {
    content?
        .iter()
        .find(|c| c.content_type == content_type)
        .map(|c| c.text.as_str())
}

// ---------------------------------------------------------------------------
// Responses API: streaming events
// ---------------------------------------------------------------------------

/// One decoded `data:` payload of a responses stream.
///
/// Only the events the bridge reacts to are modeled; every other `type` lands in
/// [`ResponsesStreamEvent::Unknown`] and is ignored. Fields of modeled events are all
/// optional, so servers that send a slightly different shape (`content_index` instead
/// of `item_index`, `null` timestamps) still route.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.created")]
    Created {
        #[serde(default, deserialize_with = "null_as_default")]
        response: ResponseMetadata,
    },

    #[serde(rename = "response.in_progress")]
    InProgress {},

    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        #[serde(default, deserialize_with = "null_as_default")]
        output_index: u32,
        #[serde(default, deserialize_with = "null_as_default")]
        item: StreamOutputItem,
    },

    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        #[serde(default, deserialize_with = "null_as_default")]
        output_index: u32,
        #[serde(default, deserialize_with = "null_as_default")]
        item_index: u32,
        #[serde(default, deserialize_with = "null_as_default")]
        part: StreamContentPart,
    },

    #[serde(rename = "response.content_part.delta")]
    ContentPartDelta {
        #[serde(default, deserialize_with = "null_as_default")]
        output_index: u32,
        #[serde(default, deserialize_with = "null_as_default")]
        item_index: u32,
        #[serde(default, deserialize_with = "null_as_default")]
        delta: StreamContentPart,
    },

    #[serde(rename = "response.reasoning_text.delta")]
    ReasoningTextDelta {
        #[serde(default, deserialize_with = "null_as_default")]
        delta: String,
    },

    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        #[serde(default, deserialize_with = "null_as_default")]
        delta: String,
    },

    #[serde(rename = "response.output_item.done")]
    OutputItemDone {},

    #[serde(rename = "response.completed", alias = "response.done")]
    Completed {
        #[serde(default, deserialize_with = "null_as_default")]
        response: ResponseMetadata,
    },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamOutputItem {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: OutputItemKind,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputItemKind {
    Message,
    Reasoning,
    FunctionCall,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamContentPart {
    #[serde(default, deserialize_with = "null_as_default")]
    pub text: String,
}
