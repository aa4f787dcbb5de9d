//! State machine for translating responses-API stream events into chat-completions chunks.
//!
//! The [`StreamAccumulator`] sees one decoded event at a time, in arrival order. It
//! remembers the response metadata from `response.created` and the kind of every
//! output item announced so far, so that a generic `content_part.delta` can be routed
//! to `content` (message items) or `reasoning` (reasoning items).

use std::collections::HashMap;

use super::types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkUsage, OutputItemKind, ResponseMetadata,
    ResponsesStreamEvent,
};

/// One output item being streamed, keyed by its `output_index`.
#[derive(Debug, Clone)]
struct OutputItemState {
    kind: OutputItemKind,
    /// item_index -> text accumulated so far
    content_parts: HashMap<u32, String>,
}

/// Per-stream translation state.
///
/// Usage:
///   let mut acc = StreamAccumulator::new();
///   for event in responses_events {
///       for chunk in acc.route(&event) {
///           // send chunk as `data: {json}\n\n`
///       }
///   }
#[derive(Debug)]
pub struct StreamAccumulator {
    response_id: String,
    response_created_at: u64,
    response_model: String,
    current_role: String,
    output_items: HashMap<u32, OutputItemState>,
    finished: bool,
}

impl Default for StreamAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self {
            response_id: String::new(),
            response_created_at: 0,
            response_model: String::new(),
            current_role: "assistant".to_string(),
            output_items: HashMap::new(),
            finished: false,
        }
    }

    /// Dispatch one event, returning the chunks to send downstream (usually zero or one).
    pub fn route(&mut self, event: &ResponsesStreamEvent) -> Vec<ChatCompletionChunk> {
        match event {
            ResponsesStreamEvent::Created { response } => {
                self.set_response_metadata(response);
                vec![self.make_chunk(ChunkDelta {
                    role: Some(self.current_role.clone()),
                    ..ChunkDelta::default()
                })]
            }

            ResponsesStreamEvent::OutputItemAdded { output_index, item } => {
                self.add_output_item(*output_index, item.kind, item.role.as_deref());
                Vec::new()
            }

            ResponsesStreamEvent::ContentPartAdded {
                output_index,
                item_index,
                part,
            } => {
                self.add_content_part(*output_index, *item_index, &part.text);
                Vec::new()
            }

            ResponsesStreamEvent::ContentPartDelta {
                output_index,
                item_index,
                delta,
            } => {
                let Some(kind) = self.append_content_delta(*output_index, *item_index, &delta.text)
                else {
                    return Vec::new();
                };
                match kind {
                    OutputItemKind::Message => vec![self.content_chunk(&delta.text)],
                    OutputItemKind::Reasoning => vec![self.reasoning_chunk(&delta.text)],
                    OutputItemKind::FunctionCall | OutputItemKind::Other => Vec::new(),
                }
            }

            ResponsesStreamEvent::ReasoningTextDelta { delta } => {
                vec![self.reasoning_chunk(delta)]
            }

            ResponsesStreamEvent::OutputTextDelta { delta } => vec![self.content_chunk(delta)],

            ResponsesStreamEvent::Completed { response } => self.make_finish_chunks(response),

            ResponsesStreamEvent::InProgress {}
            | ResponsesStreamEvent::OutputItemDone {}
            | ResponsesStreamEvent::Unknown => Vec::new(),
        }
    }

    /// Whether a `response.completed` / `response.done` event has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text accumulated for one content part, if its output item was registered.
    pub fn content_part(&self, output_index: u32, item_index: u32) -> Option<&str> {
        self.output_items
            .get(&output_index)?
            .content_parts
            .get(&item_index)
            .map(String::as_str)
    }

    fn set_response_metadata(&mut self, response: &ResponseMetadata) {
        self.response_id = response.id.clone();
        self.response_created_at = response.created_at;
        self.response_model = response.model.clone();
    }

    fn add_output_item(&mut self, output_index: u32, kind: OutputItemKind, role: Option<&str>) {
        if let Some(role) = role {
            self.current_role = role.to_string();
        }
        self.output_items.insert(
            output_index,
            OutputItemState {
                kind,
                content_parts: HashMap::new(),
            },
        );
    }

    fn add_content_part(&mut self, output_index: u32, item_index: u32, text: &str) {
        if let Some(item) = self.output_items.get_mut(&output_index) {
            item.content_parts.insert(item_index, text.to_string());
        }
    }

    /// Returns the owning item's kind, or `None` when the output index was never added.
    fn append_content_delta(
        &mut self,
        output_index: u32,
        item_index: u32,
        text: &str,
    ) -> Option<OutputItemKind> {
        let item = self.output_items.get_mut(&output_index)?;
        item.content_parts
            .entry(item_index)
            .or_default()
            .push_str(text);
        Some(item.kind)
    }

    fn content_chunk(&self, text: &str) -> ChatCompletionChunk {
        self.make_chunk(ChunkDelta {
            content: Some(text.to_string()),
            ..ChunkDelta::default()
        })
    }

    fn reasoning_chunk(&self, text: &str) -> ChatCompletionChunk {
        self.make_chunk(ChunkDelta {
            reasoning: Some(text.to_string()),
            ..ChunkDelta::default()
        })
    }

    fn make_chunk(&self, delta: ChunkDelta) -> ChatCompletionChunk {
        self.make_chunk_with_finish(delta, None)
    }

    fn make_chunk_with_finish(
        &self,
        delta: ChunkDelta,
        finish_reason: Option<&str>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.response_id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.response_created_at,
            model: self.response_model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage: None,
        }
    }

    fn make_finish_chunks(&mut self, response: &ResponseMetadata) -> Vec<ChatCompletionChunk> {
        self.finished = true;

        let mut chunks = vec![self.make_chunk_with_finish(ChunkDelta::default(), Some("stop"))];

        // Usage chunk carries the terminal event's own metadata, not the stored one
        if let Some(ref usage) = response.usage {
            chunks.push(ChatCompletionChunk {
                id: response.id.clone(),
                object: "chat.completion.chunk".to_string(),
                created: response.created_at,
                model: response.model.clone(),
                choices: Vec::new(),
                usage: Some(ChunkUsage {
                    prompt_tokens: usage.input_tokens.unwrap_or(0),
                    completion_tokens: usage.output_tokens.unwrap_or(0),
                    total_tokens: usage.total_tokens.unwrap_or(0),
                }),
            });
        }

        chunks
    }
}
