//! Translate chat-completions requests into responses-API requests.
//!
//! The message list is flattened into a single `input` string: roles are dropped and
//! non-empty contents are joined by a blank line. Everything the responses API doesn't
//! need reshaped is copied through as-is.

use serde_json::Value;

use super::tools::{ensure_tool_parameters_type, flatten_function_tools};
use super::types::{ChatCompletionRequest, ReasoningConfig, ReasoningEffort, ResponsesRequest};

/// Per-bridge defaults applied to every translated request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// Translate a chat-completions request body into a responses-API request body.
/// Pure function: the input body is not modified.
pub fn chat_to_responses(req: &ChatCompletionRequest, options: &TransformOptions) -> ResponsesRequest {
    let input = req
        .messages
        .iter()
        .map(|msg| msg.content.as_str().unwrap_or(""))
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    // Body-level effort wins over the configured default
    let reasoning = req
        .reasoning_effort
        .as_ref()
        .and_then(Value::as_str)
        .filter(|effort| !effort.is_empty())
        .map(str::to_string)
        .or_else(|| options.reasoning_effort.map(|e| e.as_str().to_string()))
        .map(|effort| ReasoningConfig { effort });

    let tools = req.tools.clone().map(|tools| match tools {
        Value::Array(mut list) => {
            ensure_tool_parameters_type(&mut list);
            Value::Array(flatten_function_tools(list))
        }
        other => other,
    });

    ResponsesRequest {
        model: req.model.clone(),
        input,
        reasoning,
        tools,
        extra: req.extra.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::types::ChatRequestMessage;
    use serde_json::{json, Map};

    fn request(messages: Vec<ChatRequestMessage>) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-oss".to_string(),
            messages,
            reasoning_effort: None,
            user: None,
            tools: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn test_basic_request() {
        let req = request(vec![ChatRequestMessage::text("user", "Hello, world!")]);

        let result = chat_to_responses(&req, &TransformOptions::default());

        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "model": "gpt-oss", "input": "Hello, world!" })
        );
    }

    #[test]
    fn test_messages_joined_with_blank_line() {
        let req = request(vec![
            ChatRequestMessage::text("system", "You are a helpful assistant."),
            ChatRequestMessage::text("user", "What is 2+2?"),
        ]);

        let result = chat_to_responses(&req, &TransformOptions::default());
        assert_eq!(result.input, "You are a helpful assistant.\n\nWhat is 2+2?");
    }

    #[test]
    fn test_empty_and_non_string_content_dropped() {
        let mut parts = ChatRequestMessage::text("user", "");
        parts.content = json!([{ "type": "text", "text": "ignored" }]);

        let req = request(vec![
            ChatRequestMessage::text("user", "Hello"),
            ChatRequestMessage::text("user", ""),
            parts,
            ChatRequestMessage::text("assistant", "World"),
        ]);

        let result = chat_to_responses(&req, &TransformOptions::default());
        assert_eq!(result.input, "Hello\n\nWorld");
    }

    #[test]
    fn test_reasoning_from_options() {
        let req = request(vec![ChatRequestMessage::text("user", "Hello")]);
        let options = TransformOptions {
            reasoning_effort: Some(ReasoningEffort::Medium),
        };

        let result = chat_to_responses(&req, &options);
        assert_eq!(
            result.reasoning,
            Some(ReasoningConfig {
                effort: "medium".to_string()
            })
        );
    }

    #[test]
    fn test_body_reasoning_wins_over_options() {
        let mut req = request(vec![ChatRequestMessage::text("user", "Hello")]);
        req.reasoning_effort = Some(json!("high"));
        let options = TransformOptions {
            reasoning_effort: Some(ReasoningEffort::Low),
        };

        let result = chat_to_responses(&req, &options);
        assert_eq!(result.reasoning.unwrap().effort, "high");
    }

    #[test]
    fn test_no_reasoning_when_unset() {
        let mut req = request(vec![ChatRequestMessage::text("user", "Hello")]);
        req.reasoning_effort = Some(json!(""));

        let result = chat_to_responses(&req, &TransformOptions::default());
        assert!(result.reasoning.is_none());
        assert!(serde_json::to_value(&result).unwrap().get("reasoning").is_none());
    }

    #[test]
    fn test_extra_fields_copied_user_dropped() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "model": "gpt-oss",
            "messages": [{ "role": "user", "content": "Hello" }],
            "temperature": 0.7,
            "max_tokens": 100,
            "stream": true,
            "user": "test-user",
            "reasoning_effort": "low"
        }))
        .unwrap();

        let value = serde_json::to_value(chat_to_responses(&req, &TransformOptions::default())).unwrap();

        assert_eq!(value["temperature"], 0.7);
        assert_eq!(value["max_tokens"], 100);
        assert_eq!(value["stream"], true);
        assert_eq!(value["reasoning"], json!({ "effort": "low" }));
        assert!(value.get("user").is_none());
        assert!(value.get("messages").is_none());
        assert!(value.get("reasoning_effort").is_none());
    }

    #[test]
    fn test_tools_normalized_and_flattened() {
        let mut req = request(vec![ChatRequestMessage::text("user", "Weather?")]);
        req.tools = Some(json!([
            {
                "type": "function",
                "function": {
                    "name": "get_weather",
                    "description": "Current weather",
                    "parameters": { "properties": { "city": { "type": "string" } } }
                }
            },
            { "type": "web_search" }
        ]));

        let result = chat_to_responses(&req, &TransformOptions::default());

        assert_eq!(
            result.tools.unwrap(),
            json!([
                {
                    "type": "function",
                    "name": "get_weather",
                    "description": "Current weather",
                    "parameters": {
                        "type": "object",
                        "properties": { "city": { "type": "string" } }
                    }
                },
                { "type": "web_search" }
            ])
        );
        // the caller's body is left as it was
        assert!(req.tools.unwrap()[0]["function"]["parameters"].get("type").is_none());
    }

    #[test]
    fn test_non_list_tools_pass_through() {
        let mut req = request(vec![ChatRequestMessage::text("user", "hi")]);
        req.tools = Some(json!({ "unexpected": true }));

        let result = chat_to_responses(&req, &TransformOptions::default());
        assert_eq!(result.tools, Some(json!({ "unexpected": true })));
    }

    #[test]
    fn test_loosely_shaped_body_still_translates() {
        let req: ChatCompletionRequest = serde_json::from_value(json!({
            "messages": [
                null,
                { "role": "user", "content": "Hello" },
                "stray",
                { "content": "World", "name": "bob" }
            ],
            "stream": true
        }))
        .unwrap();

        assert_eq!(req.model, "");
        assert_eq!(req.messages.len(), 4);
        assert_eq!(req.messages[3].extra["name"], json!("bob"));

        let result = chat_to_responses(&req, &TransformOptions::default());
        assert_eq!(result.input, "Hello\n\nWorld");
        assert_eq!(result.extra["stream"], json!(true));
    }

    #[test]
    fn test_null_model_and_messages() {
        let req: ChatCompletionRequest =
            serde_json::from_value(json!({ "model": null, "messages": null })).unwrap();

        let result = chat_to_responses(&req, &TransformOptions::default());
        assert_eq!(result.model, "");
        assert_eq!(result.input, "");
    }
}
