//! Demonstrate using the translation layer without a server.
//!
//! Usage:
//!   `cargo run --example translate_only`

use lmstudio_bridge::translate::request::{chat_to_responses, TransformOptions};
use lmstudio_bridge::translate::response::responses_to_chat;
use lmstudio_bridge::translate::sse::{SseLine, SseLineDecoder};
use lmstudio_bridge::translate::streaming::StreamAccumulator;
use lmstudio_bridge::translate::types::{
    ChatCompletionRequest, ReasoningEffort, ResponsesResponse, ResponsesStreamEvent,
};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    // What an OpenAI-compatible client sends
    let chat_req: ChatCompletionRequest = serde_json::from_value(json!({
        "model": "openai/gpt-oss-20b",
        "messages": [
            { "role": "system", "content": "You are a geography expert. Be concise." },
            { "role": "user", "content": "What is the capital of France?" },
            { "role": "assistant", "content": "Paris." },
            { "role": "user", "content": "And Germany?" }
        ],
        "temperature": 0.3,
        "stream": true
    }))?;

    let options = TransformOptions {
        reasoning_effort: Some(ReasoningEffort::Low),
    };
    let responses_req = chat_to_responses(&chat_req, &options);

    println!("=== Chat request -> responses request ===");
    println!("{}", serde_json::to_string_pretty(&responses_req)?);
    println!();

    // What LM Studio answers (non-streaming)
    let responses_body: ResponsesResponse = serde_json::from_value(json!({
        "id": "resp_demo",
        "object": "response",
        "created_at": 1700000000,
        "status": "completed",
        "model": "openai/gpt-oss-20b",
        "output": [
            {
                "id": "rs_1",
                "type": "reasoning",
                "content": [{ "type": "reasoning_text", "text": "The user wants Germany's capital." }]
            },
            {
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "status": "completed",
                "content": [{ "type": "output_text", "text": "Berlin." }]
            }
        ],
        "usage": { "input_tokens": 42, "output_tokens": 9, "total_tokens": 51 }
    }))?;

    println!("=== Responses body -> chat completion ===");
    println!(
        "{}",
        serde_json::to_string_pretty(&responses_to_chat(&responses_body))?
    );
    println!();

    // Streaming: raw SSE bytes in, chat chunks out
    let sse = concat!(
        "event: response.created\n",
        "data: {\"type\":\"response.created\",\"response\":{\"id\":\"resp_demo\",\"created_at\":1700000000,\"model\":\"openai/gpt-oss-20b\"}}\n\n",
        "data: {\"type\":\"response.reasoning_text.delta\",\"delta\":\"Germany...\"}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Ber\"}\n\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"lin.\"}\n\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_demo\",\"created_at\":1700000000,\"model\":\"openai/gpt-oss-20b\",\"usage\":{\"input_tokens\":42,\"output_tokens\":9,\"total_tokens\":51}}}\n\n",
        "data: [DONE]\n\n",
    );

    println!("=== Responses stream -> chat chunks ===");
    let mut decoder = SseLineDecoder::new();
    let mut accumulator = StreamAccumulator::new();

    // feed in small pieces to show frames being reassembled
    for piece in sse.as_bytes().chunks(37) {
        for line in decoder.feed(piece) {
            match line {
                SseLine::Done => println!("data: [DONE]"),
                SseLine::Data(data) => {
                    let event: ResponsesStreamEvent = serde_json::from_str(&data)?;
                    for chunk in accumulator.route(&event) {
                        println!("data: {}", serde_json::to_string(&chunk)?);
                    }
                }
            }
        }
    }

    Ok(())
}
