//! Outbound request interception.
//!
//! [`ResponsesFetch`] is the single point where requests leave the bridge. In
//! responses mode a chat-completions request is rewritten to the `/responses`
//! endpoint and its answer is translated back, either as one JSON body or as a live
//! SSE stream. Every other request is forwarded with only the tool-schema fix.

use crate::config::{ApiMode, BridgeConfig};
use crate::error::{BridgeError, Result};
use crate::logging::SharedLogger;
use crate::translate::request::{chat_to_responses, TransformOptions};
use crate::translate::response::responses_to_chat;
use crate::translate::sse::{SseLine, SseLineDecoder};
use crate::translate::streaming::StreamAccumulator;
use crate::translate::tools::fix_tools_in_body;
use crate::translate::types::{
    ChatCompletionChunk, ChatCompletionRequest, ResponsesResponse, ResponsesStreamEvent,
};

use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Request headers that must not be copied onto the outbound request.
const SKIPPED_REQUEST_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    // the client isn't built with decompression, keep bodies parseable
    "accept-encoding",
];

/// A request about to leave the bridge.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    pub fn post_json(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            method: Method::POST,
            url: url.into(),
            headers,
            body: Some(body.into()),
        }
    }
}

pub enum ShimBody {
    Full(Bytes),
    Stream(ByteStream),
}

/// Upstream answer, already translated where needed.
pub struct ShimResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ShimBody,
}

impl ShimResponse {
    /// Collect the whole body. Stream errors surface as `Err`.
    pub async fn bytes(self) -> Result<Bytes> {
        match self.body {
            ShimBody::Full(bytes) => Ok(bytes),
            ShimBody::Stream(mut stream) => {
                let mut out = Vec::new();
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
                Ok(Bytes::from(out))
            }
        }
    }
}

#[derive(Clone)]
pub struct ResponsesFetch {
    client: reqwest::Client,
    api: ApiMode,
    options: TransformOptions,
    default_headers: HeaderMap,
    logger: SharedLogger,
}

impl ResponsesFetch {
    pub fn new(client: reqwest::Client, config: &BridgeConfig, logger: SharedLogger) -> Result<Self> {
        let mut default_headers = HeaderMap::new();

        let bearer = format!("Bearer {}", config.resolve_api_key());
        default_headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|e| BridgeError::config(format!("Invalid API key: {e}")))?,
        );

        for (name, value) in &config.provider.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BridgeError::config(format!("Invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                BridgeError::config(format!("Invalid value for header '{}': {e}", name.as_str()))
            })?;
            default_headers.insert(name, value);
        }

        Ok(Self {
            client,
            api: config.provider.api,
            options: TransformOptions {
                reasoning_effort: config.provider.reasoning_effort,
            },
            default_headers,
            logger,
        })
    }

    pub fn api(&self) -> ApiMode {
        self.api
    }

    /// Send one request upstream, translating in both directions when the request is
    /// a chat completion and the bridge runs in responses mode.
    pub async fn fetch(&self, req: OutboundRequest) -> Result<ShimResponse> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut url = req.url;
        let mut body = req.body;
        let mut translated = false;

        if self.api == ApiMode::Responses {
            if let (Some(responses_url), Some(raw)) = (rewrite_to_responses(&url), body.as_ref()) {
                match serde_json::from_slice::<ChatCompletionRequest>(raw) {
                    Ok(chat_req) => {
                        self.logger
                            .payload("fetch", &request_id, "Raw chat request", &chat_req);
                        let responses_req = chat_to_responses(&chat_req, &self.options);
                        self.logger.payload(
                            "fetch",
                            &request_id,
                            "Transformed request",
                            &responses_req,
                        );
                        body = Some(Bytes::from(serde_json::to_vec(&responses_req)?));
                        url = responses_url;
                        translated = true;
                    }
                    Err(e) => {
                        self.logger.warn(
                            "fetch",
                            format!("Not translating unparseable chat request: {e}"),
                        );
                    }
                }
            }
        }

        if !translated {
            if let Some(fixed) = body.as_deref().and_then(fix_tools_in_body) {
                body = Some(Bytes::from(fixed));
            }
        }

        self.logger.info(
            "fetch",
            format!("{} {} translated={} id={}", req.method, url, translated, request_id),
        );

        let mut builder = self.client.request(req.method, &url);
        for (name, value) in &req.headers {
            if !SKIPPED_REQUEST_HEADERS.contains(&name.as_str()) {
                builder = builder.header(name, value);
            }
        }
        builder = builder.headers(self.default_headers.clone());
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BridgeError::upstream(format!("Request to {url} failed: {e}")))?;

        let status = response.status();

        if !translated || !status.is_success() {
            if !status.is_success() {
                self.logger
                    .warn("fetch", format!("Upstream returned status {status} id={request_id}"));
            }
            let headers = copy_response_headers(response.headers(), false);
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(BridgeError::from));
            return Ok(ShimResponse {
                status,
                headers,
                body: ShimBody::Stream(Box::pin(stream)),
            });
        }

        let mut headers = copy_response_headers(response.headers(), true);

        if is_event_stream(response.headers()) {
            self.logger
                .debug("fetch", format!("Handling streaming response id={request_id}"));
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            );
            let stream =
                transform_event_stream(response.bytes_stream(), self.logger.clone(), request_id);
            return Ok(ShimResponse {
                status,
                headers,
                body: ShimBody::Stream(Box::pin(stream)),
            });
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| BridgeError::upstream(format!("Failed to read response body: {e}")))?;

        let parsed: ResponsesResponse = serde_json::from_slice(&raw).map_err(|e| {
            BridgeError::translation(format!(
                "Failed to parse responses body: {}. Body: {}",
                e,
                truncate(&String::from_utf8_lossy(&raw), 300)
            ))
        })?;
        self.logger
            .payload("fetch", &request_id, "Response usage", &parsed.usage);

        let chat = responses_to_chat(&parsed);
        Ok(ShimResponse {
            status,
            headers,
            body: ShimBody::Full(Bytes::from(serde_json::to_vec(&chat)?)),
        })
    }
}

/// Re-encode a responses-API SSE byte stream as chat-completions chunks.
///
/// Pull-based: upstream is only read when the consumer asks for more, and dropping
/// the returned stream drops (and so cancels) the upstream one. An upstream read
/// error or an unparseable `data:` payload ends the stream with an `Err`.
pub fn transform_event_stream<S, E>(
    byte_stream: S,
    logger: SharedLogger,
    request_id: String,
) -> impl Stream<Item = Result<Bytes>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<BridgeError> + Send + 'static,
{
    async_stream::stream! {
        let mut accumulator = StreamAccumulator::new();
        let mut decoder = SseLineDecoder::new();

        futures::pin_mut!(byte_stream);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    let err: BridgeError = e.into();
                    logger.error("stream", format!("Byte stream error id={request_id}: {err}"));
                    yield Err(BridgeError::stream(format!("Upstream read failed: {err}")));
                    return;
                }
            };

            for line in decoder.feed(&chunk) {
                let data = match line {
                    SseLine::Done => {
                        yield Ok(Bytes::from_static(DONE_FRAME));
                        continue;
                    }
                    SseLine::Data(data) => data,
                };

                let value: Value = match serde_json::from_str(&data) {
                    Ok(v) => v,
                    Err(e) => {
                        logger.error(
                            "stream",
                            format!("Error parsing SSE event id={request_id}: {e} line={}", truncate(&data, 200)),
                        );
                        yield Err(BridgeError::stream(format!("Failed to parse SSE event: {e}")));
                        return;
                    }
                };

                // well-formed JSON in an unexpected shape is skipped, not fatal
                let event = match ResponsesStreamEvent::deserialize(value) {
                    Ok(ev) => ev,
                    Err(e) => {
                        logger.debug(
                            "stream",
                            format!("Ignoring SSE event id={request_id}: {e} line={}", truncate(&data, 200)),
                        );
                        continue;
                    }
                };

                for chat_chunk in accumulator.route(&event) {
                    match encode_chunk(&chat_chunk) {
                        Ok(frame) => yield Ok(frame),
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }
        }

        if decoder.pending() > 0 {
            logger.debug("stream", format!("Discarding {} bytes of unterminated line id={request_id}", decoder.pending()));
        }
        logger.info(
            "stream",
            format!("Stream completed id={} finished={}", request_id, accumulator.is_finished()),
        );
    }
}

/// Frame one chunk as an SSE `data:` event.
pub fn encode_chunk(chunk: &ChatCompletionChunk) -> Result<Bytes> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("data: {json}\n\n")))
}

/// `…/chat/completions` -> `…/responses`, keeping the query string.
/// `None` when the URL doesn't address the chat-completions endpoint.
pub fn rewrite_to_responses(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    let prefix = parsed.path().strip_suffix("/chat/completions")?.to_string();
    parsed.set_path(&format!("{prefix}/responses"));
    Some(parsed.to_string())
}

pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("text/event-stream"))
}

fn copy_response_headers(source: &HeaderMap, body_changed: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in source {
        if name == header::TRANSFER_ENCODING || name == header::CONNECTION {
            continue;
        }
        if body_changed && name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn frames(parts: &[&str]) -> Vec<std::result::Result<Bytes, BridgeError>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect()
    }

    async fn collect(
        parts: Vec<std::result::Result<Bytes, BridgeError>>,
    ) -> Vec<Result<Bytes>> {
        transform_event_stream(
            stream::iter(parts),
            SharedLogger::in_memory(false),
            "test".to_string(),
        )
        .collect()
        .await
    }

    #[test]
    fn test_rewrite_to_responses() {
        assert_eq!(
            rewrite_to_responses("http://localhost:1234/v1/chat/completions").as_deref(),
            Some("http://localhost:1234/v1/responses")
        );
        assert_eq!(
            rewrite_to_responses("http://host/v1/chat/completions?debug=1").as_deref(),
            Some("http://host/v1/responses?debug=1")
        );
        assert!(rewrite_to_responses("http://localhost:1234/v1/embeddings").is_none());
        assert!(rewrite_to_responses("not a url").is_none());
    }

    #[test]
    fn test_is_event_stream() {
        let mut headers = HeaderMap::new();
        assert!(!is_event_stream(&headers));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream; charset=utf-8"),
        );
        assert!(is_event_stream(&headers));
    }

    #[test]
    fn test_copy_response_headers_drops_length_when_body_changes() {
        let mut source = HeaderMap::new();
        source.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        source.insert("x-request-id", HeaderValue::from_static("abc"));

        let kept = copy_response_headers(&source, false);
        assert!(kept.contains_key(header::CONTENT_LENGTH));

        let changed = copy_response_headers(&source, true);
        assert!(!changed.contains_key(header::CONTENT_LENGTH));
        assert_eq!(changed.get("x-request-id").unwrap(), "abc");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn test_stream_split_frames() {
        let out = collect(frames(&[
            "event: response.created\ndata: {\"type\":\"response.created\",\"response\":{\"id\":\"r1\",\"created_at\":7,\"model\":\"m\"}}\n\n",
            "data: {\"type\":\"response.output_item.added\",\"output_index\":0,\"item\":{\"type\":\"message\",\"role\":\"assistant\"}}\n\ndata: {\"type\":\"response.content_part.delta\",\"output_index\":0,",
            "\"item_index\":0,\"delta\":{\"text\":\"Hi\"}}\n\n",
            "data: [DONE]\n\n",
        ]))
        .await;

        let text: Vec<String> = out
            .into_iter()
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect();

        assert_eq!(text.len(), 3);
        assert!(text[0].starts_with("data: {"));
        assert!(text[0].contains("\"role\":\"assistant\""));
        assert!(text[1].contains("\"content\":\"Hi\""));
        assert_eq!(text[2], "data: [DONE]\n\n");
        assert!(text.iter().all(|frame| frame.ends_with("\n\n")));
    }

    #[tokio::test]
    async fn test_stream_bad_json_is_fatal() {
        let out = collect(frames(&[
            "data: {\"type\":\"response.created\",\"response\":{\"id\":\"r1\"}}\n\n",
            "data: {not json\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"never\"}\n\n",
        ]))
        .await;

        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(BridgeError::Stream { .. })));
    }

    #[tokio::test]
    async fn test_stream_upstream_error_is_fatal() {
        let out = collect(vec![
            Ok(Bytes::from_static(
                b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"a\"}\n\n",
            )),
            Err(BridgeError::upstream("connection reset")),
            Ok(Bytes::from_static(
                b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"b\"}\n\n",
            )),
        ])
        .await;

        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(out[1].is_err());
    }

    #[tokio::test]
    async fn test_stream_unterminated_tail_discarded() {
        let out = collect(frames(&[
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"kept\"}\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"lost\"}",
        ]))
        .await;

        assert_eq!(out.len(), 1);
        let frame = String::from_utf8(out[0].as_ref().unwrap().to_vec()).unwrap();
        assert!(frame.contains("kept"));
    }

    #[tokio::test]
    async fn test_stream_tolerates_shape_differences() {
        let out = collect(frames(&[
            "data: {\"type\":\"response.created\",\"response\":{\"id\":\"r1\",\"created_at\":null,\"model\":\"m\"}}\n\n",
            "data: {\"type\":\"response.output_item.added\",\"output_index\":0,\"item\":{\"type\":\"message\",\"role\":\"assistant\"}}\n\n",
            "data: {\"type\":\"response.content_part.added\",\"item_id\":\"x\",\"output_index\":0,\"content_index\":0,\"part\":{\"type\":\"output_text\",\"text\":\"\"}}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":[\"not\",\"a\",\"string\"]}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hello\"}\n\n",
        ]))
        .await;

        let text: Vec<String> = out
            .into_iter()
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect();

        assert_eq!(text.len(), 2);
        assert!(text[0].contains("\"created\":0"));
        assert!(text[0].contains("\"role\":\"assistant\""));
        assert!(text[1].contains("\"content\":\"Hello\""));
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_upstream() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());

        let frame = Bytes::from_static(
            b"data: {\"type\":\"response.output_text.delta\",\"delta\":\"a\"}\n\n",
        );
        // endless upstream that owns the flag
        let upstream = stream::repeat(frame).map(move |chunk| {
            let _owner = &flag;
            Ok::<_, BridgeError>(chunk)
        });

        let mut translated = Box::pin(transform_event_stream(
            upstream,
            SharedLogger::in_memory(false),
            "test".to_string(),
        ));

        assert!(translated.next().await.unwrap().is_ok());
        assert!(!dropped.load(Ordering::SeqCst));

        drop(translated);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
