//! OpenAI-compatible provider (`/v1/chat/completions`, `/v1/embeddings`).
//!
//! All OpenAI wire types are private to this module — callers only see
//! [`ModelOutput`], [`TextStream`] and plain vectors. Tool-call loops belong
//! at the agent layer; this provider is stateless and does one round-trip
//! per call.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::config::OpenAiConfig;
use crate::llm::{
    AssistantMessage, ChatMessage, ModelOutput, ProviderError, Role, TextStream,
    ToolCallRequest, ToolDefinition,
};

/// `finish_reason` reported when the provider's safety filter withheld content.
const CONTENT_FILTER: &str = "content_filter";

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing the OpenAI chat and embeddings
/// APIs.
///
/// Covers OpenAI, OpenAI-compatible local servers (Ollama, LM Studio…),
/// and hosted alternatives. Constructed once at startup, then cheaply cloned
/// because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    embeddings_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local models. When present it is sent
    /// as `Authorization: Bearer <key>` on every request.
    pub fn new(config: &OpenAiConfig, api_key: Option<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.clone(),
            embeddings_url: config.embeddings_url.clone(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    // Some models (gpt-5 family) do not accept a temperature parameter.
    fn temperature(&self) -> Option<f32> {
        if self.model.starts_with("gpt-5") {
            None
        } else {
            Some(self.temperature)
        }
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Send the full message list with `tools` bound and return the first choice.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ModelOutput, ProviderError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: self.temperature(),
            tools: tools.iter().map(WireTool::from).collect(),
            max_tokens: self.max_tokens,
            stream: false,
        };

        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending LLM chat request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let response = self
            .post(&self.api_base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "received LLM response"
            );
        }
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&parsed)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(response = %json, "full LLM response payload");
        }

        into_model_output(parsed)
    }

    /// Stream a completion of `prompt` sent as a single user message.
    pub async fn complete_stream(&self, prompt: &str) -> Result<TextStream, ProviderError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![WireMessage::from(&ChatMessage::user(prompt))],
            temperature: self.temperature(),
            tools: Vec::new(),
            max_tokens: self.max_tokens,
            stream: true,
        };

        debug!(model = %payload.model, prompt_len = prompt.len(), "sending LLM stream request");

        let response = self
            .post(&self.api_base_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "LLM stream request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;
        let response = check_status(response).await?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();
        Ok(sse_text_stream(body))
    }

    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let payload = EmbeddingRequest { model: &self.embedding_model, input: inputs };
        debug!(model = %self.embedding_model, inputs = inputs.len(), "sending embeddings request");

        let response = self
            .post(&self.embeddings_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(url = %self.embeddings_url, error = %e, "embeddings request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;
        let response = check_status(response).await?;

        let mut parsed = response.json::<EmbeddingResponse>().await.map_err(|e| {
            ProviderError::Request(format!("failed to parse embeddings body: {e}"))
        })?;
        if parsed.data.len() != inputs.len() {
            return Err(ProviderError::Request(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

fn into_model_output(parsed: ChatCompletionResponse) -> Result<ModelOutput, ProviderError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Request("response contained no choices".into()))?;

    if choice.finish_reason.as_deref() == Some(CONTENT_FILTER) {
        return Err(ProviderError::Blocked("finish_reason=content_filter".into()));
    }

    match (choice.message, choice.text) {
        (Some(message), _) => {
            if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
                return Err(ProviderError::Blocked(refusal));
            }
            Ok(ModelOutput::Chat(AssistantMessage {
                content: message.content.unwrap_or_default(),
                tool_calls: message
                    .tool_calls
                    .into_iter()
                    .map(|c| ToolCallRequest {
                        id: c.id,
                        name: c.function.name,
                        arguments: c.function.arguments,
                    })
                    .collect(),
            }))
        }
        (None, Some(text)) => Ok(ModelOutput::Completion(text)),
        (None, None) => Err(ProviderError::Request("choice has neither message nor text".into())),
    }
}

// ── Streaming ─────────────────────────────────────────────────────────────────

/// Text and stop flag carried by one SSE event; `None` for `[DONE]`.
fn decode_event(data: &str) -> Option<(Vec<Result<String, ProviderError>>, bool)> {
    let data = data.trim();
    if data == "[DONE]" {
        return None;
    }
    if data.is_empty() {
        return Some((Vec::new(), false));
    }
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some((vec![Err(ProviderError::Request(format!("bad stream chunk: {e}")))], true));
        }
    };
    let mut items = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            items.push(Ok(text));
        }
        if choice.finish_reason.as_deref() == Some(CONTENT_FILTER) {
            items.push(Err(ProviderError::Blocked("finish_reason=content_filter".into())));
            return Some((items, true));
        }
    }
    Some((items, false))
}

/// Content deltas of a chat-completions event stream. Ends at `[DONE]`, a
/// content-filter stop, or the first transport or decode error.
fn sse_text_stream(body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>) -> TextStream {
    let events = body.eventsource().boxed();
    stream::unfold((events, false), |(mut events, stopped)| async move {
        if stopped {
            return None;
        }
        loop {
            let event = match events.next().await? {
                Ok(event) => event,
                Err(e) => {
                    let err = ProviderError::Request(format!("event stream: {e}"));
                    return Some((vec![Err(err)], (events, true)));
                }
            };
            trace!(event = %event.event, bytes = event.data.len(), "sse event");
            let (items, stop) = decode_event(&event.data)?;
            if !items.is_empty() || stop {
                return Some((items, (events, stop)));
            }
        }
    })
    .flat_map(stream::iter)
    .boxed()
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ChatMessage> for WireMessage {
    fn from(m: &ChatMessage) -> Self {
        // Assistant tool-call turns may legitimately carry no text.
        let content = if m.content.is_empty() && !m.tool_calls.is_empty() {
            None
        } else {
            Some(m.content.clone())
        };
        Self {
            role: m.role,
            content,
            tool_calls: m
                .tool_calls
                .iter()
                .map(|c| WireToolCall {
                    id: c.id.clone(),
                    kind: function_kind(),
                    function: WireFunctionCall {
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                    },
                })
                .collect(),
            tool_call_id: m.tool_call_id.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(t: &ToolDefinition) -> Self {
        Self {
            kind: "function",
            function: WireFunctionDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    /// Legacy text-completion shape.
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Consume the response and return it if successful, or a structured error.
/// Policy rejections reported as HTTP errors map to [`ProviderError::Blocked`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env.error.code.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        if code
            .as_deref()
            .is_some_and(|c| c == CONTENT_FILTER || c == "content_policy_violation")
        {
            return Err(ProviderError::Blocked(env.error.message));
        }
        let code = code.map(|c| format!(" [code={c}]")).unwrap_or_default();
        let message = format!("HTTP {status}{code}: {}", env.error.message);
        error!(%status, %message, "LLM request returned HTTP error");
        return Err(ProviderError::Request(message));
    }

    let message = format!("HTTP {status}: {body}");
    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<ModelOutput, ProviderError> {
        into_model_output(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn plain_chat_answer() {
        let out = parse(r#"{"choices":[{"message":{"content":"Paris."},"finish_reason":"stop"}]}"#)
            .unwrap();
        assert_eq!(out, ModelOutput::Chat(AssistantMessage::text("Paris.")));
    }

    #[test]
    fn tool_call_answer() {
        let out = parse(
            r#"{"choices":[{"message":{"content":null,"tool_calls":[
                {"id":"call_1","type":"function","function":{"name":"knowledge_base_tool","arguments":"{\"query\":\"vpn\"}"}}
            ]},"finish_reason":"tool_calls"}]}"#,
        )
        .unwrap();
        let ModelOutput::Chat(msg) = out else { panic!("expected chat shape") };
        assert_eq!(msg.content, "");
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].name, "knowledge_base_tool");
        assert_eq!(msg.tool_calls[0].arguments, r#"{"query":"vpn"}"#);
    }

    #[test]
    fn legacy_completion_shape() {
        let out = parse(r#"{"choices":[{"text":"hello there","finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(out, ModelOutput::Completion("hello there".into()));
    }

    #[test]
    fn content_filter_is_blocked() {
        let err = parse(r#"{"choices":[{"message":{"content":""},"finish_reason":"content_filter"}]}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Blocked(_)));
    }

    #[test]
    fn refusal_is_blocked() {
        let err = parse(r#"{"choices":[{"message":{"content":null,"refusal":"I can't"}}]}"#)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Blocked(r) if r == "I can't"));
    }

    #[test]
    fn empty_choices_error() {
        assert!(matches!(parse(r#"{"choices":[]}"#), Err(ProviderError::Request(_))));
    }

    #[test]
    fn wire_message_omits_empty_tool_call_content() {
        let msg = ChatMessage::assistant_tool_calls(
            "",
            vec![ToolCallRequest { id: "c1".into(), name: "t".into(), arguments: "{}".into() }],
        );
        let json = serde_json::to_value(WireMessage::from(&msg)).unwrap();
        assert!(json["content"].is_null());
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["type"], "function");
    }

    #[tokio::test]
    async fn sse_stream_joins_deltas_across_chunk_boundaries() {
        let raw = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Gradient \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"descent\"}}]}\n\n",
            "data: [DONE]\n\n",
        )
        .as_bytes()
        .to_vec();
        // Split mid-line to exercise buffering.
        let (a, b) = raw.split_at(30);
        let body = stream::iter(vec![Ok(a.to_vec()), Ok(b.to_vec())]).boxed();
        let pieces: Vec<String> = sse_text_stream(body).map(|r| r.unwrap()).collect().await;
        assert_eq!(pieces.concat(), "Gradient descent");
    }

    #[tokio::test]
    async fn sse_content_filter_yields_blocked_error() {
        let raw = b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"content_filter\"}]}\n\n".to_vec();
        let body = stream::iter(vec![Ok(raw)]).boxed();
        let items: Vec<Result<String, ProviderError>> = sse_text_stream(body).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ProviderError::Blocked(_))));
    }

    #[tokio::test]
    async fn sse_event_data_may_span_lines() {
        let raw = concat!(
            "data: {\"choices\":\n",
            "data: [{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            ": keep-alive\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"after done\"}}]}\n\n",
        );
        let body = stream::iter(vec![Ok(raw.as_bytes().to_vec())]).boxed();
        let items: Vec<Result<String, ProviderError>> = sse_text_stream(body).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Ok(text) if text == "hi"));
    }

    #[tokio::test]
    async fn sse_malformed_event_ends_stream_with_error() {
        let raw = "data: {not json}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n";
        let body = stream::iter(vec![Ok(raw.as_bytes().to_vec())]).boxed();
        let items: Vec<Result<String, ProviderError>> = sse_text_stream(body).collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(ProviderError::Request(msg)) if msg.contains("bad stream chunk")));
    }
}
