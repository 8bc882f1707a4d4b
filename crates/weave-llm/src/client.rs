use std::error::Error as StdError;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use weave_core::{ChatMessage, Result, WeaveError, validate_roles};

use crate::metadata::{GenerationUpdate, update_generation_tool_schema};
use crate::stream::ChatStreamParser;

/// Short-timeout budget for the `/api/tags` connectivity check. A stream
/// that runs for minutes must never be capped this way, hence the second
/// client below.
const TAGS_TIMEOUT: Duration = Duration::from_secs(5);

/// A chat turn that ended without producing a `GenerationUpdate`: the
/// underlying cause plus whatever text the accumulator held when the
/// stream was interrupted — by cancellation, a transport/parse failure, or
/// the token consumer itself aborting.
#[derive(Debug)]
pub struct PartialChatError {
    pub error: WeaveError,
    pub partial: String,
}

impl PartialChatError {
    fn bare(error: WeaveError) -> Self {
        Self {
            error,
            partial: String::new(),
        }
    }

    fn with_partial(error: WeaveError, parser: &ChatStreamParser) -> Self {
        Self {
            error,
            partial: parser.accumulator().to_string(),
        }
    }
}

impl std::fmt::Display for PartialChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} accumulated byte(s))", self.error, self.partial.len())
    }
}

impl StdError for PartialChatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.error)
    }
}

/// A connection to a single Ollama-compatible local model server.
pub struct LlmClient {
    base_url: String,
    model: String,
    tags_client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl LlmClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            tags_client: reqwest::Client::builder()
                .timeout(TAGS_TIMEOUT)
                .build()
                .expect("static client config is always valid"),
            // No whole-request timeout: chat streams may legitimately run
            // for minutes. Lifetime is controlled by the caller's
            // cancellation token instead.
            stream_client: reqwest::Client::builder()
                .build()
                .expect("static client config is always valid"),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Verifies the server is reachable and the configured model is loaded.
    pub async fn check_model_loaded(&self) -> Result<()> {
        info!(base_url = %self.base_url, model = %self.model, "checking model availability");

        let response = self
            .tags_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(WeaveError::RequestFailed(response.status().as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WeaveError::ParseError(e.to_string()))?;

        let present = body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .any(|m| m["name"].as_str() == Some(self.model.as_str()))
            })
            .unwrap_or(false);

        if present {
            Ok(())
        } else {
            Err(WeaveError::ModelNotFound(self.model.clone()))
        }
    }

    /// Drives one streaming chat turn. `on_token` is called once per
    /// consumer-visible text delta, in wire-arrival order; it may return an
    /// error to abort the stream early. Returns the fully coerced
    /// `update_generation` metadata once the model finishes.
    ///
    /// Any interruption — cancellation, a transport or parse failure, or
    /// the consumer aborting — returns [`PartialChatError`] carrying both
    /// the cause and whatever text had already reached the accumulator.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        seed: Option<i64>,
        cancel: &CancellationToken,
        mut on_token: impl FnMut(&str) -> Result<()>,
    ) -> std::result::Result<GenerationUpdate, PartialChatError> {
        validate_roles(messages).map_err(PartialChatError::bare)?;

        let body = build_chat_request_body(&self.model, messages, seed);

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PartialChatError::bare(WeaveError::Canceled)),
            result = self.stream_client
                .post(format!("{}/api/chat", self.base_url))
                .json(&body)
                .send() => result.map_err(classify_transport_error).map_err(PartialChatError::bare)?,
        };

        if !response.status().is_success() {
            return Err(PartialChatError::bare(WeaveError::RequestFailed(
                response.status().as_u16(),
            )));
        }

        let mut byte_stream = response.bytes_stream();
        let mut line_buffer = String::new();
        let mut parser = ChatStreamParser::new();

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(PartialChatError::with_partial(WeaveError::Canceled, &parser)),
                chunk = byte_stream.next() => chunk,
            };

            let Some(chunk) = next else { break };
            let bytes = chunk
                .map_err(classify_transport_error)
                .map_err(|e| PartialChatError::with_partial(e, &parser))?;
            line_buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(pos) = line_buffer.find('\n') {
                let line = line_buffer[..pos].trim().to_string();
                line_buffer.drain(..=pos);
                if line.is_empty() {
                    continue;
                }

                let event: serde_json::Value = serde_json::from_str(&line)
                    .map_err(|e| PartialChatError::with_partial(WeaveError::ParseError(e.to_string()), &parser))?;

                if let Some(content) = event["message"]["content"].as_str() {
                    parser
                        .push_delta(content, &mut on_token)
                        .map_err(|e| PartialChatError::with_partial(e, &parser))?;
                }

                if event["done"].as_bool() == Some(true) {
                    parser
                        .flush(&mut on_token)
                        .map_err(|e| PartialChatError::with_partial(e, &parser))?;
                    return parser.finish().map_err(|e| PartialChatError::with_partial(e, &parser));
                }
            }
        }

        parser
            .flush(&mut on_token)
            .map_err(|e| PartialChatError::with_partial(e, &parser))?;
        parser.finish().map_err(|e| PartialChatError::with_partial(e, &parser))
    }
}

fn build_chat_request_body(model: &str, messages: &[ChatMessage], seed: Option<i64>) -> serde_json::Value {
    let messages: Vec<_> = messages
        .iter()
        .map(|m| {
            serde_json::json!({
                "role": role_str(m.role),
                "content": m.content,
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "model": model,
        "messages": messages,
        "stream": true,
        "tools": [update_generation_tool_schema()],
    });
    if let Some(seed) = seed {
        body["options"] = serde_json::json!({ "seed": seed });
    }
    body
}

fn role_str(role: weave_core::Role) -> &'static str {
    match role {
        weave_core::Role::System => "system",
        weave_core::Role::User => "user",
        weave_core::Role::Assistant => "assistant",
    }
}

/// Maps a transport-level failure to the sentinel taxonomy: deadline and
/// network-timeout flags become `ConnectionTimeout`; a connection-refused
/// syscall (directly or wrapped in the error's source chain) becomes
/// `NotRunning`; everything else becomes `ConnectionFailed`.
fn classify_transport_error(err: reqwest::Error) -> WeaveError {
    if err.is_timeout() {
        return WeaveError::ConnectionTimeout;
    }
    if is_connection_refused(&err) {
        debug!(error = %err, "local model server refused the connection");
        return WeaveError::NotRunning;
    }
    WeaveError::ConnectionFailed(err.to_string())
}

fn is_connection_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<std::io::Error>()
            && io_err.kind() == std::io::ErrorKind::ConnectionRefused
        {
            return true;
        }
        source = e.source();
    }
    false
}
