//! Anthropic-style messages client used by the agent loop.
//!
//! The base URL is configurable so API-compatible third-party providers can
//! be swapped in without code changes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Error, Result};

/// Default messages API endpoint.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Stop reason reported by the messages API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StopReason {
    EndTurn,
    Stop,
    StopSequence,
    MaxTokens,
    ToolUse,
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::EndTurn => "end_turn",
            StopReason::Stop => "stop",
            StopReason::StopSequence => "stop_sequence",
            StopReason::MaxTokens => "max_tokens",
            StopReason::ToolUse => "tool_use",
            StopReason::Other(other) => other.as_str(),
        }
    }

    /// True for stop reasons that end the agent loop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StopReason::EndTurn | StopReason::Stop | StopReason::StopSequence | StopReason::MaxTokens
        )
    }
}

impl From<String> for StopReason {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "end_turn" => StopReason::EndTurn,
            "stop" => StopReason::Stop,
            "stop_sequence" => StopReason::StopSequence,
            "max_tokens" => StopReason::MaxTokens,
            "tool_use" => StopReason::ToolUse,
            other => StopReason::Other(other.to_string()),
        }
    }
}

impl From<StopReason> for String {
    fn from(value: StopReason) -> Self {
        value.as_str().to_string()
    }
}

impl Default for StopReason {
    fn default() -> Self {
        StopReason::Other(String::new())
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message role for the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Typed message fragment: text, a model-issued tool call, or its result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
        }
    }
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message {
            role: Role::User,
            content: vec![ContentBlock::text(content)],
        }
    }

    pub fn user_blocks(content: Vec<ContentBlock>) -> Self {
        Message {
            role: Role::User,
            content,
        }
    }

    pub fn assistant_blocks(content: Vec<ContentBlock>) -> Self {
        Message {
            role: Role::Assistant,
            content,
        }
    }
}

/// Tool definition shipped with each messages request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A tool invocation request extracted from LLM output.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Map<String, Value>,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDefinition],
}

/// Response payload from the messages endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: StopReason,
}

impl MessagesResponse {
    /// Concatenated text blocks.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for block in &self.content {
            if let ContentBlock::Text { text } = block {
                out.push_str(text);
            }
        }
        out
    }

    /// Tool-use blocks as [`ToolCall`]s. Non-object inputs are treated as
    /// empty parameter maps so a malformed call still reaches the executor
    /// (which reports the failure back to the model).
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some(ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    input: match input {
                        Value::Object(map) => map.clone(),
                        _ => Map::new(),
                    },
                }),
                _ => None,
            })
            .collect()
    }
}

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: String,
    /// Model id; falls back to the crate default when empty.
    pub model: String,
    /// Override for API-compatible providers.
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub connect_timeout: Option<Duration>,
}

/// Messages API client. Cheap to clone; safe for concurrent use.
#[derive(Clone, Debug)]
pub struct LlmClient {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    http: reqwest::Client,
    base_url: reqwest::Url,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(Error::Config("LLM api key is required".to_string()));
        }
        let base = cfg
            .base_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        let base_url = reqwest::Url::parse(base.trim_end_matches('/'))
            .map_err(|err| Error::Config(format!("invalid LLM base url: {err}")))?;

        let model = if cfg.model.trim().is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            cfg.model.trim().to_string()
        };

        let http = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout.unwrap_or(Duration::from_secs(5)))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                api_key: cfg.api_key,
                model,
                max_tokens: cfg.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            }),
        })
    }

    pub fn model(&self) -> &str {
        &self.inner.model
    }

    /// One turn of the messages API. Pass an empty `tools` slice to force a
    /// tool-less completion.
    pub async fn messages(
        &self,
        system: Option<&str>,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<MessagesResponse> {
        let url = self
            .inner
            .base_url
            .join("/v1/messages")
            .map_err(|err| Error::Config(format!("invalid path: {err}")))?;

        let body = MessagesRequest {
            model: &self.inner.model,
            max_tokens: self.inner.max_tokens,
            system: system.filter(|s| !s.trim().is_empty()),
            messages,
            tools,
        };

        let resp = self
            .inner
            .http
            .post(url)
            .header("x-api-key", &self.inner.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(Error::Http)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(Error::Llm(format!("status {status}: {excerpt}")));
        }

        let payload: MessagesResponse = resp.json().await.map_err(Error::Http)?;
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stop_reason_terminal_set() {
        assert!(StopReason::from("end_turn".to_string()).is_terminal());
        assert!(StopReason::from("stop".to_string()).is_terminal());
        assert!(StopReason::from("stop_sequence".to_string()).is_terminal());
        assert!(StopReason::from("max_tokens".to_string()).is_terminal());
        assert!(!StopReason::from("tool_use".to_string()).is_terminal());
        assert!(!StopReason::from("content_filter".to_string()).is_terminal());
    }

    #[test]
    fn response_text_concatenates_blocks() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "stop_reason": "end_turn",
            "content": [
                {"type": "text", "text": "Here is "},
                {"type": "tool_use", "id": "tu_1", "name": "list_warehouse_tables", "input": {"dataset_id": "analytics"}},
                {"type": "text", "text": "the plan."}
            ]
        }))
        .unwrap();

        assert_eq!(resp.text(), "Here is the plan.");
        let calls = resp.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "list_warehouse_tables");
        assert_eq!(
            calls[0].input.get("dataset_id").and_then(|v| v.as_str()),
            Some("analytics")
        );
    }

    #[test]
    fn malformed_tool_input_becomes_empty_map() {
        let resp: MessagesResponse = serde_json::from_value(json!({
            "stop_reason": "tool_use",
            "content": [
                {"type": "tool_use", "id": "tu_1", "name": "t", "input": "not an object"}
            ]
        }))
        .unwrap();
        assert!(resp.tool_calls()[0].input.is_empty());
    }

    #[test]
    fn tool_result_serializes_error_flag_only_when_set() {
        let ok = ContentBlock::tool_result("tu_1", "rows", false);
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("is_error"));

        let failed = ContentBlock::tool_result("tu_1", "error: boom", true);
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains(r#""is_error":true"#));
    }

    #[test]
    fn client_requires_api_key() {
        let err = LlmClient::new(LlmConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
