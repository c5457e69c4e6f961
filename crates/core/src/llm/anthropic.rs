use crate::config::Settings;
use crate::domain::contract::SchemaDescriptor;
use crate::llm::error::InvocationError;
use crate::llm::{ModelClient, Provider, RawModelResponse};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.anthropic_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url: settings.anthropic_base_url.clone(),
            model: settings.anthropic_model.clone(),
            max_tokens: settings.anthropic_max_tokens,
        })
    }

    fn error(stage: &'static str, detail: impl Into<String>) -> InvocationError {
        InvocationError::new(Provider::Anthropic, stage, detail)
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest<'_>,
    ) -> Result<CreateMessageResponse, InvocationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Self::error("request", format!("invalid api key header: {e}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .map_err(|e| Self::error("request", format!("Anthropic request failed: {e}")))?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            Self::error("body", format!("failed to read Anthropic response body: {e}"))
        })?;
        let text = Self::check_status(status, text)?;

        Self::decode_response(&text)
    }

    /// Non-2xx bodies never reach the decoder; they become `stage="http"` errors.
    fn check_status(status: StatusCode, text: String) -> Result<String, InvocationError> {
        if !status.is_success() {
            return Err(Self::error("http", format!("status={status}")).with_raw_output(text));
        }
        Ok(text)
    }

    fn decode_response(text: &str) -> Result<CreateMessageResponse, InvocationError> {
        serde_json::from_str::<CreateMessageResponse>(text).map_err(|e| {
            Self::error(
                "decode",
                format!("failed to decode Anthropic response into CreateMessageResponse: {e}"),
            )
            .with_raw_output(text.to_string())
        })
    }

    fn build_request<'a>(
        &'a self,
        prompt_text: &'a str,
        output_shape: &'a SchemaDescriptor,
    ) -> CreateMessageRequest<'a> {
        CreateMessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt_text,
            }],
            tools: vec![Tool {
                name: output_shape.name,
                description: output_shape.description,
                input_schema: &output_shape.schema,
            }],
            tool_choice: ToolChoice::Tool {
                name: output_shape.name,
            },
        }
    }

    /// Prefers the forced tool call; falls back to the text blocks.
    fn into_raw_response(res: CreateMessageResponse, tool_name: &str) -> RawModelResponse {
        let mut text = String::new();
        for block in res.content {
            match block {
                ContentBlock::ToolUse { name, input, .. } if name == tool_name => {
                    return RawModelResponse::Structured(input);
                }
                ContentBlock::Text { text: t } => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&t);
                }
                ContentBlock::ToolUse { .. } | ContentBlock::Unknown => {}
            }
        }

        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!("Anthropic stop_reason=max_tokens; output is likely truncated");
        }
        RawModelResponse::Text(text)
    }
}

#[async_trait::async_trait]
impl ModelClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn invoke(
        &self,
        prompt_text: &str,
        output_shape: &SchemaDescriptor,
    ) -> Result<RawModelResponse, InvocationError> {
        let req = self.build_request(prompt_text, output_shape);
        let res = self.create_message(&req).await?;
        tracing::debug!(
            model = %self.model,
            stop_reason = res.stop_reason.as_deref().unwrap_or("none"),
            blocks = res.content.len(),
            "Anthropic message received"
        );
        Ok(Self::into_raw_response(res, output_shape.name))
    }
}

#[derive(Debug, Serialize)]
struct CreateMessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    tools: Vec<Tool<'a>>,
    tool_choice: ToolChoice<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct Tool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ToolChoice<'a> {
    #[serde(rename = "tool")]
    Tool { name: &'a str },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advisory::AdvisoryOutput;
    use serde_json::json;

    fn client() -> AnthropicClient {
        let settings = Settings::from_lookup(|key| match key {
            "ANTHROPIC_API_KEY" => Some("sk-test".to_string()),
            "ANTHROPIC_MODEL" => Some("claude-test".to_string()),
            _ => None,
        })
        .unwrap();
        AnthropicClient::from_settings(&settings).unwrap()
    }

    #[test]
    fn from_settings_requires_api_key() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert!(AnthropicClient::from_settings(&settings).is_err());
    }

    #[test]
    fn request_forces_the_output_shape_tool() {
        let client = client();
        let shape = AdvisoryOutput::schema();
        let req = client.build_request("Income: 5000", &shape);
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["model"], json!("claude-test"));
        assert_eq!(v["messages"][0], json!({"role": "user", "content": "Income: 5000"}));
        assert_eq!(v["tools"][0]["name"], json!(shape.name));
        assert_eq!(v["tools"][0]["input_schema"], shape.schema);
        assert_eq!(v["tool_choice"], json!({"type": "tool", "name": shape.name}));
        assert!(v.get("system").is_none());
    }

    #[test]
    fn parses_tool_use_input() {
        let body = json!({
            "content": [
                {"type": "thinking", "thinking": "...", "signature": "sig"},
                {"type": "tool_use", "id": "toolu_1", "name": "emit_advisory", "input": {
                    "suggestions": "Invest in index funds.",
                    "reasoning": "Balanced risk profile."
                }}
            ],
            "stop_reason": "tool_use"
        })
        .to_string();

        let res = AnthropicClient::decode_response(&body).unwrap();
        let raw = AnthropicClient::into_raw_response(res, "emit_advisory");
        assert_eq!(
            raw,
            RawModelResponse::Structured(json!({
                "suggestions": "Invest in index funds.",
                "reasoning": "Balanced risk profile."
            }))
        );
    }

    #[test]
    fn falls_back_to_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "```json"},
                {"type": "tool_use", "id": "toolu_2", "name": "something_else", "input": {}},
                {"type": "text", "text": "{\"suggestions\": \"a\"}\n```"}
            ]
        })
        .to_string();

        let res = AnthropicClient::decode_response(&body).unwrap();
        let raw = AnthropicClient::into_raw_response(res, "emit_advisory");
        assert_eq!(
            raw,
            RawModelResponse::Text("```json\n{\"suggestions\": \"a\"}\n```".to_string())
        );
    }

    #[test]
    fn overloaded_status_is_an_http_invocation_error() {
        let body = json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        })
        .to_string();

        let err = AnthropicClient::check_status(StatusCode::from_u16(529).unwrap(), body.clone())
            .unwrap_err();
        assert_eq!(err.provider, Provider::Anthropic);
        assert_eq!(err.stage, "http");
        assert!(err.detail.contains("529"));
        assert_eq!(err.raw_output.as_deref(), Some(body.as_str()));
        assert_eq!(
            err.raw_response_json.as_ref().unwrap()["error"]["type"],
            json!("overloaded_error")
        );
    }

    #[test]
    fn success_status_passes_body_through() {
        let body = "{\"content\": []}".to_string();
        let text = AnthropicClient::check_status(StatusCode::OK, body.clone()).unwrap();
        assert_eq!(text, body);
    }

    #[test]
    fn undecodable_envelope_is_an_invocation_error() {
        let err = AnthropicClient::decode_response("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.provider, Provider::Anthropic);
        assert_eq!(err.stage, "decode");
        assert_eq!(err.raw_output.as_deref(), Some("<html>bad gateway</html>"));
        assert!(err.raw_response_json.is_none());
    }
}
