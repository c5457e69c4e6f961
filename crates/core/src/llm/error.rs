use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// The model call did not complete: network, auth, quota or service-side failure.
#[derive(Debug, Clone)]
pub struct InvocationError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl InvocationError {
    pub fn new(provider: Provider, stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    pub fn with_raw_output(mut self, raw_output: String) -> Self {
        self.raw_response_json = serde_json::from_str::<Value>(&raw_output).ok();
        self.raw_output = Some(raw_output);
        self
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model invocation failed (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for InvocationError {}
