use crate::domain::contract::SchemaDescriptor;
use crate::llm::error::InvocationError;
use std::fmt;

pub mod anthropic;
pub mod error;
pub mod json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    /// Any other implementation, e.g. a fixture.
    Other(&'static str),
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => f.write_str("anthropic"),
            Provider::Other(name) => f.write_str(name),
        }
    }
}

/// What the model produced, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawModelResponse {
    /// Structured output (tool/function call arguments).
    Structured(serde_json::Value),
    /// Free text that may contain a JSON object, possibly fenced in markdown.
    Text(String),
}

/// Boundary to an external text-generation service.
///
/// One call is one attempt. Implementations own any timeout or retry policy.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn invoke(
        &self,
        prompt_text: &str,
        output_shape: &SchemaDescriptor,
    ) -> Result<RawModelResponse, InvocationError>;
}
