//! The advisory flow: validate input, render the prompt, invoke the model once, validate
//! the output.
//!
//! Every request ends in exactly one terminal stage. There are no retries, no interim
//! results and no shared mutable state, so one [`AdvisoryFlow`] can serve any number of
//! concurrent callers.

use crate::domain::advisory::{AdvisoryInput, AdvisoryOutput};
use crate::domain::contract::{summarize, SchemaViolation};
use crate::llm::error::InvocationError;
use crate::llm::{json, ModelClient};
use crate::prompt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    Received,
    Validating,
    Rendering,
    Invoking,
    ParsingOutput,
    Succeeded,
    Failed(FailureKind),
}

impl FlowStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => f.write_str("received"),
            Self::Validating => f.write_str("validating"),
            Self::Rendering => f.write_str("rendering"),
            Self::Invoking => f.write_str("invoking"),
            Self::ParsingOutput => f.write_str("parsing_output"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidInput,
    InvocationFailed,
    MalformedOutput,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvocationFailed => "invocation_failed",
            Self::MalformedOutput => "malformed_output",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdvisoryError {
    /// The caller must fix the input. The model was not called.
    #[error("invalid advisory input: {}", summarize(.0))]
    InvalidInput(Vec<SchemaViolation>),

    #[error(transparent)]
    InvocationFailed(#[from] InvocationError),

    /// The model answered but the answer did not satisfy the output contract.
    #[error("model output is malformed: {detail}")]
    MalformedOutput {
        detail: String,
        violations: Vec<SchemaViolation>,
        raw_output: Option<Value>,
    },
}

impl AdvisoryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput(_) => FailureKind::InvalidInput,
            Self::InvocationFailed(_) => FailureKind::InvocationFailed,
            Self::MalformedOutput { .. } => FailureKind::MalformedOutput,
        }
    }

    /// Whether resubmitting the same input could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}

#[derive(Clone)]
pub struct AdvisoryFlow {
    client: Arc<dyn ModelClient>,
}

impl fmt::Debug for AdvisoryFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisoryFlow")
            .field("provider", &self.client.provider())
            .finish()
    }
}

impl AdvisoryFlow {
    pub fn new(client: Arc<dyn ModelClient>) -> Self {
        Self { client }
    }

    pub async fn run(
        &self,
        request_id: Uuid,
        raw: &Value,
    ) -> Result<AdvisoryOutput, AdvisoryError> {
        run_request(self.client.as_ref(), request_id, raw).await
    }
}

/// Runs one advisory request against `client` with a fresh request id.
pub async fn get_advisory_suggestions(
    client: &dyn ModelClient,
    raw: &Value,
) -> Result<AdvisoryOutput, AdvisoryError> {
    run_request(client, Uuid::new_v4(), raw).await
}

async fn run_request(
    client: &dyn ModelClient,
    request_id: Uuid,
    raw: &Value,
) -> Result<AdvisoryOutput, AdvisoryError> {
    let span = tracing::info_span!(
        "advisory_flow",
        %request_id,
        provider = %client.provider(),
        risk_tolerance = tracing::field::Empty,
    );
    run_stages(client, raw).instrument(span).await
}

async fn run_stages(
    client: &dyn ModelClient,
    raw: &Value,
) -> Result<AdvisoryOutput, AdvisoryError> {
    enter(FlowStage::Received);
    let result = advise(client, raw).await;
    match &result {
        Ok(_) => {
            enter(FlowStage::Succeeded);
            tracing::info!("advisory request succeeded");
        }
        Err(err) => {
            enter(FlowStage::Failed(err.kind()));
            tracing::warn!(kind = %err.kind(), error = %err, "advisory request failed");
        }
    }
    result
}

async fn advise(
    client: &dyn ModelClient,
    raw: &Value,
) -> Result<AdvisoryOutput, AdvisoryError> {
    enter(FlowStage::Validating);
    let input = AdvisoryInput::validate(raw)
        .map_err(|e| AdvisoryError::InvalidInput(e.into_violations()))?;
    tracing::Span::current().record("risk_tolerance", input.risk_tolerance().as_str());

    enter(FlowStage::Rendering);
    let prompt_text = prompt::render(&input);
    tracing::trace!(prompt = %prompt_text, "rendered advisory prompt");

    enter(FlowStage::Invoking);
    let output_shape = AdvisoryOutput::schema();
    let response = client.invoke(&prompt_text, &output_shape).await?;

    enter(FlowStage::ParsingOutput);
    tracing::trace!(response = ?response, "raw model response");
    let value = json::response_value(&response).map_err(|e| AdvisoryError::MalformedOutput {
        detail: format!("{e:#}"),
        violations: Vec::new(),
        raw_output: None,
    })?;

    AdvisoryOutput::validate(&value).map_err(|e| AdvisoryError::MalformedOutput {
        detail: e.to_string(),
        violations: e.into_violations(),
        raw_output: Some(value),
    })
}

fn enter(stage: FlowStage) {
    tracing::debug!(%stage, terminal = stage.is_terminal(), "advisory flow stage");
}
