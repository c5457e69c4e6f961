use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use finadvisor_core::domain::advisory::{AdvisoryInput, AdvisoryOutput};
use finadvisor_core::domain::contract::SchemaViolation;
use finadvisor_core::flow::{AdvisoryError, AdvisoryFlow};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AppState {
    /// `None` when no model client is configured; the API then runs degraded.
    pub flow: Option<AdvisoryFlow>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/advisory/schema", get(get_schema))
        .route("/v1/advisory/suggestions", post(post_suggestions))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Serialize)]
struct ApiSchema {
    input: Value,
    output: Value,
}

async fn get_schema() -> Json<ApiSchema> {
    Json(ApiSchema {
        input: AdvisoryInput::schema().schema,
        output: AdvisoryOutput::schema().schema,
    })
}

#[derive(Debug, Serialize)]
struct ApiSuggestions {
    request_id: Uuid,
    completed_at: DateTime<Utc>,
    #[serde(flatten)]
    output: AdvisoryOutput,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<SchemaViolation>,
}

impl ApiError {
    fn response(status: StatusCode, body: ApiError) -> Response {
        (status, Json(body)).into_response()
    }
}

fn error_response(err: AdvisoryError) -> Response {
    let kind = err.kind().as_str();
    let retryable = err.is_retryable();
    match err {
        AdvisoryError::InvalidInput(violations) => ApiError::response(
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError {
                error: kind,
                message: "fix the highlighted fields and submit again".to_string(),
                retryable,
                violations,
            },
        ),
        AdvisoryError::InvocationFailed(_) => ApiError::response(
            StatusCode::BAD_GATEWAY,
            ApiError {
                error: kind,
                message: "the advisory service is unavailable; try again later".to_string(),
                retryable,
                violations: Vec::new(),
            },
        ),
        AdvisoryError::MalformedOutput { .. } => ApiError::response(
            StatusCode::BAD_GATEWAY,
            ApiError {
                error: kind,
                message: "the advisory service returned an unusable answer; try again".to_string(),
                retryable,
                violations: Vec::new(),
            },
        ),
    }
}

async fn post_suggestions(State(state): State<AppState>, Json(raw): Json<Value>) -> Response {
    let Some(flow) = &state.flow else {
        return ApiError::response(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError {
                error: "model_unavailable",
                message: "no model client is configured".to_string(),
                retryable: true,
                violations: Vec::new(),
            },
        );
    };

    let request_id = Uuid::new_v4();
    match flow.run(request_id, &raw).await {
        Ok(output) => Json(ApiSuggestions {
            request_id,
            completed_at: Utc::now(),
            output,
        })
        .into_response(),
        Err(err) => {
            if !matches!(err, AdvisoryError::InvalidInput(_)) {
                tracing::error!(%request_id, kind = %err.kind(), error = %err, "advisory request failed");
            }
            error_response(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finadvisor_core::domain::contract::SchemaDescriptor;
    use finadvisor_core::llm::error::InvocationError;
    use finadvisor_core::llm::{ModelClient, Provider, RawModelResponse};
    use serde_json::json;
    use std::sync::Arc;

    struct FixedClient(Result<RawModelResponse, InvocationError>);

    #[async_trait::async_trait]
    impl ModelClient for FixedClient {
        fn provider(&self) -> Provider {
            Provider::Other("fixed")
        }

        async fn invoke(
            &self,
            _prompt_text: &str,
            _output_shape: &SchemaDescriptor,
        ) -> Result<RawModelResponse, InvocationError> {
            self.0.clone()
        }
    }

    fn state_with(reply: Result<RawModelResponse, InvocationError>) -> AppState {
        AppState {
            flow: Some(AdvisoryFlow::new(Arc::new(FixedClient(reply)))),
        }
    }

    fn retirement_input() -> Value {
        json!({
            "income": 5000,
            "expenses": 3000,
            "investmentGoals": "Save for retirement and buy a house",
            "riskTolerance": "medium",
        })
    }

    async fn call(state: AppState, raw: Value) -> (StatusCode, Value) {
        let res = post_suggestions(State(state), Json(raw)).await;
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn returns_validated_suggestions() {
        let state = state_with(Ok(RawModelResponse::Structured(json!({
            "suggestions": "Invest in index funds.",
            "reasoning": "Balanced risk profile.",
        }))));

        let (status, body) = call(state, retirement_input()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suggestions"], json!("Invest in index funds."));
        assert_eq!(body["reasoning"], json!("Balanced risk profile."));
        assert!(body["request_id"].is_string());
        assert!(body["completed_at"].is_string());
    }

    #[tokio::test]
    async fn invalid_input_is_unprocessable_with_violations() {
        let state = state_with(Ok(RawModelResponse::Text(String::new())));
        let (status, body) = call(state, json!({"income": 0, "riskTolerance": "none"})).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], json!("invalid_input"));
        assert_eq!(body["retryable"], json!(false));
        let fields: Vec<_> = body["violations"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            fields,
            vec!["income", "expenses", "investmentGoals", "riskTolerance"]
        );
    }

    #[tokio::test]
    async fn invocation_and_malformed_failures_are_distinct() {
        let failing = state_with(Err(InvocationError::new(
            Provider::Other("fixed"),
            "http",
            "status=529 Overloaded",
        )));
        let (status, body) = call(failing, retirement_input()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], json!("invocation_failed"));
        assert_eq!(body["retryable"], json!(true));
        assert!(body.get("violations").is_none());

        let malformed = state_with(Ok(RawModelResponse::Structured(json!({
            "suggestions": "Invest in index funds.",
        }))));
        let (status, body) = call(malformed, retirement_input()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], json!("malformed_output"));
        assert_eq!(body["retryable"], json!(true));
    }

    #[tokio::test]
    async fn degraded_mode_without_model_client() {
        let (status, body) = call(AppState { flow: None }, retirement_input()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], json!("model_unavailable"));
    }

    #[tokio::test]
    async fn schema_endpoint_exposes_both_contracts() {
        let Json(schema) = get_schema().await;
        assert_eq!(
            schema.output["required"],
            json!(["suggestions", "reasoning"])
        );
        assert_eq!(
            schema.input["properties"]["riskTolerance"]["default"],
            json!("medium")
        );
    }
}
