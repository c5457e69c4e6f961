use crate::llm::RawModelResponse;
use anyhow::Context;
use serde_json::Value;

/// Pulls a JSON object out of free model text: a markdown fence wins, then the span from
/// the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if let Some(fence_start) = trimmed.find("```") {
        let after_fence = &trimmed[fence_start + 3..];
        // Skip the info string (```json).
        if let Some((_, body)) = after_fence.split_once('\n') {
            let body = match body.rfind("```") {
                Some(end) => &body[..end],
                None => body,
            };
            let body = body.trim();
            if body.starts_with('{') {
                return Some(body.to_string());
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Decodes a raw model response into a JSON value. Shape checks happen later, in the
/// output contract.
pub fn response_value(response: &RawModelResponse) -> anyhow::Result<Value> {
    match response {
        RawModelResponse::Structured(value) => Ok(value.clone()),
        RawModelResponse::Text(text) => {
            anyhow::ensure!(!text.trim().is_empty(), "model returned no content");
            let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
            serde_json::from_str::<Value>(&json_str)
                .with_context(|| format!("model output is not valid JSON: {json_str}"))
        }
    }
}
