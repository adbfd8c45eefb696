use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};

use crate::client::{
    parse_generate_content_response, ContentRequest, GenerativeModel, ModelResponse, ResponseKind,
};

const ERROR_BODY_MAX_CHARS: usize = 512;

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    timeout: Duration,
    http: HttpClient,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>, timeout_s: f64) -> Self {
        Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs_f64(timeout_s),
            http: HttpClient::new(),
        }
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    pub fn build_payload(request: &ContentRequest) -> Value {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(vec![json!({
                "role": "user",
                "parts": request.parts.iter().map(|part| part.to_wire()).collect::<Vec<_>>(),
            })]),
        );
        if request.kind == ResponseKind::Image {
            payload.insert(
                "generationConfig".to_string(),
                json!({ "responseModalities": ["TEXT", "IMAGE"] }),
            );
        }
        Value::Object(payload)
    }

    fn post(&self, endpoint: &str, payload: &Value) -> Result<HttpResponse> {
        self.http
            .post(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .timeout(self.timeout)
            .json(payload)
            .send()
            // the url carries the key
            .map_err(|err| err.without_url())
            .with_context(|| format!("Gemini request failed ({endpoint})"))
    }
}

impl GenerativeModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ModelResponse> {
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);
        tracing::debug!(
            model = %request.model,
            parts = request.parts.len(),
            "sending generateContent request"
        );
        let response = self.post(&endpoint, &payload)?;
        let body = response_json_or_error("Gemini", response)?;
        let parsed = parse_generate_content_response(&body)?;
        tracing::debug!(
            images = parsed.images.len(),
            has_text = parsed.text.is_some(),
            finish_reason = parsed.finish_reason.as_deref().unwrap_or("-"),
            "generateContent response parsed"
        );
        Ok(parsed)
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    json_body_or_error(provider, status, &body)
}

fn json_body_or_error(provider: &str, status: StatusCode, body: &str) -> Result<Value> {
    if !status.is_success() {
        bail!(
            "{provider} request failed ({}): {}",
            status.as_u16(),
            api_error_message(body)
        );
    }
    serde_json::from_str(body).with_context(|| format!("{provider} returned invalid JSON payload"))
}

/// Google error bodies look like `{"error": {"message": ...}}`; anything else
/// is shown raw.
fn api_error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| body.to_string());
    truncate_text(message.trim(), ERROR_BODY_MAX_CHARS)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
