use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};

use crate::decode::InputImage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineImage { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(value: impl Into<String>) -> Self {
        ContentPart::Text(value.into())
    }

    pub fn image(image: &InputImage) -> Self {
        ContentPart::InlineImage {
            mime_type: image.mime_type().to_string(),
            data: image.bytes().to_vec(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(text) => Some(text),
            ContentPart::InlineImage { .. } => None,
        }
    }

    pub fn to_wire(&self) -> Value {
        match self {
            ContentPart::Text(text) => json!({ "text": text }),
            ContentPart::InlineImage { mime_type, data } => json!({
                "inlineData": {
                    "mimeType": mime_type,
                    "data": BASE64.encode(data),
                }
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub kind: ResponseKind,
}

impl ContentRequest {
    pub fn text(model: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            model: model.into(),
            parts,
            kind: ResponseKind::Text,
        }
    }

    pub fn image(model: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            model: model.into(),
            parts,
            kind: ResponseKind::Image,
        }
    }

    /// First text part, which is where every request puts its instruction.
    pub fn instruction(&self) -> &str {
        self.parts
            .iter()
            .find_map(ContentPart::as_text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelResponse {
    pub images: Vec<ImageBytes>,
    pub text: Option<String>,
    pub finish_reason: Option<String>,
    pub block_reason: Option<String>,
}

impl ModelResponse {
    pub fn first_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// The hosted model seam. One request in, one response out; implementations
/// surface transport and API failures as errors.
pub trait GenerativeModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate_content(&self, request: &ContentRequest) -> Result<ModelResponse>;
}

impl<T: GenerativeModel + ?Sized> GenerativeModel for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate_content(&self, request: &ContentRequest) -> Result<ModelResponse> {
        (**self).generate_content(request)
    }
}

/// Reads a `generateContent` response body.
///
/// Only the first candidate is read. Its image parts may use either the
/// `inlineData` or `inline_data` spelling; text is its first text part.
pub fn parse_generate_content_response(payload: &Value) -> Result<ModelResponse> {
    let mut out = ModelResponse {
        block_reason: payload
            .get("promptFeedback")
            .and_then(|feedback| feedback.get("blockReason"))
            .and_then(Value::as_str)
            .map(str::to_string),
        ..ModelResponse::default()
    };
    let Some(candidate) = payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        return Ok(out);
    };

    out.finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .map(str::to_string);
    let parts = candidate
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for part in parts {
        if out.text.is_none() {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                out.text = Some(text.to_string());
            }
        }
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object);
        let Some(inline) = inline else {
            continue;
        };
        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let bytes = BASE64
            .decode(data.as_bytes())
            .context("inline image base64 decode failed")?;
        let mime_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .map(str::to_string);
        out.images.push(ImageBytes { bytes, mime_type });
    }

    Ok(out)
}
