//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the Gemini structured-output API.
//! It implements the `GenerationProvider` port from the `core` crate.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use vector_core::plan_request::{GenerationRequest, SchemaNode, SchemaType};
use vector_core::ports::{GenerationProvider, ProviderError};

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    system_instruction: ContentBody,
    contents: Vec<ContentBody>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct ContentBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationProvider` against the Gemini REST API.
#[derive(Clone)]
pub struct GeminiAdapter {
    http: Client,
    api_key: String,
    base_url: String,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter` with its own HTTP client.
    pub fn new(
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

/// Encodes the portable schema in Gemini's OpenAPI-subset dialect.
pub fn gemini_schema(node: &SchemaNode) -> Value {
    let mut schema = Map::new();
    let kind = match node.kind {
        SchemaType::Object => "OBJECT",
        SchemaType::Array => "ARRAY",
        SchemaType::String => "STRING",
        SchemaType::Integer => "INTEGER",
    };
    schema.insert("type".to_string(), json!(kind));
    if let Some(description) = &node.description {
        schema.insert("description".to_string(), json!(description));
    }
    if node.kind == SchemaType::Object {
        let properties: Map<String, Value> = node
            .properties
            .iter()
            .map(|(name, child)| (name.clone(), gemini_schema(child)))
            .collect();
        let ordering: Vec<&String> = node.properties.iter().map(|(name, _)| name).collect();
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("propertyOrdering".to_string(), json!(ordering));
        schema.insert("required".to_string(), json!(node.required));
    }
    if let Some(items) = &node.items {
        schema.insert("items".to_string(), gemini_schema(items));
    }
    Value::Object(schema)
}

fn request_body(request: &GenerationRequest) -> GenerateContentBody {
    GenerateContentBody {
        system_instruction: ContentBody {
            role: None,
            parts: vec![TextPart {
                text: request.system_instruction.clone(),
            }],
        },
        contents: vec![ContentBody {
            role: Some("user"),
            parts: vec![TextPart {
                text: request.prompt.clone(),
            }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: gemini_schema(&request.response_schema),
            temperature: request.temperature,
        },
    }
}

/// Joins the text parts of the first candidate. `None` when there is no text at all.
fn extract_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let texts: Vec<String> = content.parts.into_iter().filter_map(|p| p.text).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    if status == StatusCode::SERVICE_UNAVAILABLE {
        ProviderError::Overloaded(message)
    } else {
        ProviderError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

//=========================================================================================
// `GenerationProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationProvider for GeminiAdapter {
    async fn generate_content(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<String>, ProviderError> {
        debug!(model = %request.model, "Sending generateContent request.");
        let response = self
            .http
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "Provider returned an error status.");
            return Err(classify_failure(status, &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("unreadable response envelope: {e}")))?;
        Ok(extract_text(parsed))
    }
}
