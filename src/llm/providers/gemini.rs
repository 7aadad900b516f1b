//! Google Gemini provider using the public `generateContent` REST endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::litellm::{body_error, build_http_client, status_error, transport_error};
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

/// Default Gemini API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model to use if none specified.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Gemini provider authenticated with an API key.
pub struct GeminiProvider {
    /// HTTP client for making API requests.
    client: Client,
    api_key: String,
    base_url: String,
    /// Default model to use when none is specified.
    default_model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: impl Into<String>, timeout_secs: u64) -> Result<Self, LlmError> {
        Self::with_base_url(api_key, GEMINI_BASE_URL, model, timeout_secs)
    }

    /// Create a provider against a custom base URL, e.g. a proxy.
    pub fn with_base_url(
        api_key: String,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let model = model.into();
        Ok(Self {
            client: build_http_client(timeout_secs)?,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: if model.is_empty() {
                DEFAULT_GEMINI_MODEL.to_string()
            } else {
                model
            },
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }
}

/// Builds the request body. System messages become `systemInstruction`,
/// assistant messages take the `model` role.
fn build_request(request: &GenerationRequest) -> ApiRequest {
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for message in &request.messages {
        let part = ApiPart {
            text: message.content.clone(),
        };
        match message.role.as_str() {
            "system" => system_parts.push(part),
            "assistant" => contents.push(ApiContent {
                role: Some("model".to_string()),
                parts: vec![part],
            }),
            _ => contents.push(ApiContent {
                role: Some("user".to_string()),
                parts: vec![part],
            }),
        }
    }

    ApiRequest {
        contents,
        system_instruction: (!system_parts.is_empty()).then_some(ApiContent {
            role: None,
            parts: system_parts,
        }),
        generation_config: ApiGenerationConfig {
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            max_output_tokens: request.max_tokens,
            presence_penalty: request.presence_penalty,
            frequency_penalty: request.frequency_penalty,
            stop_sequences: request.stop.clone(),
        },
    }
}

fn into_response(api_response: ApiResponse, model: String) -> Result<GenerationResponse, LlmError> {
    if api_response.candidates.is_empty() {
        let reason = api_response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates returned".to_string());
        return Err(LlmError::ParseError(format!("Gemini returned no candidates: {}", reason)));
    }

    let choices = api_response
        .candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let text = candidate
                .content
                .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
                .unwrap_or_default();
            Choice {
                index: candidate.index.unwrap_or(i as u32),
                message: Message::assistant(text),
                finish_reason: candidate
                    .finish_reason
                    .map(|r| r.to_lowercase())
                    .unwrap_or_else(|| "stop".to_string()),
            }
        })
        .collect();

    let usage = api_response
        .usage_metadata
        .map(|u| Usage::new(u.prompt_token_count, u.candidates_token_count))
        .unwrap_or_default();

    Ok(GenerationResponse {
        id: api_response.response_id.unwrap_or_default(),
        model: api_response.model_version.unwrap_or(model),
        choices,
        usage,
    })
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };
        let api_request = build_request(&request);

        let http_response = self
            .client
            .post(self.endpoint(&model))
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = http_response.status();

        if !status.is_success() {
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            return Err(status_error(status.as_u16(), message));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| body_error(e, "Failed to parse Gemini response"))?;

        into_response(api_response, model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    response_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    index: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = GenerationRequest::new(
            "",
            vec![Message::system("Be helpful."), Message::user("Write a chat.")],
        )
        .with_temperature(0.8)
        .with_top_k(40)
        .with_max_tokens(1200)
        .with_stop_sequences(vec!["END".to_string()]);

        let body = serde_json::to_value(build_request(&request)).expect("serialize");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be helpful.");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Write a chat.");
        assert_eq!(body["generationConfig"]["topK"], 40);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1200);
        assert_eq!(body["generationConfig"]["stopSequences"][0], "END");
        assert!(body["generationConfig"].get("topP").is_none());
    }

    #[test]
    fn test_response_conversion() {
        let raw = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15},
            "modelVersion": "gemini-2.0-flash-001"
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).expect("parse");
        let response = into_response(parsed, "gemini-2.0-flash".to_string()).expect("convert");

        assert_eq!(response.first_content(), Some("Hello there"));
        assert_eq!(response.choices[0].finish_reason, "stop");
        assert_eq!(response.usage, Usage::new(12, 3));
        assert_eq!(response.model, "gemini-2.0-flash-001");
    }

    #[test]
    fn test_blocked_prompt_is_parse_error() {
        let parsed: ApiResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#).expect("parse");
        let err = into_response(parsed, "m".to_string()).expect_err("no candidates");
        assert!(matches!(err, LlmError::ParseError(msg) if msg.contains("SAFETY")));
    }

    #[test]
    fn test_endpoint_and_default_model() {
        let provider =
            GeminiProvider::with_base_url("key".to_string(), "http://localhost:8080/", "", 30)
                .expect("provider");
        assert_eq!(provider.default_model(), DEFAULT_GEMINI_MODEL);
        assert_eq!(
            provider.endpoint("gemini-1.5-pro"),
            "http://localhost:8080/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }
}
