//! OpenRouter chat-completions image provider.

use crate::config::GraftConfig;
use crate::error::{parse_retry_after, sanitize_error_message, GraftError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{GeneratedImage, GenerationMetadata, GenerationRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// OpenRouter API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Model used when neither the config file nor the command line names one.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-image-preview";
/// Temperature used when neither the config file nor the command line sets one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Lowest temperature OpenRouter accepts.
pub const MIN_TEMPERATURE: f32 = 0.0;
/// Highest temperature OpenRouter accepts.
pub const MAX_TEMPERATURE: f32 = 2.0;

const REFERER: &str = "https://github.com/u1i/graft";
const TITLE: &str = "Graft CLI Tool";

/// Builds an HTTP client, routing through `proxy` when given.
pub(crate) fn http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| GraftError::Config(format!("invalid http_proxy '{proxy}': {e}")))?;
        builder = builder.proxy(proxy);
    }
    Ok(builder.build()?)
}

/// Clamps a temperature into the accepted range, logging when it changes.
pub(crate) fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        tracing::warn!("temperature is NaN, using {DEFAULT_TEMPERATURE}");
        return DEFAULT_TEMPERATURE;
    }
    let clamped = temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
    if clamped != temperature {
        tracing::warn!(
            requested = temperature,
            clamped,
            "temperature outside {MIN_TEMPERATURE}..={MAX_TEMPERATURE}"
        );
    }
    clamped
}

/// Builder for OpenRouterProvider.
#[derive(Debug, Clone, Default)]
pub struct OpenRouterProviderBuilder {
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    system_prompt: Option<String>,
    http_proxy: Option<String>,
    base_url: Option<String>,
}

impl OpenRouterProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds every setting from a loaded config file.
    pub fn config(mut self, config: &GraftConfig) -> Self {
        self.api_key = Some(config.api_key.clone());
        self.model = Some(config.model.clone());
        self.temperature = Some(config.temperature);
        self.system_prompt = config.system_prompt.clone();
        self.http_proxy = config.http_proxy.clone();
        self
    }

    /// Sets the API key. Falls back to `OPENROUTER_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the default model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the default temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets a system prompt sent ahead of every user message.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Routes requests through an HTTP proxy.
    pub fn http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    /// Overrides the API root (used by tests and self-hosted gateways).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<OpenRouterProvider> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GraftError::Config(
                    "no OpenRouter API key: set api_key in ~/.graft_cfg or OPENROUTER_API_KEY"
                        .into(),
                )
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(OpenRouterProvider {
            client: http_client(self.http_proxy.as_deref())?,
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: clamp_temperature(self.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            system_prompt: self.system_prompt.filter(|p| !p.trim().is_empty()),
            base_url,
        })
    }
}

/// OpenRouter image generation provider.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    system_prompt: Option<String>,
    base_url: String,
}

impl OpenRouterProvider {
    /// Creates a new `OpenRouterProviderBuilder`.
    pub fn builder() -> OpenRouterProviderBuilder {
        OpenRouterProviderBuilder::new()
    }

    /// Default model for requests that do not override it.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Default temperature for requests that do not override it.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// API root this provider talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model a request will actually use.
    pub fn resolve_model<'a>(&'a self, request: &'a GenerationRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.model)
    }

    fn build_body(&self, request: &GenerationRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);

        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: MessageContent::Text(system.clone()),
            });
        }

        let mut parts = Vec::with_capacity(2);
        if let Some(prompt) = request.prompt.as_deref().map(str::trim) {
            if !prompt.is_empty() {
                parts.push(ContentPart::Text {
                    text: prompt.to_string(),
                });
            }
        }
        if let Some(ref image) = request.input_image {
            parts.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.to_data_url(),
                },
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: MessageContent::Parts(parts),
        });

        ChatRequest {
            model: self.resolve_model(request).to_string(),
            messages,
            temperature: request
                .temperature
                .map(clamp_temperature)
                .unwrap_or(self.temperature),
            modalities: vec!["image", "text"],
        }
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> GraftError {
        let text = sanitize_error_message(text);
        match status {
            401 | 403 => GraftError::Auth(text),
            402 => GraftError::Billing(format!(
                "insufficient OpenRouter credits ({text}). Top up at https://openrouter.ai/credits"
            )),
            404 => GraftError::InvalidRequest(format!(
                "model not found. Run --list-models to see available models ({text})"
            )),
            429 => {
                let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
                GraftError::RateLimited { retry_after }
            }
            _ => GraftError::Api {
                status,
                message: text,
            },
        }
    }
}

/// Pulls every inline image out of a chat response, in order.
fn extract_images(
    response: ChatResponse,
    model: &str,
    duration_ms: u64,
) -> Result<Vec<GeneratedImage>> {
    if let Some(error) = response.error {
        return Err(GraftError::UnexpectedResponse(format!(
            "provider error: {}",
            sanitize_error_message(&error.message)
        )));
    }

    let choice = response.choices.into_iter().next().ok_or_else(|| {
        GraftError::UnexpectedResponse("no choices in OpenRouter response".into())
    })?;

    let mut images = Vec::with_capacity(choice.message.images.len());
    for entry in choice.message.images {
        let Some(url) = entry.image_url.map(|u| u.url) else {
            continue;
        };
        if !url.starts_with("data:") {
            tracing::warn!(%url, "skipping non-inline image");
            continue;
        }
        let metadata = GenerationMetadata {
            model: Some(model.to_string()),
            index: images.len(),
            duration_ms: Some(duration_ms),
        };
        images.push(GeneratedImage::from_data_url(&url, metadata)?);
    }

    if images.is_empty() {
        let content = choice
            .message
            .content
            .as_ref()
            .and_then(content_text)
            .filter(|c| !c.is_empty());
        return Err(GraftError::NoImages { content });
    }

    Ok(images)
}

/// Flattens message content, which may be a string or a list of text parts.
fn content_text(content: &serde_json::Value) -> Option<String> {
    match content {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect();
            Some(text.join("\n").trim().to_string())
        }
        _ => None,
    }
}

#[async_trait]
impl ImageProvider for OpenRouterProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<GeneratedImage>> {
        request.validate()?;
        let start = Instant::now();

        let body = self.build_body(request);
        tracing::debug!(
            model = %body.model,
            temperature = body.temperature,
            edit = request.is_edit(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(GraftError::UnexpectedResponse(
                "empty response body".into(),
            ));
        }
        let chat: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            GraftError::UnexpectedResponse(format!("malformed response body: {e}"))
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let images = extract_images(chat, &body.model, duration_ms)?;
        tracing::debug!(count = images.len(), duration_ms, "decoded images");
        Ok(images)
    }

    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/key", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(GraftError::Auth("Invalid API key".into())),
            402 => Err(GraftError::Billing("No credits on this key".into())),
            s if !(200..300).contains(&s) => Err(GraftError::Api {
                status: s,
                message: "Key check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    modalities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default)]
    images: Vec<ResponseImage>,
}

#[derive(Debug, Deserialize)]
struct ResponseImage {
    #[serde(default)]
    image_url: Option<ImageUrl>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::{ImageFormat, InputImage};
    use base64::Engine;

    fn provider() -> OpenRouterProvider {
        OpenRouterProviderBuilder::new()
            .api_key("sk-or-test")
            .build()
            .unwrap()
    }

    fn response(json: &str) -> ChatResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let p = provider();
        assert_eq!(p.model(), DEFAULT_MODEL);
        assert_eq!(p.temperature(), DEFAULT_TEMPERATURE);
        assert_eq!(p.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_builder_trims_base_url() {
        let p = OpenRouterProviderBuilder::new()
            .api_key("k")
            .base_url("http://localhost:1234/")
            .build()
            .unwrap();
        assert_eq!(p.base_url(), "http://localhost:1234");
    }

    #[test]
    fn test_builder_from_config() {
        let config = GraftConfig {
            api_key: "sk-or-cfg".into(),
            model: "openai/gpt-5-image".into(),
            temperature: 1.2,
            system_prompt: Some("Be bold".into()),
            http_proxy: None,
        };
        let p = OpenRouterProviderBuilder::new().config(&config).build().unwrap();
        assert_eq!(p.model(), "openai/gpt-5-image");
        assert_eq!(p.temperature(), 1.2);
        assert_eq!(p.system_prompt.as_deref(), Some("Be bold"));
    }

    #[test]
    fn test_builder_with_proxy() {
        let p = OpenRouterProviderBuilder::new()
            .api_key("k")
            .http_proxy("http://127.0.0.1:3128")
            .build();
        assert!(p.is_ok());
    }

    #[test]
    fn test_clamp_temperature() {
        assert_eq!(clamp_temperature(0.5), 0.5);
        assert_eq!(clamp_temperature(-1.0), MIN_TEMPERATURE);
        assert_eq!(clamp_temperature(3.5), MAX_TEMPERATURE);
        assert_eq!(clamp_temperature(f32::NAN), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_prompt_only_body_has_no_image() {
        let body = provider().build_body(&GenerationRequest::new("A sunset"));
        let json = serde_json::to_value(&body).unwrap();

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        let parts = messages[0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "A sunset");
        assert!(!json.to_string().contains("image_url"));
        assert_eq!(json["modalities"], serde_json::json!(["image", "text"]));
    }

    #[test]
    fn test_image_part_round_trips() {
        let original = vec![0xFF, 0xD8, 0xFF, 0xE0, 7, 8, 9, 10, 11, 12];
        let request = GenerationRequest::new("make it green")
            .with_input_image(InputImage::from_bytes(original.clone()));
        let json = serde_json::to_value(provider().build_body(&request)).unwrap();

        let parts = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["type"], "image_url");
        let url = parts[1]["image_url"]["url"].as_str().unwrap();
        let payload = url.strip_prefix("data:image/jpeg;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_image_only_body_has_no_text_part() {
        let request = GenerationRequest::from_image(InputImage::new(vec![1, 2, 3], "image/png"));
        let json = serde_json::to_value(provider().build_body(&request)).unwrap();
        let parts = json["messages"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["type"], "image_url");
    }

    #[test]
    fn test_system_prompt_comes_first() {
        let p = OpenRouterProviderBuilder::new()
            .api_key("k")
            .system_prompt("You are an illustrator")
            .build()
            .unwrap();
        let json = serde_json::to_value(p.build_body(&GenerationRequest::new("cat"))).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You are an illustrator");
        assert_eq!(json["messages"][1]["role"], "user");
    }

    #[test]
    fn test_request_overrides_win() {
        let p = OpenRouterProviderBuilder::new()
            .api_key("k")
            .model("config/model")
            .temperature(0.3)
            .build()
            .unwrap();
        let request = GenerationRequest::new("cat")
            .with_model("flag/model")
            .with_temperature(5.0);
        let body = p.build_body(&request);
        assert_eq!(body.model, "flag/model");
        assert_eq!(body.temperature, MAX_TEMPERATURE);

        let body = p.build_body(&GenerationRequest::new("cat"));
        assert_eq!(body.model, "config/model");
        assert_eq!(body.temperature, 0.3);
    }

    #[test]
    fn test_extract_images_in_order() {
        let resp = response(
            r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "Here you go",
                    "images": [
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AQ=="}},
                        {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,Ag=="}},
                        {"type": "image_url", "image_url": {"url": "data:image/webp;base64,Aw=="}}
                    ]
                }
            }]
        }"#,
        );
        let images = extract_images(resp, "m", 5).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].data, vec![1]);
        assert_eq!(images[1].data, vec![2]);
        assert_eq!(images[2].data, vec![3]);
        assert_eq!(images[0].format, ImageFormat::Png);
        assert_eq!(images[1].format, ImageFormat::Jpeg);
        assert_eq!(images[2].format, ImageFormat::WebP);
        assert_eq!(images[2].metadata.index, 2);
        assert_eq!(images[0].metadata.model.as_deref(), Some("m"));
    }

    #[test]
    fn test_extract_skips_remote_urls() {
        let resp = response(
            r#"{"choices": [{"message": {"images": [
                {"image_url": {"url": "https://cdn.example.com/a.png"}},
                {"image_url": {"url": "data:image/png;base64,AQID"}}
            ]}}]}"#,
        );
        let images = extract_images(resp, "m", 0).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].metadata.index, 0);
    }

    #[test]
    fn test_extract_no_images_carries_content() {
        let resp = response(
            r#"{"choices": [{"message": {"content": "I cannot draw that."}}]}"#,
        );
        match extract_images(resp, "m", 0) {
            Err(GraftError::NoImages { content }) => {
                assert_eq!(content.as_deref(), Some("I cannot draw that."));
            }
            other => panic!("expected NoImages, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_no_images_null_content() {
        let resp = response(r#"{"choices": [{"message": {"content": null, "images": []}}]}"#);
        assert!(matches!(
            extract_images(resp, "m", 0),
            Err(GraftError::NoImages { content: None })
        ));
    }

    #[test]
    fn test_extract_no_choices() {
        let resp = response(r#"{"choices": []}"#);
        assert!(matches!(
            extract_images(resp, "m", 0),
            Err(GraftError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_extract_embedded_error() {
        let resp = response(r#"{"error": {"message": "upstream failed", "code": 502}}"#);
        let err = extract_images(resp, "m", 0).unwrap_err();
        assert!(err.to_string().contains("upstream failed"));
    }

    #[test]
    fn test_content_text_from_parts() {
        let value = serde_json::json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        assert_eq!(content_text(&value).as_deref(), Some("a\nb"));
    }

    #[test]
    fn test_parse_error_mapping() {
        let p = provider();
        let headers = reqwest::header::HeaderMap::new();
        assert!(matches!(p.parse_error(401, "bad key", &headers), GraftError::Auth(_)));
        assert!(matches!(p.parse_error(402, "", &headers), GraftError::Billing(_)));
        assert!(matches!(
            p.parse_error(404, "", &headers),
            GraftError::InvalidRequest(_)
        ));
        assert!(matches!(
            p.parse_error(429, "", &headers),
            GraftError::RateLimited { retry_after: None }
        ));
        match p.parse_error(500, "boom", &headers) {
            GraftError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }
}
