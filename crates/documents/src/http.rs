//! OCR and extraction boundaries backed by an OpenAI-compatible
//! chat-completions endpoint.
//!
//! Both clients send a single request per call and classify failures with
//! [`BoundaryError::from_status`]; retrying is left to the caller's
//! [`RetryPolicy`](resilience::RetryPolicy).
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use resilience::BoundaryError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::boundary::{ExtractionService, OcrService};
use crate::error::DocumentError;
use crate::types::{
    Document, ExtractedRecord, ExtractionRequest, ImageFormat, MediaType, OcrResult,
};

/// Upper bound on how much of an error body is kept in error messages.
const MAX_ERROR_BODY: usize = 512;

const OCR_SYSTEM_PROMPT: &str = "You are an OCR engine. Transcribe all text visible in the \
image exactly as printed, preserving line breaks. Respond with JSON of the form \
{\"pages\":[{\"text\":string,\"confidence\":number between 0 and 1}]}.";

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract structured data from document text. \
Fill the fields of the given JSON schema using only values that appear in the text; use null \
for anything that is not present. Respond with JSON of the form \
{\"data\":object,\"confidence\":number between 0 and 1}.";

/// Connection settings for one chat-completions endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpBoundaryConfig {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub connect_timeout_ms: u64,
}

impl Default for HttpBoundaryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_owned(),
            api_key: None,
            model: "gpt-4o-mini".to_owned(),
            max_tokens: 4096,
            temperature: 0.0,
            connect_timeout_ms: 10_000,
        }
    }
}

impl fmt::Debug for HttpBoundaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBoundaryConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .finish()
    }
}

impl HttpBoundaryConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_client(&self) -> Result<reqwest::Client, DocumentError> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(self.connect_timeout_ms))
            .build()
            .map_err(|err| DocumentError::HttpClient(err.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    response_format: Value,
}

#[derive(Debug, Serialize)]
struct Message {
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

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrPayload {
    #[serde(default)]
    pages: Vec<OcrPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrPage {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default, alias = "page")]
    page_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ExtractionPayload {
    data: Value,
    #[serde(default)]
    confidence: Option<f64>,
}

fn ocr_request(config: &HttpBoundaryConfig, format: ImageFormat, content: &[u8]) -> ChatRequest {
    let data_url = format!("data:{};base64,{}", format.mime(), STANDARD.encode(content));
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            Message {
                role: "system",
                content: MessageContent::Text(OCR_SYSTEM_PROMPT.to_owned()),
            },
            Message {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: "Transcribe this document.".to_owned(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_url,
                            detail: "high",
                        },
                    },
                ]),
            },
        ],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        response_format: json!({ "type": "json_object" }),
    }
}

fn extraction_request(config: &HttpBoundaryConfig, request: &ExtractionRequest) -> ChatRequest {
    let schema = &request.target_schema;
    let envelope = json!({
        "type": "object",
        "properties": {
            "data": schema.schema,
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
        },
        "required": ["data", "confidence"]
    });
    let user = format!(
        "Schema `{}`:\n{}\n\nDocument text:\n---\n{}\n---",
        schema.name, schema.schema, request.source_text
    );
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            Message {
                role: "system",
                content: MessageContent::Text(EXTRACTION_SYSTEM_PROMPT.to_owned()),
            },
            Message {
                role: "user",
                content: MessageContent::Text(user),
            },
        ],
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        response_format: json!({
            "type": "json_schema",
            "json_schema": { "name": schema_identifier(&schema.name), "schema": envelope }
        }),
    }
}

/// The `json_schema.name` field only accepts `[A-Za-z0-9_-]`.
fn schema_identifier(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() { "document".to_owned() } else { cleaned }
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }
    body
}

fn transport_error(err: reqwest::Error) -> BoundaryError {
    if let Some(status) = err.status() {
        return BoundaryError::from_status(status.as_u16(), err.to_string());
    }
    if err.is_decode() {
        return BoundaryError::MalformedResponse(err.to_string());
    }
    BoundaryError::Network(err.to_string())
}

/// Models sometimes wrap JSON in a markdown fence despite `response_format`.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

async fn post_chat(
    http: &reqwest::Client,
    endpoint: &str,
    api_key: Option<&str>,
    request: &ChatRequest,
) -> Result<String, BoundaryError> {
    let started = Instant::now();
    let mut builder = http.post(endpoint).json(request);
    if let Some(key) = api_key {
        builder = builder.bearer_auth(key);
    }

    let response = builder.send().await.map_err(transport_error)?;
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        warn!(
            endpoint,
            model = %request.model,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat_completion_rejected"
        );
        return Err(BoundaryError::from_status(status.as_u16(), truncate(body)));
    }

    let parsed: ChatResponse = serde_json::from_str(&body).map_err(|err| {
        BoundaryError::MalformedResponse(format!("invalid chat completion body: {err}"))
    })?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| BoundaryError::MalformedResponse("no message content in response".into()))?;

    debug!(
        endpoint,
        model = %request.model,
        elapsed_ms = started.elapsed().as_millis() as u64,
        content_len = content.len(),
        "chat_completion_ok"
    );
    Ok(content)
}

fn parse_ocr_content(content: &str) -> Result<Vec<OcrResult>, BoundaryError> {
    let payload: OcrPayload = serde_json::from_str(strip_code_fence(content))
        .map_err(|err| BoundaryError::MalformedResponse(format!("invalid OCR payload: {err}")))?;

    let pages = payload
        .pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| {
            let confidence = page.confidence.unwrap_or_else(|| {
                warn!(page = index + 1, "ocr_page_missing_confidence");
                0.0
            });
            let number = page
                .page_number
                .unwrap_or_else(|| u32::try_from(index + 1).unwrap_or(u32::MAX));
            OcrResult::new(page.text, confidence).with_page(number)
        })
        .collect();
    Ok(pages)
}

fn parse_extraction_content(content: &str) -> Result<ExtractedRecord, BoundaryError> {
    let payload: ExtractionPayload = serde_json::from_str(strip_code_fence(content)).map_err(
        |err| BoundaryError::MalformedResponse(format!("invalid extraction payload: {err}")),
    )?;
    let extraction_confidence = payload.confidence.unwrap_or_else(|| {
        warn!("extraction_missing_confidence");
        0.0
    });
    Ok(ExtractedRecord {
        json: payload.data,
        extraction_confidence,
    })
}

/// [`OcrService`] that sends images to a vision-capable chat model.
///
/// PDFs are rejected with HTTP-style status 415 without a network call.
#[derive(Debug, Clone)]
pub struct VisionOcrClient {
    http: reqwest::Client,
    endpoint: String,
    config: HttpBoundaryConfig,
}

impl VisionOcrClient {
    pub fn new(config: HttpBoundaryConfig) -> Result<Self, DocumentError> {
        Ok(Self {
            http: config.build_client()?,
            endpoint: config.endpoint(),
            config,
        })
    }

    pub fn config(&self) -> &HttpBoundaryConfig {
        &self.config
    }
}

#[async_trait]
impl OcrService for VisionOcrClient {
    fn name(&self) -> &str {
        "vision_ocr"
    }

    async fn recognize(&self, document: &Document) -> Result<Vec<OcrResult>, BoundaryError> {
        let format = match document.media_type() {
            MediaType::Image(format) => format,
            other @ MediaType::Pdf => {
                return Err(BoundaryError::ClientRequest {
                    status: 415,
                    message: format!("vision OCR accepts images only, got {other}"),
                });
            }
        };
        let request = ocr_request(&self.config, format, document.content());
        let content = post_chat(
            &self.http,
            &self.endpoint,
            self.config.api_key.as_deref(),
            &request,
        )
        .await?;
        parse_ocr_content(&content)
    }
}

/// [`ExtractionService`] that asks a chat model to fill a JSON schema.
#[derive(Debug, Clone)]
pub struct CompletionExtractionClient {
    http: reqwest::Client,
    endpoint: String,
    config: HttpBoundaryConfig,
}

impl CompletionExtractionClient {
    pub fn new(config: HttpBoundaryConfig) -> Result<Self, DocumentError> {
        Ok(Self {
            http: config.build_client()?,
            endpoint: config.endpoint(),
            config,
        })
    }

    pub fn config(&self) -> &HttpBoundaryConfig {
        &self.config
    }
}

#[async_trait]
impl ExtractionService for CompletionExtractionClient {
    fn name(&self) -> &str {
        "completion_extraction"
    }

    async fn extract(&self, request: &ExtractionRequest) -> Result<ExtractedRecord, BoundaryError> {
        let chat = extraction_request(&self.config, request);
        let content = post_chat(
            &self.http,
            &self.endpoint,
            self.config.api_key.as_deref(),
            &chat,
        )
        .await?;
        parse_extraction_content(&content)
    }
}
