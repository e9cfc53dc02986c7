use super::parse::{parse_model_json, truncate};
use super::{ListingAnalyst, ListingText, LlmSettings};
use crate::scanner::{
    ImageAnalysis, RedFlag, Severity, TextAnalysis, MAX_SCAM_SCORE, NEUTRAL_SCAM_SCORE,
};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const MAX_FIELD_CHARS: usize = 4000;

#[derive(Debug, Clone)]
pub struct OpenAiAnalyst {
    http: Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiAnalyst {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            bail!(
                "OpenAI API key must be provided via {}",
                LlmSettings::API_KEY_ENV
            );
        }
        let base = settings
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let url = format!("{}/v1/chat/completions", base.trim_end_matches('/'));
        let mut builder = Client::builder().user_agent(concat!(
            "listing-guard/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key: settings.api_key.clone(),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, payload: &ChatCompletionRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
            .context("failed to call OpenAI chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("OpenAI API error ({}): {}", status, truncate(&body, 500));
        }

        let chat: ChatCompletionResponse = response
            .json()
            .await
            .context("failed to parse OpenAI response")?;
        chat.choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| anyhow!("OpenAI response missing message content"))
    }
}

#[async_trait]
impl ListingAnalyst for OpenAiAnalyst {
    #[instrument(skip(self, listing), fields(model = %self.model))]
    async fn analyze_text(&self, listing: &ListingText) -> Result<TextAnalysis> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(TEXT_SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(text_prompt(listing)),
                },
            ],
            response_format: ResponseFormat::json_object(),
            max_tokens: None,
        };

        let content = self.complete(&payload).await?;
        let verdict: ModelTextVerdict =
            parse_model_json(&content).context("expected JSON listing analysis from OpenAI")?;
        debug!(
            score = ?verdict.scam_score,
            flags = verdict.red_flags.len(),
            "text analysis received"
        );
        Ok(verdict.into_analysis(&listing.title))
    }

    #[instrument(skip(self), fields(model = %self.model))]
    async fn analyze_image(&self, image_url: &str) -> Result<ImageAnalysis> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(IMAGE_SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: IMAGE_USER_PROMPT.to_string(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: image_url.to_string(),
                            },
                        },
                    ]),
                },
            ],
            response_format: ResponseFormat::json_object(),
            max_tokens: Some(1000),
        };

        let content = self.complete(&payload).await?;
        let verdict: ModelImageVerdict =
            parse_model_json(&content).context("expected JSON image analysis from OpenAI")?;
        debug!(
            stock = verdict.is_stock_image,
            elements = verdict.suspicious_elements.len(),
            "image analysis received"
        );
        Ok(verdict.into())
    }
}

const TEXT_SYSTEM_PROMPT: &str = "You are an expert in detecting online marketplace scams. \
    Analyze the listing and provide your assessment in the requested JSON format.";

const IMAGE_SYSTEM_PROMPT: &str = "You are an expert in detecting suspicious elements in \
    marketplace listing images. Analyze the image thoroughly and provide your assessment in JSON \
    format. Look for signs of stock photos, watermarks, image editing, inconsistencies, and other \
    red flags that might indicate a scam listing.";

const IMAGE_USER_PROMPT: &str = "Analyze this marketplace listing image for suspicious \
elements. Provide a detailed analysis in JSON format with these fields:

1. isStockImage (boolean): Is this likely a stock photo or professional product image \
not taken by the seller?
2. containsText (boolean): Does the image contain any text, watermarks, or overlays?
3. description (string): Detailed description of what you see in the image
4. suspiciousElements (array of strings): List any suspicious elements like:
   - Watermarks or stock photo indicators
   - Professional studio lighting inconsistent with personal sale
   - Multiple products in one image suggesting catalog photo
   - Image quality too high for typical marketplace photo
   - Background inconsistencies
   - Signs of image editing or manipulation
   - Generic product shots without personal context
   - Any other red flags

Be thorough in your analysis and err on the side of caution when identifying potential issues.";

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        truncate(trimmed, MAX_FIELD_CHARS)
    }
}

fn text_prompt(listing: &ListingText) -> String {
    format!(
        r#"Analyze this online marketplace listing for potential scam indicators:

Title: {title}
Description: {description}
Price: {price}
Seller Information: {seller}

Provide your analysis in the following JSON format:
{{
  "title": "The listing title",
  "scamScore": [0-100 likelihood of a scam, where 100 means definitely a scam],
  "analysis": "A detailed paragraph on why this listing looks like a scam or legitimate",
  "redFlags": [
    {{
      "severity": "high/medium/low",
      "description": "Description of the red flag"
    }}
  ]
}}

Focus on these common scam indicators:
1. Price too good to be true
2. Vague description lacking specific details
3. Poor grammar or spelling
4. Urgency language ("act fast", "won't last")
5. Unusual payment methods requested
6. New seller account
7. Generic stock photos
8. Requests to continue communication off-platform"#,
        title = or_placeholder(&listing.title, "Unknown title"),
        description = or_placeholder(&listing.description, "No description provided"),
        price = or_placeholder(&listing.price, "Unknown price"),
        seller = or_placeholder(&listing.seller_info, "No seller information"),
    )
}

/// Accepts `72`, `72.4`, or `"72"`; anything else yields `None`.
fn coerce_score(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    Some(number.round().clamp(0.0, f64::from(MAX_SCAM_SCORE)) as u8)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelTextVerdict {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    scam_score: Value,
    #[serde(default)]
    analysis: Option<String>,
    #[serde(default)]
    red_flags: Vec<ModelRedFlag>,
}

#[derive(Deserialize)]
struct ModelRedFlag {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
}

impl ModelTextVerdict {
    fn into_analysis(self, listing_title: &str) -> TextAnalysis {
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| listing_title.to_string());
        TextAnalysis {
            title,
            scam_score: coerce_score(&self.scam_score).unwrap_or(NEUTRAL_SCAM_SCORE),
            analysis: self
                .analysis
                .filter(|analysis| !analysis.trim().is_empty())
                .unwrap_or_else(|| "Analysis unavailable".to_string()),
            red_flags: self
                .red_flags
                .into_iter()
                .filter(|flag| !flag.description.trim().is_empty())
                .map(|flag| RedFlag::new(Severity::parse_lenient(&flag.severity), flag.description))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelImageVerdict {
    #[serde(default)]
    is_stock_image: bool,
    #[serde(default)]
    contains_text: bool,
    #[serde(default)]
    description: String,
    #[serde(default)]
    suspicious_elements: Vec<String>,
}

impl From<ModelImageVerdict> for ImageAnalysis {
    fn from(verdict: ModelImageVerdict) -> Self {
        Self {
            is_stock_image: verdict.is_stock_image,
            contains_text: verdict.contains_text,
            description: verdict.description,
            suspicious_elements: verdict
                .suspicious_elements
                .into_iter()
                .filter(|element| !element.trim().is_empty())
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl ResponseFormat {
    fn json_object() -> Self {
        Self {
            kind: "json_object",
        }
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
