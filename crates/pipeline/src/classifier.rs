//! Slide analysis through a multimodal chat model.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use deck_core::analysis::{self, SYSTEM_PROMPT};
use deck_core::{Error, ProcessingConfig, RenderedSlide, Result, SlideAnalysis};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Request timeout for one analysis call.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

const MAX_TOKENS: u32 = 3000;
const TEMPERATURE: f32 = 0.1;

/// Produces a structured analysis for one slide.
///
/// Calls are independent: no state is carried from one slide to the next.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn analyze(&self, slide: &RenderedSlide, raw_text: &str) -> Result<SlideAnalysis>;
}

/// Classifier backed by the OpenAI chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(config: &ProcessingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(ANALYSIS_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        })
    }

    fn request_body(&self, slide_index: usize, raw_text: &str, base64_image: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": analysis::user_prompt(slide_index, raw_text) },
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/jpeg;base64,{}", base64_image),
                                "detail": "high",
                            },
                        },
                    ],
                },
            ],
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
        })
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn analyze(&self, slide: &RenderedSlide, raw_text: &str) -> Result<SlideAnalysis> {
        let image = tokio::fs::read(&slide.path).await.map_err(|e| {
            Error::Analysis(format!("Failed to read {}: {}", slide.path.display(), e))
        })?;
        let body = self.request_body(slide.slide_index, raw_text, &BASE64.encode(image));

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Analysis(format!("Failed to send request to {}: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Analysis(format!("Failed to read response from {}: {}", url, e)))?;
        if !status.is_success() {
            return Err(Error::Analysis(format!(
                "Request failed with status {} from {}: {}",
                status, url, text
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Analysis(format!("Unexpected response body: {}", e)))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Analysis("Model reply had no content".into()))?;

        log::info!("GPT analysis for slide {} completed", slide.slide_index);
        analysis::parse_reply(&content, slide.slide_index)
    }
}
