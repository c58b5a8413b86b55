//! Gemini `generateContent` advisory provider.

use std::time::Instant;

use async_trait::async_trait;
use safety_core::{Advisory, AdvisoryError, AdvisoryInput, AdvisoryProvider};
use tracing::debug;

use crate::config::GeminiConfig;

const SYSTEM_INSTRUCTION: &str = "You are the internal logic engine of a battery safety \
monitor. Zero emotion. Base every statement on the telemetry. Forecast damage directly and \
bluntly. No pleasantries, no filler.";

/// Remote advisory provider backed by a Gemini model.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    model: String,
    language: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub const NAME: &'static str = "gemini";

    pub fn new(config: &GeminiConfig) -> Result<Self, AdvisoryError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AdvisoryError::MissingApiKey(Self::NAME.to_string()))?;
        // The advisory service owns the deadline; no client-level timeout.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AdvisoryError::RequestFailed(e.to_string()))?;
        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            language: config.language.clone(),
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    pub fn prompt(&self, input: &AdvisoryInput) -> String {
        format!(
            "{}\nMISSION: Cold, data-driven safety forecast.\n\
             STYLE: Short. Critical. No filler.\n\
             FORECAST: Give the failure timing directly.\n\
             LANGUAGE: {}.",
            input.telemetry_line(),
            self.language
        )
    }

    /// Request body asking for a JSON object with the three advisory fields.
    pub fn request_body(&self, input: &AdvisoryInput) -> serde_json::Value {
        serde_json::json!({
            "systemInstruction": {
                "parts": [{ "text": SYSTEM_INSTRUCTION }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": self.prompt(input) }]
            }],
            "generationConfig": {
                "temperature": 0.2,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "riskLevel": {
                            "type": "STRING",
                            "description": "Short technical status."
                        },
                        "recommendation": {
                            "type": "STRING",
                            "description": "Direct order for the operator."
                        },
                        "prediction": {
                            "type": "STRING",
                            "description": "Time-based damage forecast."
                        }
                    },
                    "required": ["riskLevel", "recommendation", "prediction"]
                }
            }
        })
    }

    /// Extract the advisory from the first candidate's text part.
    pub fn parse_response(body: &serde_json::Value) -> Result<Advisory, AdvisoryError> {
        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| AdvisoryError::ParseError("response has no candidate text".into()))?;
        let text = strip_code_fence(text.trim());
        serde_json::from_str(text).map_err(|e| AdvisoryError::ParseError(e.to_string()))
    }
}

/// Some models wrap JSON in a markdown fence even when asked not to.
fn strip_code_fence(text: &str) -> &str {
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(text)
}

#[async_trait]
impl AdvisoryProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn advise(&self, input: &AdvisoryInput) -> Result<Advisory, AdvisoryError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(input))
            .send()
            .await
            .map_err(|e| AdvisoryError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdvisoryError::from_status(status.as_u16(), &body));
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdvisoryError::ParseError(e.to_string()))?;
        let advisory = Self::parse_response(&resp_json)?;

        debug!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Gemini advisory received"
        );
        Ok(advisory)
    }
}
