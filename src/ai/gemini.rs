use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Model names the configuration is allowed to select. An unknown
/// configured name falls back to the first entry.
pub const AVAILABLE_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiFeatures {
    #[serde(default)]
    pub search: bool,
    #[serde(default)]
    pub vision: bool,
    #[serde(default)]
    pub audio: bool,
}

/// Per-category safety block levels, persisted as part of the AI config
/// document. Values mirror the service's enumerated levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "block_medium")]
    pub harassment: String,
    #[serde(default = "block_medium", rename = "hateSpeech")]
    pub hate_speech: String,
    #[serde(default = "block_medium", rename = "sexuallyExplicit")]
    pub sexually_explicit: String,
    #[serde(default = "block_medium", rename = "dangerousContent")]
    pub dangerous_content: String,
}

fn block_medium() -> String {
    "BLOCK_MEDIUM".to_string()
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            harassment: block_medium(),
            hate_speech: block_medium(),
            sexually_explicit: block_medium(),
            dangerous_content: block_medium(),
        }
    }
}

/// The persisted AI configuration document (ai_config table, single row).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub features: AiFeatures,
    #[serde(default)]
    pub safety: SafetyConfig,
}

fn default_temperature() -> f32 {
    0.7
}

impl AiConfig {
    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            temperature: default_temperature(),
            features: AiFeatures::default(),
            safety: SafetyConfig::default(),
        }
    }

    /// Resolve the configured model against the allow-list.
    pub fn resolved_model(&self) -> &str {
        if AVAILABLE_MODELS.contains(&self.model.as_str()) {
            &self.model
        } else {
            AVAILABLE_MODELS[0]
        }
    }
}

/// One extracted attachment, forwarded to the model as inline data.
#[derive(Debug, Clone)]
pub struct MediaPart {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A model reply: text for normal models, raw audio bytes when the model
/// answered with an inline audio part.
#[derive(Debug, Clone)]
pub enum GeminiReply {
    Text(String),
    Audio(Vec<u8>),
}

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Client for the Gemini generateContent REST API.
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
        }
    }

    /// Ask the model for a reply to one user turn. The personality prompt
    /// rides along as the system instruction; media parts are inlined
    /// base64 next to the text.
    pub async fn get_response(
        &self,
        prompt: &str,
        personality_prompt: &str,
        media_parts: &[MediaPart],
        config: &AiConfig,
    ) -> anyhow::Result<GeminiReply> {
        let system_instruction = format!(
            "You are Ananya, a helpful and friendly AI with a warm, human-like personality.\n\n\
             {personality_prompt}\n\n\
             Guidelines:\n\
             - Be helpful, friendly, and engaging\n\
             - Talk naturally, as a real person would\n\
             - Keep answers concise and to the point\n\
             - Answer what the user asks without unnecessary filler\n\
             - If you use Google Search results, cite your sources clearly"
        );

        let mut parts: Vec<Part> = media_parts
            .iter()
            .map(|m| Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: m.mime_type.clone(),
                    data: base64::engine::general_purpose::STANDARD.encode(&m.data),
                }),
            })
            .collect();
        parts.push(Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        });

        let mut tools = Vec::new();
        if config.features.search {
            tools.push(Tool {
                google_search: serde_json::json!({}),
            });
        }

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(system_instruction),
                    inline_data: None,
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 4096,
            },
            safety_settings: vec![
                SafetySetting {
                    category: "HARM_CATEGORY_HARASSMENT",
                    threshold: api_threshold(&config.safety.harassment),
                },
                SafetySetting {
                    category: "HARM_CATEGORY_HATE_SPEECH",
                    threshold: api_threshold(&config.safety.hate_speech),
                },
                SafetySetting {
                    category: "HARM_CATEGORY_SEXUALLY_EXPLICIT",
                    threshold: api_threshold(&config.safety.sexually_explicit),
                },
                SafetySetting {
                    category: "HARM_CATEGORY_DANGEROUS_CONTENT",
                    threshold: api_threshold(&config.safety.dangerous_content),
                },
            ],
            tools,
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            config.resolved_model()
        );

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({status}): {body}");
        }

        let body: GenerateResponse = resp.json().await?;

        let mut text = String::new();
        for candidate in body.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                if let Some(t) = part.text {
                    text.push_str(&t);
                } else if let Some(inline) = part.inline_data {
                    let audio =
                        base64::engine::general_purpose::STANDARD.decode(inline.data)?;
                    return Ok(GeminiReply::Audio(audio));
                }
            }
        }

        if text.is_empty() {
            anyhow::bail!("Gemini returned no content");
        }
        Ok(GeminiReply::Text(text))
    }
}

/// Map a stored block level to the API's threshold enumeration.
fn api_threshold(level: &str) -> String {
    match level {
        "BLOCK_NONE" => "BLOCK_NONE",
        "BLOCK_LOW" => "BLOCK_LOW_AND_ABOVE",
        "BLOCK_HIGH" => "BLOCK_ONLY_HIGH",
        _ => "BLOCK_MEDIUM_AND_ABOVE",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_model_resolves_to_default() {
        let config = AiConfig::with_model("gemini-9000-ultra");
        assert_eq!(config.resolved_model(), "gemini-2.5-flash");
    }

    #[test]
    fn allow_listed_model_is_kept() {
        let config = AiConfig::with_model("gemini-2.5-pro");
        assert_eq!(config.resolved_model(), "gemini-2.5-pro");
    }

    #[test]
    fn config_document_parses_with_partial_fields() {
        let doc = serde_json::json!({
            "model": "gemini-2.0-flash",
            "safety": { "harassment": "BLOCK_HIGH" },
        });
        let config: AiConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.safety.harassment, "BLOCK_HIGH");
        assert_eq!(config.safety.hate_speech, "BLOCK_MEDIUM");
        assert!(!config.features.search);
    }

    #[test]
    fn thresholds_map_to_api_enumeration() {
        assert_eq!(api_threshold("BLOCK_NONE"), "BLOCK_NONE");
        assert_eq!(api_threshold("BLOCK_LOW"), "BLOCK_LOW_AND_ABOVE");
        assert_eq!(api_threshold("BLOCK_MEDIUM"), "BLOCK_MEDIUM_AND_ABOVE");
        assert_eq!(api_threshold("BLOCK_HIGH"), "BLOCK_ONLY_HIGH");
        assert_eq!(api_threshold("whatever"), "BLOCK_MEDIUM_AND_ABOVE");
    }
}
