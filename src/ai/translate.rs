use reqwest::Client;
use serde::Deserialize;

use crate::ai::lang;

#[derive(Debug, Deserialize)]
struct DetectResponse {
    data: DetectData,
}

#[derive(Debug, Deserialize)]
struct DetectData {
    detections: Vec<Vec<Detection>>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Client for the Google Translate v2 REST API with an offline heuristic
/// fallback. Translation never fails the caller: on any error the original
/// text comes back unchanged.
pub struct Translator {
    client: Client,
    api_key: Option<String>,
}

impl Translator {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    /// Detect the language of `text`. Tries the network service first and
    /// falls back to script-range matching when unavailable.
    pub async fn detect_language(&self, text: &str) -> (String, f32) {
        if let Some(key) = &self.api_key {
            match self.detect_remote(key, text).await {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!("Remote language detection failed: {e}");
                }
            }
        }
        let (lang, confidence) = lang::detect_offline(text);
        (lang.to_string(), confidence)
    }

    async fn detect_remote(&self, key: &str, text: &str) -> anyhow::Result<(String, f32)> {
        let resp = self
            .client
            .post("https://translation.googleapis.com/language/translate/v2/detect")
            .query(&[("key", key)])
            .json(&serde_json::json!({ "q": text }))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("Translate detect error: {}", resp.status());
        }

        let body: DetectResponse = resp.json().await?;
        let detection = body
            .data
            .detections
            .first()
            .and_then(|d| d.first())
            .ok_or_else(|| anyhow::anyhow!("Empty detection result"))?;

        Ok((detection.language.clone(), detection.confidence))
    }

    /// Translate `text` into `target_language`. A target of "auto", a
    /// matching source language, or any service failure returns the
    /// original text.
    pub async fn translate(
        &self,
        text: &str,
        target_language: &str,
        source_language: Option<&str>,
    ) -> String {
        if target_language == "auto" || target_language.is_empty() || text.is_empty() {
            return text.to_string();
        }

        let source = match source_language {
            Some(s) => s.to_string(),
            None => self.detect_language(text).await.0,
        };

        // Compare base languages so "hi" and "hi-IN" don't trigger a no-op call.
        if base(&source) == base(target_language) {
            return text.to_string();
        }

        let key = match &self.api_key {
            Some(k) => k,
            None => {
                tracing::warn!("No translation key configured, keeping original text");
                return text.to_string();
            }
        };

        match self
            .translate_remote(key, text, target_language, &source)
            .await
        {
            Ok(translated) => translated,
            Err(e) => {
                tracing::error!("Translation failed, keeping original text: {e}");
                text.to_string()
            }
        }
    }

    async fn translate_remote(
        &self,
        key: &str,
        text: &str,
        target: &str,
        source: &str,
    ) -> anyhow::Result<String> {
        let resp = self
            .client
            .post("https://translation.googleapis.com/language/translate/v2")
            .query(&[("key", key)])
            .json(&serde_json::json!({
                "q": text,
                "target": base(target),
                "source": base(source),
                "format": "text",
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Translate error ({status}): {body}");
        }

        let body: TranslateResponse = resp.json().await?;
        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| anyhow::anyhow!("Empty translation result"))
    }
}

fn base(code: &str) -> &str {
    code.split('-').next().unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_target_is_a_passthrough() {
        let t = Translator::new(None);
        assert_eq!(t.translate("hello", "auto", None).await, "hello");
    }

    #[tokio::test]
    async fn same_base_language_is_a_passthrough() {
        let t = Translator::new(None);
        assert_eq!(t.translate("hello", "en-IN", Some("en")).await, "hello");
    }

    #[tokio::test]
    async fn missing_key_keeps_original_text() {
        let t = Translator::new(None);
        assert_eq!(t.translate("नमस्ते", "en-IN", None).await, "नमस्ते");
    }

    #[tokio::test]
    async fn offline_detection_backs_the_detector() {
        let t = Translator::new(None);
        let (lang, _) = t.detect_language("नमस्ते दुनिया").await;
        assert_eq!(lang, "hi");
    }
}
