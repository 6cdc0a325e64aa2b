use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

/// Text-to-speech over an ordered provider fallback chain: the keyless
/// Google Translate TTS endpoint first, then Cloud TTS when a key is
/// configured. Returns None when every provider fails; callers degrade to
/// text-only replies.
pub struct TtsManager {
    client: Client,
    cloud_api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudTtsResponse {
    #[serde(rename = "audioContent")]
    audio_content: String,
}

impl TtsManager {
    pub fn new(cloud_api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            cloud_api_key,
        }
    }

    /// Synthesize one speech-safe chunk of text.
    pub async fn text_to_speech(&self, text: &str, target_lang: &str) -> Option<Vec<u8>> {
        if text.trim().is_empty() {
            tracing::warn!("Empty text provided for TTS");
            return None;
        }

        match self.gtts(text, target_lang).await {
            Ok(audio) => return Some(audio),
            Err(e) => tracing::warn!("Translate TTS failed: {e}"),
        }

        if self.cloud_api_key.is_some() {
            match self.cloud_tts(text, target_lang).await {
                Ok(audio) => return Some(audio),
                Err(e) => tracing::warn!("Cloud TTS failed: {e}"),
            }
        }

        tracing::error!("All TTS providers failed for lang {target_lang}");
        None
    }

    /// Keyless Google Translate TTS. Uses 2-letter language codes.
    async fn gtts(&self, text: &str, target_lang: &str) -> anyhow::Result<Vec<u8>> {
        let lang2 = target_lang.split('-').next().unwrap_or("en");

        let resp = self
            .client
            .get("https://translate.google.com/translate_tts")
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", lang2),
                ("q", text),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("Translate TTS error: {}", resp.status());
        }

        let audio = resp.bytes().await?.to_vec();
        if audio.is_empty() {
            anyhow::bail!("Translate TTS returned empty audio");
        }
        Ok(audio)
    }

    /// Google Cloud TTS REST API. Audio comes back base64-encoded.
    async fn cloud_tts(&self, text: &str, target_lang: &str) -> anyhow::Result<Vec<u8>> {
        let key = self
            .cloud_api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No Cloud TTS key configured"))?;

        let resp = self
            .client
            .post("https://texttospeech.googleapis.com/v1/text:synthesize")
            .query(&[("key", key)])
            .json(&serde_json::json!({
                "input": { "text": text },
                "voice": {
                    "languageCode": target_lang,
                    "ssmlGender": "FEMALE",
                },
                "audioConfig": {
                    "audioEncoding": "MP3",
                    "speakingRate": 0.9,
                },
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Cloud TTS error ({status}): {body}");
        }

        let body: CloudTtsResponse = resp.json().await?;
        let audio = base64::engine::general_purpose::STANDARD.decode(body.audio_content)?;
        Ok(audio)
    }
}

/// Split long text into speech-safe chunks: greedy sentence packing under
/// `max_chars`. A single overlong sentence becomes its own chunk rather
/// than being dropped.
pub fn split_long_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for sentence in text.split(". ") {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        // The split ate the full stop; restore it unless the fragment
        // already ends with terminal punctuation.
        let stop = if sentence.ends_with(['.', '!', '?']) {
            ""
        } else {
            "."
        };
        let sentence_chars = sentence.chars().count() + stop.len() + 1;
        if !current.is_empty() && current_chars + sentence_chars > max_chars {
            chunks.push(current.trim_end().to_string());
            current.clear();
            current_chars = 0;
        }
        current.push_str(sentence);
        current.push_str(stop);
        current.push(' ');
        current_chars += sentence_chars;
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_long_text("Hello there. How are you?", 100);
        assert_eq!(chunks, vec!["Hello there. How are you?"]);
    }

    #[test]
    fn terminal_punctuation_is_not_doubled() {
        assert_eq!(split_long_text("How are you?", 100), vec!["How are you?"]);
        assert_eq!(split_long_text("Great news!", 100), vec!["Great news!"]);
        // A fragment that lost its full stop to the split gets it back.
        assert_eq!(
            split_long_text("First part. Second part", 100),
            vec!["First part. Second part."]
        );
    }

    #[test]
    fn packs_sentences_greedily_under_budget() {
        let text = "One two three. Four five six. Seven eight nine.";
        let chunks = split_long_text(text, 32);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() <= 32));
        assert!(chunks[0].contains("One two three"));
        assert!(chunks[0].contains("Four five six"));
        assert!(chunks[1].contains("Seven eight nine"));
    }

    #[test]
    fn overlong_sentence_still_emitted() {
        let text = "a".repeat(50);
        let chunks = split_long_text(&text, 20);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_long_text("", 100).is_empty());
        assert!(split_long_text("   ", 100).is_empty());
    }
}
