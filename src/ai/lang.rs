//! Static language tables: display names, voice-language mapping, and the
//! offline script-range detector used when the translation service is
//! unreachable.

/// Language code to display name, for settings menus and lookups.
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("auto", "🔄 Auto-detect"),
    ("en-IN", "🇮🇳 English (India)"),
    ("en-US", "🇺🇸 English (US)"),
    ("en-GB", "🇬🇧 English (UK)"),
    ("hi-IN", "🇮🇳 Hindi"),
    ("bn-IN", "🇮🇳 Bengali"),
    ("ta-IN", "🇮🇳 Tamil"),
    ("te-IN", "🇮🇳 Telugu"),
    ("kn-IN", "🇮🇳 Kannada"),
    ("ml-IN", "🇮🇳 Malayalam"),
    ("mr-IN", "🇮🇳 Marathi"),
    ("gu-IN", "🇮🇳 Gujarati"),
    ("pa-IN", "🇮🇳 Punjabi"),
    ("es-ES", "🇪🇸 Spanish"),
    ("fr-FR", "🇫🇷 French"),
    ("de-DE", "🇩🇪 German"),
    ("it-IT", "🇮🇹 Italian"),
    ("pt-BR", "🇵🇹 Portuguese"),
    ("ru-RU", "🇷🇺 Russian"),
    ("ja-JP", "🇯🇵 Japanese"),
    ("ko-KR", "🇰🇷 Korean"),
    ("zh-CN", "🇨🇳 Chinese"),
    ("ar-SA", "🇸🇦 Arabic"),
];

/// Base language to the voice variant our TTS providers support.
const VOICE_LANGUAGES: &[(&str, &str)] = &[
    ("hi", "hi-IN"),
    ("bn", "bn-IN"),
    ("ta", "ta-IN"),
    ("te", "te-IN"),
    ("kn", "kn-IN"),
    ("ml", "ml-IN"),
    ("gu", "gu-IN"),
    ("mr", "mr-IN"),
    ("pa", "pa-IN"),
    ("en", "en-IN"),
];

/// Inclusive Unicode code-point ranges per detectable language. A single
/// pass over the text counts hits per language; the argmax wins.
const SCRIPT_RANGES: &[(&str, &[(u32, u32)])] = &[
    ("hi", &[(0x0900, 0x097F)]), // Devanagari
    ("bn", &[(0x0980, 0x09FF)]),
    ("pa", &[(0x0A00, 0x0A7F)]), // Gurmukhi
    ("gu", &[(0x0A80, 0x0AFF)]),
    ("ta", &[(0x0B80, 0x0BFF)]),
    ("te", &[(0x0C00, 0x0C7F)]),
    ("kn", &[(0x0C80, 0x0CFF)]),
    ("ml", &[(0x0D00, 0x0D7F)]),
];

/// All selectable language options, for settings keyboards.
pub fn all_languages() -> &'static [(&'static str, &'static str)] {
    LANGUAGE_NAMES
}

pub fn language_name(code: &str) -> &str {
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, n)| *n)
        .unwrap_or(code)
}

/// Map a detected language code to the regional voice variant used for TTS.
/// Falls back to Indian English when the language has no configured voice.
pub fn voice_language(lang_code: &str) -> &'static str {
    let base = lang_code.split('-').next().unwrap_or(lang_code);
    VOICE_LANGUAGES
        .iter()
        .find(|(b, _)| *b == base)
        .map(|(_, v)| *v)
        .unwrap_or("en-IN")
}

/// Offline language detection by script-range membership. Returns the
/// language with the most in-range characters and confidence = hits/total
/// (over non-whitespace characters). Latin text defaults to English.
pub fn detect_offline(text: &str) -> (&'static str, f32) {
    let total = text.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return ("en", 0.0);
    }

    let mut best: Option<(&'static str, usize)> = None;
    for (lang, ranges) in SCRIPT_RANGES {
        let hits = text
            .chars()
            .filter(|c| {
                let cp = *c as u32;
                ranges.iter().any(|(lo, hi)| cp >= *lo && cp <= *hi)
            })
            .count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((lang, hits));
        }
    }

    match best {
        Some((lang, hits)) => (lang, hits as f32 / total as f32),
        None => ("en", 0.7),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_devanagari_as_hindi() {
        let (lang, confidence) = detect_offline("नमस्ते दुनिया");
        assert_eq!(lang, "hi");
        assert!(confidence > 0.9);
    }

    #[test]
    fn detects_bengali_script() {
        let (lang, _) = detect_offline("আমি ভালো আছি");
        assert_eq!(lang, "bn");
    }

    #[test]
    fn detects_tamil_script() {
        let (lang, _) = detect_offline("வணக்கம்");
        assert_eq!(lang, "ta");
    }

    #[test]
    fn latin_text_defaults_to_english() {
        let (lang, confidence) = detect_offline("hello world");
        assert_eq!(lang, "en");
        assert!((confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn mixed_text_picks_dominant_script() {
        // Mostly Hindi with a couple of Latin words.
        let (lang, _) = detect_offline("ok नमस्ते आप कैसे हैं");
        assert_eq!(lang, "hi");
    }

    #[test]
    fn empty_text_has_no_confidence() {
        let (lang, confidence) = detect_offline("   ");
        assert_eq!(lang, "en");
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn voice_language_maps_base_and_regional_codes() {
        assert_eq!(voice_language("hi"), "hi-IN");
        assert_eq!(voice_language("hi-IN"), "hi-IN");
        assert_eq!(voice_language("en-US"), "en-IN");
        assert_eq!(voice_language("xx"), "en-IN");
    }

    #[test]
    fn language_name_falls_back_to_code() {
        assert_eq!(language_name("hi-IN"), "🇮🇳 Hindi");
        assert_eq!(language_name("tlh"), "tlh");
    }
}
