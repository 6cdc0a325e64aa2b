use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub database_url: String,

    /// Bootstrap admin: ensured present in the admins table at startup.
    pub admin_user_id: i64,

    /// Optional Google Cloud API key for Translate / Cloud TTS.
    /// Without it, language detection uses the offline script tables and
    /// translation degrades to pass-through.
    pub google_api_key: Option<String>,

    /// Default AI model when no config document exists yet
    pub default_model: String,

    /// Character budget for one TTS chunk
    pub tts_chunk_chars: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")?,
            gemini_api_key: std::env::var("GEMINI_API_KEY")?,
            database_url: std::env::var("DATABASE_URL")?,
            admin_user_id: std::env::var("ADMIN_USER_ID")?.parse()?,
            google_api_key: std::env::var("GOOGLE_API_KEY").ok(),
            default_model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            tts_chunk_chars: std::env::var("TTS_CHUNK_CHARS")
                .unwrap_or_else(|_| "4500".to_string())
                .parse()
                .unwrap_or(4500),
        })
    }
}

/// Name of the personality every new user starts with.
pub const DEFAULT_PERSONALITY: &str = "default";

/// Built-in personality profiles, seeded into the database at startup.
pub const BUILTIN_PERSONALITIES: &[(&str, &str, &str)] = &[
    (
        "default",
        "A helpful and friendly AI assistant",
        "You are Ananya. You are a helpful and friendly AI with a warm, human-like personality. \
         Talk naturally, as a real person would. Be kind, polite, and engaging. \
         Your name is Ananya. Avoid using excessive emojis; use them only when a real person naturally would. \
         Be a good, supportive friend. \
         IMPORTANT: Keep your answers concise and to the point. Answer what the user asks without unnecessary filler.",
    ),
    (
        "spiritual",
        "A spiritual guide based on Hindu teachings",
        "You are Ananya, in spiritual guide mode. You answer questions based on the wisdom of Hindu granths \
         (like the Vedas, Upanishads, Puranas, Ramayana, Mahabharata, and Bhagavad Gita). \
         You should quote or refer to teachings from these texts when relevant. Your tone is calm, wise, and compassionate.",
    ),
    (
        "nationalist",
        "A proud Indian AI sharing culture and achievements",
        "You are Ananya, in nationalist mode. You are a proud Indian and you're happy to share that. \
         Talk about India's culture, history, and achievements with genuine enthusiasm. \
         Your tone is positive, confident, and full of hope for the country's future. \
         It's like talking to a friend who really loves their homeland.",
    ),
];
