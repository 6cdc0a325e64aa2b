use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Per-user language preferences. "auto" means detect/don't translate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagePrefs {
    #[serde(default = "auto")]
    pub input: String,
    #[serde(default = "auto")]
    pub output: String,
    #[serde(default = "auto")]
    pub voice: String,
}

fn auto() -> String {
    "auto".to_string()
}

impl Default for LanguagePrefs {
    fn default() -> Self {
        Self {
            input: auto(),
            output: auto(),
            voice: auto(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_blocked: bool,
    pub personality: String,
    pub available_personalities: Json<Vec<String>>,
    pub language_prefs: Json<LanguagePrefs>,
    pub audio_enabled: bool,
    pub total_messages: i64,
    pub active_days: i64,
    pub last_message_date: Option<NaiveDate>,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_settings_update: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub media_mime_types: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminEntry {
    pub user_id: i64,
    pub added_by: Option<i64>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Personality {
    pub name: String,
    pub description: String,
    pub prompt: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub id: Uuid,
    pub message: String,
    pub sender_id: i64,
    pub created_at: DateTime<Utc>,
    pub total_users: i64,
    pub sent_to: Json<Vec<i64>>,
    pub success_count: i64,
    pub fail_count: i64,
    pub media_type: Option<String>,
    pub file_name: Option<String>,
}

/// Aggregate counters for /stats and the panel statistics button.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BotStats {
    pub total_users: i64,
    pub active_users: i64,
    pub blocked_users: i64,
    pub admin_count: i64,
    pub active_24h: i64,
    pub active_7d: i64,
    pub total_messages: i64,
    pub personality_count: i64,
    pub broadcast_count: i64,
}
