pub mod cache;
pub mod models;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ai::gemini::AiConfig;
use models::{AdminEntry, BotStats, BroadcastRecord, ChatRecord, LanguagePrefs, Personality, User};

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        // Each CREATE TABLE must be a separate query (Postgres doesn't allow
        // multiple commands in a single prepared statement).

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS users (
                user_id BIGINT PRIMARY KEY,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
                personality TEXT NOT NULL DEFAULT 'default',
                available_personalities JSONB NOT NULL DEFAULT '[]',
                language_prefs JSONB NOT NULL DEFAULT '{"input":"auto","output":"auto","voice":"auto"}',
                audio_enabled BOOLEAN NOT NULL DEFAULT FALSE,
                total_messages BIGINT NOT NULL DEFAULT 0,
                active_days BIGINT NOT NULL DEFAULT 0,
                last_message_date DATE,
                joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_activity TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_settings_update TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS chats (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id BIGINT NOT NULL,
                user_message TEXT NOT NULL,
                bot_response TEXT NOT NULL,
                media_mime_types JSONB NOT NULL DEFAULT '[]',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS admins (
                user_id BIGINT PRIMARY KEY,
                added_by BIGINT,
                added_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS personalities (
                name TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                prompt TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS broadcasts (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                message TEXT NOT NULL,
                sender_id BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                total_users BIGINT NOT NULL DEFAULT 0,
                sent_to JSONB NOT NULL DEFAULT '[]',
                success_count BIGINT NOT NULL DEFAULT 0,
                fail_count BIGINT NOT NULL DEFAULT 0,
                media_type TEXT,
                file_name TEXT
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS ai_config (
                id INT PRIMARY KEY CHECK (id = 1),
                config JSONB NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS web_credentials (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id, created_at)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_activity ON users(last_activity DESC)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ── User Operations ────────────────────────────────────────────

    /// Upsert a user record from Telegram sender info. A first contact
    /// creates the default record (unblocked, default personality, all
    /// language prefs "auto"); later contacts refresh names and activity.
    pub async fn get_or_create_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                username = COALESCE($2, users.username),
                first_name = COALESCE($3, users.first_name),
                last_name = COALESCE($4, users.last_name),
                last_activity = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_username(&self, username: &str) -> anyhow::Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE LOWER(username) = LOWER($1)")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    pub async fn set_blocked(&self, user_id: i64, blocked: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE users SET is_blocked = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(blocked)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_personality(&self, user_id: i64, personality: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET personality = $2, last_settings_update = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(personality)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_language_prefs(
        &self,
        user_id: i64,
        prefs: &LanguagePrefs,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET language_prefs = $2, last_settings_update = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(Json(prefs))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_audio_enabled(&self, user_id: i64, enabled: bool) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET audio_enabled = $2, last_settings_update = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(enabled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Refresh activity counters for one message turn. Active-day counting
    /// rolls over when the calendar date changes.
    pub async fn bump_activity(&self, user_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                last_activity = NOW(),
                total_messages = total_messages + 1,
                active_days = active_days
                    + CASE WHEN last_message_date IS DISTINCT FROM CURRENT_DATE THEN 1 ELSE 0 END,
                last_message_date = CURRENT_DATE
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn active_user_ids(&self) -> anyhow::Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM users WHERE is_blocked = FALSE")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    pub async fn count_active_since(&self, since: DateTime<Utc>) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE last_activity >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ── Chat History ───────────────────────────────────────────────

    pub async fn save_chat_history(
        &self,
        user_id: i64,
        user_message: &str,
        bot_response: &str,
        media_mime_types: &[String],
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (user_id, user_message, bot_response, media_mime_types)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(user_message)
        .bind(bot_response)
        .bind(Json(media_mime_types))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_recent_chats(&self, user_id: i64, limit: i64) -> anyhow::Result<Vec<ChatRecord>> {
        let rows = sqlx::query_as::<_, ChatRecord>(
            "SELECT * FROM chats WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_chats(&self, user_id: i64) -> anyhow::Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    // ── Admin Directory ────────────────────────────────────────────

    pub async fn is_admin(&self, user_id: i64) -> anyhow::Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM admins WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn add_admin(&self, user_id: i64, added_by: Option<i64>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "INSERT INTO admins (user_id, added_by) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(added_by)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove_admin(&self, user_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM admins WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_admins(&self) -> anyhow::Result<Vec<AdminEntry>> {
        let admins = sqlx::query_as::<_, AdminEntry>("SELECT * FROM admins ORDER BY added_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(admins)
    }

    // ── Personality Registry ───────────────────────────────────────

    /// Insert a personality profile. Returns false when the (normalized)
    /// name already exists.
    pub async fn insert_personality(
        &self,
        name: &str,
        description: &str,
        prompt: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO personalities (name, description, prompt)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(prompt)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete: removal deactivates rather than dropping the row, so
    /// user lists that still reference the name stay resolvable.
    pub async fn deactivate_personality(&self, name: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE personalities SET is_active = FALSE, updated_at = NOW() WHERE name = $1 AND is_active",
        )
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_personality(
        &self,
        name: &str,
        description: &str,
        prompt: Option<&str>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE personalities
            SET description = $2, prompt = COALESCE($3, prompt), updated_at = NOW()
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(prompt)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_active_personalities(&self) -> anyhow::Result<Vec<Personality>> {
        let rows = sqlx::query_as::<_, Personality>(
            "SELECT * FROM personalities WHERE is_active ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_all_personalities(&self) -> anyhow::Result<Vec<Personality>> {
        let rows =
            sqlx::query_as::<_, Personality>("SELECT * FROM personalities ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn get_personality_prompt(&self, name: &str) -> anyhow::Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT prompt FROM personalities WHERE name = $1 AND is_active")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|r| r.0))
    }

    /// Append a personality name to every user's available list (snapshot
    /// copy, not a live reference). Returns the number of users updated.
    pub async fn add_personality_to_all_users(&self, name: &str) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET available_personalities = available_personalities || to_jsonb($1::text)
            WHERE NOT available_personalities @> to_jsonb($1::text)
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ── Broadcast Records ──────────────────────────────────────────

    /// Create the broadcast record before fan-out begins (zero counts mark
    /// an attempt that started).
    pub async fn create_broadcast(
        &self,
        message: &str,
        sender_id: i64,
        total_users: i64,
        media_type: Option<&str>,
        file_name: Option<&str>,
    ) -> anyhow::Result<Uuid> {
        let row: (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO broadcasts (message, sender_id, total_users, media_type, file_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(message)
        .bind(sender_id)
        .bind(total_users)
        .bind(media_type)
        .bind(file_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    pub async fn finalize_broadcast(
        &self,
        id: Uuid,
        success_count: i64,
        fail_count: i64,
        sent_to: &[i64],
    ) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE broadcasts SET success_count = $2, fail_count = $3, sent_to = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(success_count)
        .bind(fail_count)
        .bind(Json(sent_to))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_recent_broadcasts(&self, limit: i64) -> anyhow::Result<Vec<BroadcastRecord>> {
        let rows = sqlx::query_as::<_, BroadcastRecord>(
            "SELECT * FROM broadcasts ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ── AI Config ──────────────────────────────────────────────────

    /// Load the persisted AI configuration, falling back to defaults when
    /// no document exists or the stored one fails to parse.
    pub async fn get_ai_config(&self, default_model: &str) -> anyhow::Result<AiConfig> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT config FROM ai_config WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((value,)) => serde_json::from_value(value)
                .unwrap_or_else(|_| AiConfig::with_model(default_model)),
            None => AiConfig::with_model(default_model),
        })
    }

    // ── Web Credentials ────────────────────────────────────────────

    pub async fn upsert_credentials(
        &self,
        username: &str,
        password_hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO web_credentials (username, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (username) DO UPDATE SET password_hash = $2, updated_at = NOW()
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_credentials(&self, username: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM web_credentials WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_credential_usernames(&self) -> anyhow::Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT username FROM web_credentials ORDER BY username")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    // ── Statistics ─────────────────────────────────────────────────

    pub async fn get_stats(&self) -> anyhow::Result<BotStats> {
        let users: (i64, i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE NOT is_blocked),
                COUNT(*) FILTER (WHERE is_blocked),
                COUNT(*) FILTER (WHERE last_activity >= NOW() - INTERVAL '24 hours'),
                COUNT(*) FILTER (WHERE last_activity >= NOW() - INTERVAL '7 days'),
                COALESCE(SUM(total_messages), 0)
            FROM users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let admins: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
            .fetch_one(&self.pool)
            .await?;
        let personalities: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM personalities WHERE is_active")
                .fetch_one(&self.pool)
                .await?;
        let broadcasts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM broadcasts")
            .fetch_one(&self.pool)
            .await?;

        Ok(BotStats {
            total_users: users.0,
            active_users: users.1,
            blocked_users: users.2,
            active_24h: users.3,
            active_7d: users.4,
            total_messages: users.5,
            admin_count: admins.0,
            personality_count: personalities.0,
            broadcast_count: broadcasts.0,
        })
    }
}
