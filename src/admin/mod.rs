//! Admin mutations shared by the bot's panel handlers: moderation,
//! admin-directory management, dashboard credentials, and stats rendering.

pub mod broadcast;
pub mod personality;

use sha2::{Digest, Sha256};

use crate::db::models::{BotStats, User};
use crate::db::Database;

/// How an admin referred to a user in a panel dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserTarget {
    Id(i64),
    Username(String),
}

/// Parse free text into a user target: all digits means a numeric id,
/// anything else is treated as a username (leading '@' stripped).
pub fn parse_user_target(input: &str) -> Option<UserTarget> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.chars().all(|c| c.is_ascii_digit()) {
        return input.parse::<i64>().ok().filter(|id| *id > 0).map(UserTarget::Id);
    }
    let name = input.strip_prefix('@').unwrap_or(input);
    if name.is_empty() {
        return None;
    }
    Some(UserTarget::Username(name.to_string()))
}

/// Resolve a target to a known user id, or None when nothing matches.
pub async fn resolve_user(db: &Database, input: &str) -> anyhow::Result<Option<i64>> {
    match parse_user_target(input) {
        Some(UserTarget::Id(id)) => Ok(db.get_user(id).await?.map(|u| u.user_id)),
        Some(UserTarget::Username(name)) => db.find_user_by_username(&name).await,
        None => Ok(None),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum BlockResult {
    Blocked,
    TargetIsAdmin,
    NotFound,
}

/// Block a user. Admins cannot be blocked; the check runs before any
/// mutation so a refused block leaves the flag untouched.
pub async fn block_user(db: &Database, target_id: i64) -> anyhow::Result<BlockResult> {
    if db.is_admin(target_id).await? {
        return Ok(BlockResult::TargetIsAdmin);
    }
    if db.set_blocked(target_id, true).await? {
        Ok(BlockResult::Blocked)
    } else {
        Ok(BlockResult::NotFound)
    }
}

pub async fn unblock_user(db: &Database, target_id: i64) -> anyhow::Result<bool> {
    db.set_blocked(target_id, false).await
}

/// Parse `username|password` credential input for the web dashboard.
pub fn parse_credentials(input: &str) -> Option<(String, String)> {
    let (username, password) = input.split_once('|')?;
    let username = username.trim();
    let password = password.trim();
    if username.len() < 3 || password.len() < 6 {
        return None;
    }
    Some((username.to_string(), password.to_string()))
}

pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn format_user_details(user: &User, chat_count: i64) -> String {
    let name = match (&user.first_name, &user.last_name) {
        (Some(f), Some(l)) => format!("{f} {l}"),
        (Some(f), None) => f.clone(),
        _ => "—".to_string(),
    };
    format!(
        "👤 User {id}\n\
         Name: {name}\n\
         Username: {username}\n\
         Blocked: {blocked}\n\
         Personality: {personality}\n\
         Audio replies: {audio}\n\
         Languages: in={input} out={output} voice={voice}\n\
         Messages: {messages} ({chats} stored chats)\n\
         Active days: {days}\n\
         Joined: {joined}",
        id = user.user_id,
        username = user
            .username
            .as_deref()
            .map_or_else(|| "—".to_string(), |u| format!("@{u}")),
        blocked = if user.is_blocked { "yes" } else { "no" },
        personality = user.personality,
        audio = if user.audio_enabled { "on" } else { "off" },
        input = user.language_prefs.input,
        output = user.language_prefs.output,
        voice = user.language_prefs.voice,
        messages = user.total_messages,
        chats = chat_count,
        days = user.active_days,
        joined = user.joined_at.format("%Y-%m-%d"),
    )
}

pub fn format_stats(stats: &BotStats) -> String {
    format!(
        "📊 Bot Statistics\n\n\
         Users: {total} total, {active} active, {blocked} blocked\n\
         Active last 24h: {d1}\n\
         Active last 7d: {d7}\n\
         Messages processed: {messages}\n\
         Admins: {admins}\n\
         Personalities: {personalities}\n\
         Broadcasts sent: {broadcasts}",
        total = stats.total_users,
        active = stats.active_users,
        blocked = stats.blocked_users,
        d1 = stats.active_24h,
        d7 = stats.active_7d,
        messages = stats.total_messages,
        admins = stats.admin_count,
        personalities = stats.personality_count,
        broadcasts = stats.broadcast_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_input_parses_as_id() {
        assert_eq!(parse_user_target("12345"), Some(UserTarget::Id(12345)));
        assert_eq!(parse_user_target(" 42 "), Some(UserTarget::Id(42)));
    }

    #[test]
    fn zero_and_empty_ids_are_rejected() {
        assert_eq!(parse_user_target("0"), None);
        assert_eq!(parse_user_target(""), None);
        assert_eq!(parse_user_target("   "), None);
        assert_eq!(parse_user_target("@"), None);
    }

    #[test]
    fn usernames_lose_their_at_prefix() {
        assert_eq!(
            parse_user_target("@ananya_fan"),
            Some(UserTarget::Username("ananya_fan".to_string()))
        );
        assert_eq!(
            parse_user_target("ananya_fan"),
            Some(UserTarget::Username("ananya_fan".to_string()))
        );
    }

    #[test]
    fn overflowing_numeric_input_is_rejected() {
        assert_eq!(parse_user_target("99999999999999999999999999"), None);
    }

    #[test]
    fn credentials_require_separator_and_lengths() {
        assert_eq!(
            parse_credentials("alice|hunter22"),
            Some(("alice".to_string(), "hunter22".to_string()))
        );
        assert_eq!(parse_credentials("alice hunter22"), None);
        assert_eq!(parse_credentials("al|hunter22"), None);
        assert_eq!(parse_credentials("alice|short"), None);
    }

    #[test]
    fn password_hash_is_stable_hex() {
        let h = hash_password("hunter22");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_password("hunter22"));
        assert_ne!(h, hash_password("hunter23"));
    }
}
