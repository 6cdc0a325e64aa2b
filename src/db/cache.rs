use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::models::User;

/// How long a cached user record stays fresh.
const CACHE_EXPIRY_SECS: i64 = 300;

/// In-process read cache for user records. Entries expire after five
/// minutes and are invalidated eagerly on any settings write, so menus
/// always render freshly persisted values.
#[derive(Debug, Default)]
pub struct UserCache {
    entries: Mutex<HashMap<i64, (User, DateTime<Utc>)>>,
}

impl UserCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: i64) -> Option<User> {
        self.get_at(user_id, Utc::now())
    }

    fn get_at(&self, user_id: i64, now: DateTime<Utc>) -> Option<User> {
        let entries = self.entries.lock().unwrap();
        match entries.get(&user_id) {
            Some((user, cached_at))
                if now - *cached_at < Duration::seconds(CACHE_EXPIRY_SECS) =>
            {
                Some(user.clone())
            }
            _ => None,
        }
    }

    pub fn insert(&self, user: User) {
        self.insert_at(user, Utc::now());
    }

    fn insert_at(&self, user: User, now: DateTime<Utc>) {
        self.entries
            .lock()
            .unwrap()
            .insert(user.user_id, (user, now));
    }

    pub fn invalidate(&self, user_id: i64) {
        self.entries.lock().unwrap().remove(&user_id);
    }

    /// Drop expired entries. Called from the periodic background sweep.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, (_, cached_at)| now - *cached_at < Duration::seconds(CACHE_EXPIRY_SECS));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn user(id: i64) -> User {
        let now = Utc::now();
        User {
            user_id: id,
            username: None,
            first_name: None,
            last_name: None,
            is_blocked: false,
            personality: "default".to_string(),
            available_personalities: Json(vec![]),
            language_prefs: Json(Default::default()),
            audio_enabled: false,
            total_messages: 0,
            active_days: 0,
            last_message_date: None,
            joined_at: now,
            last_activity: now,
            last_settings_update: now,
        }
    }

    #[test]
    fn fresh_entry_is_returned() {
        let cache = UserCache::new();
        cache.insert(user(1));
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn stale_entry_is_a_miss() {
        let cache = UserCache::new();
        let now = Utc::now();
        cache.insert_at(user(1), now - Duration::seconds(CACHE_EXPIRY_SECS + 1));
        assert!(cache.get_at(1, now).is_none());
    }

    #[test]
    fn invalidate_forces_next_read_through() {
        let cache = UserCache::new();
        cache.insert(user(1));
        cache.invalidate(1);
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let cache = UserCache::new();
        let now = Utc::now();
        cache.insert_at(user(1), now - Duration::seconds(CACHE_EXPIRY_SECS + 10));
        cache.insert_at(user(2), now);
        assert_eq!(cache.sweep_at(now), 1);
        assert!(cache.get_at(2, now).is_some());
    }
}
