use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use teloxide::prelude::*;

/// Outer error boundary for handler dispatch. Every externally triggered
/// entry point funnels its failures here: the error is logged server-side
/// with a generated identifier, the user gets one short apology, and the
/// bootstrap admin gets a best-effort notification. Nothing propagates to
/// the transport layer.
pub struct ErrorReporter {
    admin_user_id: i64,
    counter: AtomicU64,
}

impl ErrorReporter {
    pub fn new(admin_user_id: i64) -> Self {
        Self {
            admin_user_id,
            counter: AtomicU64::new(0),
        }
    }

    fn next_error_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("ERR_{}_{n}", Utc::now().format("%Y%m%d_%H%M%S"))
    }

    /// Log an error with full context and tell the user something went
    /// wrong. Never returns an error itself.
    pub async fn report(
        &self,
        bot: &Bot,
        chat_id: ChatId,
        user_id: Option<i64>,
        origin: &str,
        error: &anyhow::Error,
    ) {
        let error_id = self.next_error_id();
        tracing::error!(%error_id, origin, ?user_id, "handler failed: {error:#}");

        let apology =
            "😔 Sorry, something went wrong. The administrator has been notified.";
        if let Err(e) = bot.send_message(chat_id, apology).await {
            tracing::warn!(%error_id, "could not deliver apology: {e}");
        }

        // Best-effort admin ping, skipped when the admin themselves hit the
        // error (they already saw the apology).
        if user_id != Some(self.admin_user_id) {
            let note = format!(
                "⚠️ Error {error_id}\nOrigin: {origin}\nUser: {}\n{error}",
                user_id.map_or_else(|| "unknown".to_string(), |id| id.to_string()),
            );
            if let Err(e) = bot
                .send_message(ChatId(self.admin_user_id), note)
                .await
            {
                tracing::warn!(%error_id, "could not notify admin: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_ids_are_unique_and_monotonic() {
        let reporter = ErrorReporter::new(1);
        let a = reporter.next_error_id();
        let b = reporter.next_error_id();
        assert_ne!(a, b);
        assert!(a.starts_with("ERR_"));
        assert!(a.ends_with("_1"));
        assert!(b.ends_with("_2"));
    }
}
