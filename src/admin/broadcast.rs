//! Broadcast fan-out: validate, snapshot recipients, record the attempt,
//! deliver sequentially, then finalize counts in one write.

use std::future::Future;

use crate::db::Database;

/// Upper bound on a broadcast message, matching the transport's text limit.
pub const MAX_BROADCAST_CHARS: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub success: bool,
    pub success_count: i64,
    pub fail_count: i64,
    pub error: Option<String>,
}

impl BroadcastOutcome {
    fn rejected(reason: &str) -> Self {
        Self {
            success: false,
            success_count: 0,
            fail_count: 0,
            error: Some(reason.to_string()),
        }
    }
}

pub fn validate_message(message: &str, sender_id: i64) -> Result<(), String> {
    if message.trim().is_empty() {
        return Err("Broadcast message cannot be empty".to_string());
    }
    if message.chars().count() > MAX_BROADCAST_CHARS {
        return Err(format!(
            "Broadcast message exceeds {MAX_BROADCAST_CHARS} characters"
        ));
    }
    if sender_id <= 0 {
        return Err("Invalid sender".to_string());
    }
    Ok(())
}

/// Deliver to each recipient in turn, counting per-recipient outcomes.
/// Returns (delivered ids, successes, failures).
pub async fn fan_out<F, Fut>(recipients: &[i64], send: F) -> (Vec<i64>, i64, i64)
where
    F: Fn(i64) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut sent_to = Vec::new();
    let mut success_count = 0;
    let mut fail_count = 0;

    for &user_id in recipients {
        match send(user_id).await {
            Ok(()) => {
                sent_to.push(user_id);
                success_count += 1;
            }
            Err(e) => {
                fail_count += 1;
                tracing::warn!("broadcast delivery to {user_id} failed: {e}");
            }
        }
    }

    (sent_to, success_count, fail_count)
}

/// Run one broadcast. The recipient set is a snapshot of non-blocked users
/// taken before any delivery; the persisted record is created before the
/// fan-out starts and finalized exactly once afterward.
pub async fn broadcast<F, Fut>(
    db: &Database,
    message: &str,
    sender_id: i64,
    media_type: Option<&str>,
    file_name: Option<&str>,
    send: F,
) -> anyhow::Result<BroadcastOutcome>
where
    F: Fn(i64) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    if let Err(reason) = validate_message(message, sender_id) {
        return Ok(BroadcastOutcome::rejected(&reason));
    }

    let recipients = db.active_user_ids().await?;
    let id = db
        .create_broadcast(
            message,
            sender_id,
            recipients.len() as i64,
            media_type,
            file_name,
        )
        .await?;

    tracing::info!("broadcast {id} starting: {} recipients", recipients.len());
    let (sent_to, success_count, fail_count) = fan_out(&recipients, send).await;

    db.finalize_broadcast(id, success_count, fail_count, &sent_to)
        .await?;
    tracing::info!("broadcast {id} done: {success_count} ok, {fail_count} failed");

    Ok(BroadcastOutcome {
        success: true,
        success_count,
        fail_count,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_oversized_messages_are_rejected() {
        assert!(validate_message("", 1).is_err());
        assert!(validate_message("   ", 1).is_err());
        assert!(validate_message(&"m".repeat(MAX_BROADCAST_CHARS + 1), 1).is_err());
        assert!(validate_message(&"m".repeat(MAX_BROADCAST_CHARS), 1).is_ok());
    }

    #[test]
    fn non_positive_sender_is_rejected() {
        assert!(validate_message("hello everyone", 0).is_err());
        assert!(validate_message("hello everyone", -5).is_err());
        assert!(validate_message("hello everyone", 42).is_ok());
    }

    #[tokio::test]
    async fn fan_out_counts_successes_and_failures() {
        let recipients = vec![1, 2, 3, 4, 5];
        let (sent_to, ok, failed) = fan_out(&recipients, |id| async move {
            if id % 2 == 0 {
                anyhow::bail!("delivery refused")
            }
            Ok(())
        })
        .await;

        assert_eq!(sent_to, vec![1, 3, 5]);
        assert_eq!(ok, 3);
        assert_eq!(failed, 2);
        assert_eq!(ok + failed, recipients.len() as i64);
    }

    #[tokio::test]
    async fn fan_out_over_no_recipients_is_a_noop() {
        let (sent_to, ok, failed) = fan_out(&[], |_| async { Ok(()) }).await;
        assert!(sent_to.is_empty());
        assert_eq!(ok, 0);
        assert_eq!(failed, 0);
    }
}
