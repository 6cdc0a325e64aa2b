//! Plain-text dispatch for admins with a live dialog state: single-shot
//! actions consume one message as their parameter, the personality wizard
//! walks its three steps. Runs before the chat pipeline in the handler
//! tree so wizard answers never become chat turns.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::admin::{self, broadcast, personality};
use crate::bot::session::{AdminAction, DialogState, WizardOutcome};
use crate::bot::AppState;
use crate::bot::{commands, handlers};

pub async fn handle_admin_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    if let Err(e) = dispatch(&bot, &msg, &state).await {
        state
            .errors
            .report(&bot, msg.chat.id, Some(user_id), "admin dialog", &e)
            .await;
    }
    Ok(())
}

async fn dispatch(bot: &Bot, msg: &Message, state: &Arc<AppState>) -> anyhow::Result<()> {
    let user_id = match msg.from.as_ref() {
        Some(u) => u.id.0 as i64,
        None => return Ok(()),
    };

    // The branch filter only consulted the session map; the directory is
    // the authorization source of truth. A sender demoted mid-session is
    // an ordinary user again: drop the stale session and treat this
    // message as chat.
    if !state.db.is_admin(user_id).await? {
        state.sessions.exit_panel(user_id);
        return handlers::run_pipeline(bot, msg, state).await;
    }

    match state.sessions.get_dialog(user_id) {
        None => {
            bot.send_message(
                msg.chat.id,
                "ℹ️ You're in the admin panel. Use the buttons, or press Exit to chat normally.",
            )
            .await?;
        }

        Some(DialogState::SingleShot(action)) => {
            match run_single_shot(bot, msg, state, user_id, action).await? {
                ActionOutcome::Done(reply) => {
                    state.sessions.clear_dialog(user_id);
                    bot.send_message(msg.chat.id, reply).await?;
                }
                // Validation failure: keep the dialog armed for a retry.
                ActionOutcome::Invalid(reply) => {
                    bot.send_message(msg.chat.id, reply).await?;
                }
            }
        }

        Some(DialogState::Wizard(mut wizard)) => {
            let text = msg.text().unwrap_or("");
            match wizard.apply(text) {
                WizardOutcome::Reprompt(prompt) => {
                    bot.send_message(msg.chat.id, prompt).await?;
                }
                WizardOutcome::Advance(prompt) => {
                    state
                        .sessions
                        .set_dialog(user_id, DialogState::Wizard(wizard));
                    bot.send_message(msg.chat.id, prompt).await?;
                }
                WizardOutcome::Complete {
                    name,
                    description,
                    prompt,
                } => {
                    // State clears before the creation attempt, so a failed
                    // insert never leaves a stuck wizard.
                    state.sessions.clear_dialog(user_id);
                    let reply = match personality::add(
                        &state.db,
                        &name,
                        &description,
                        prompt.as_deref(),
                        true,
                    )
                    .await?
                    {
                        personality::AddResult::Created { propagated_to } => format!(
                            "✅ Personality '{name}' created and offered to {propagated_to} users."
                        ),
                        personality::AddResult::Duplicate => {
                            format!("❌ A personality named '{name}' already exists.")
                        }
                        personality::AddResult::Invalid(reason) => format!("❌ {reason}"),
                    };
                    bot.send_message(msg.chat.id, reply).await?;
                }
            }
        }
    }

    Ok(())
}

enum ActionOutcome {
    /// Action ran; dialog state clears.
    Done(String),
    /// Input rejected; dialog state stays armed.
    Invalid(String),
}

async fn run_single_shot(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    admin_id: i64,
    action: AdminAction,
) -> anyhow::Result<ActionOutcome> {
    let text = msg.text().unwrap_or("").trim();

    Ok(match action {
        AdminAction::BlockUser => {
            if text.is_empty() {
                return Ok(ActionOutcome::Invalid(
                    "Send a user id or @username to block:".to_string(),
                ));
            }
            ActionOutcome::Done(commands::block_by_input(state, text).await?)
        }

        AdminAction::UnblockUser => {
            if text.is_empty() {
                return Ok(ActionOutcome::Invalid(
                    "Send a user id or @username to unblock:".to_string(),
                ));
            }
            ActionOutcome::Done(commands::unblock_by_input(state, text).await?)
        }

        AdminAction::LookupUser => {
            let Some(target_id) = admin::resolve_user(&state.db, text).await? else {
                return Ok(ActionOutcome::Invalid(format!(
                    "❌ No user found for '{text}'. Try another id or @username:"
                )));
            };
            match state.db.get_user(target_id).await? {
                Some(user) => {
                    let chats = state.db.count_chats(target_id).await?;
                    let mut details = admin::format_user_details(&user, chats);
                    let recent = state.db.get_recent_chats(target_id, 3).await?;
                    if !recent.is_empty() {
                        details.push_str("\n\nRecent messages:");
                        for chat in &recent {
                            let preview: String = chat.user_message.chars().take(60).collect();
                            details.push_str(&format!(
                                "\n• {} — {preview}",
                                chat.created_at.format("%b %d %H:%M"),
                            ));
                        }
                    }
                    ActionOutcome::Done(details)
                }
                None => ActionOutcome::Invalid(format!(
                    "❌ No user found for '{text}'. Try another id or @username:"
                )),
            }
        }

        AdminAction::BroadcastText => {
            let outcome = broadcast::broadcast(&state.db, text, admin_id, None, None, |id| {
                let bot = bot.clone();
                let body = text.to_string();
                async move {
                    bot.send_message(ChatId(id), body).await?;
                    Ok(())
                }
            })
            .await?;
            if !outcome.success {
                let reason = outcome.error.unwrap_or_else(|| "Invalid broadcast".to_string());
                return Ok(ActionOutcome::Invalid(format!("❌ {reason}")));
            }
            ActionOutcome::Done(format!(
                "📢 Broadcast finished: {} delivered, {} failed.",
                outcome.success_count, outcome.fail_count
            ))
        }

        AdminAction::BroadcastMedia => run_media_broadcast(bot, msg, state, admin_id).await?,

        AdminAction::RemovePersonality => {
            if text.is_empty() {
                return Ok(ActionOutcome::Invalid(
                    "Send the name of the personality to remove:".to_string(),
                ));
            }
            if personality::remove(&state.db, text).await? {
                ActionOutcome::Done(format!("✅ Personality '{}' removed.", text.to_lowercase()))
            } else {
                ActionOutcome::Invalid(format!(
                    "❌ No active personality named '{text}'. Try again:"
                ))
            }
        }

        AdminAction::EditPersonality => {
            let Some((name, description)) = text.split_once('|') else {
                return Ok(ActionOutcome::Invalid(
                    "❌ Expected name|new description. Try again:".to_string(),
                ));
            };
            let description = description.trim();
            let chars = description.chars().count();
            if chars < 10 || chars > 500 {
                return Ok(ActionOutcome::Invalid(
                    "❌ Description must be 10-500 characters. Try again:".to_string(),
                ));
            }
            if personality::update(&state.db, name, description, None).await? {
                ActionOutcome::Done(format!(
                    "✅ Personality '{}' updated.",
                    personality::normalize_name(name)
                ))
            } else {
                ActionOutcome::Invalid(format!(
                    "❌ No active personality named '{}'. Try again:",
                    name.trim()
                ))
            }
        }

        AdminAction::AddCredentials => match admin::parse_credentials(text) {
            Some((username, password)) => {
                state
                    .db
                    .upsert_credentials(&username, &admin::hash_password(&password))
                    .await?;
                ActionOutcome::Done(format!("✅ Dashboard credentials set for '{username}'."))
            }
            None => ActionOutcome::Invalid(
                "❌ Expected username|password (username ≥3 chars, password ≥6). Try again:"
                    .to_string(),
            ),
        },

        AdminAction::RemoveCredentials => {
            if text.is_empty() {
                return Ok(ActionOutcome::Invalid(
                    "Send the dashboard username to remove:".to_string(),
                ));
            }
            if state.db.remove_credentials(text).await? {
                ActionOutcome::Done(format!("✅ Credentials for '{text}' removed."))
            } else {
                ActionOutcome::Invalid(format!("❌ No credentials for '{text}'. Try again:"))
            }
        }

        AdminAction::AddAdmin => match text.parse::<i64>() {
            Ok(id) if id > 0 => {
                if state.db.add_admin(id, Some(admin_id)).await? {
                    ActionOutcome::Done(format!("✅ User {id} is now an admin."))
                } else {
                    ActionOutcome::Done(format!("ℹ️ User {id} is already an admin."))
                }
            }
            _ => ActionOutcome::Invalid("❌ Send a positive numeric user id:".to_string()),
        },

        AdminAction::RemoveAdmin => match text.parse::<i64>() {
            Ok(id) if id > 0 => {
                if id == state.config.admin_user_id {
                    ActionOutcome::Done("❌ The bootstrap admin cannot be removed.".to_string())
                } else if id == admin_id {
                    ActionOutcome::Done("❌ You cannot remove yourself.".to_string())
                } else if state.db.remove_admin(id).await? {
                    ActionOutcome::Done(format!("✅ User {id} is no longer an admin."))
                } else {
                    ActionOutcome::Invalid(format!("❌ User {id} is not an admin. Try again:"))
                }
            }
            _ => ActionOutcome::Invalid("❌ Send a positive numeric user id:".to_string()),
        },
    })
}

/// Media broadcast: the admin's message must carry a photo or document and
/// a caption, which becomes the broadcast text.
async fn run_media_broadcast(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    admin_id: i64,
) -> anyhow::Result<ActionOutcome> {
    let caption = msg.caption().unwrap_or("").trim();

    let (media_type, file_id, file_name) = if let Some(photo) = msg.photo().and_then(|p| p.last()) {
        ("photo", photo.file.id.clone(), None)
    } else if let Some(doc) = msg.document() {
        (
            "document",
            doc.file.id.clone(),
            doc.file_name.as_deref().map(str::to_string),
        )
    } else {
        return Ok(ActionOutcome::Invalid(
            "❌ Send a photo or document with a caption to broadcast:".to_string(),
        ));
    };

    let outcome = broadcast::broadcast(
        &state.db,
        caption,
        admin_id,
        Some(media_type),
        file_name.as_deref(),
        |id| {
            let bot = bot.clone();
            let file_id = file_id.clone();
            let caption = caption.to_string();
            async move {
                match media_type {
                    "photo" => {
                        bot.send_photo(ChatId(id), InputFile::file_id(file_id))
                            .caption(caption)
                            .await?;
                    }
                    _ => {
                        bot.send_document(ChatId(id), InputFile::file_id(file_id))
                            .caption(caption)
                            .await?;
                    }
                }
                Ok(())
            }
        },
    )
    .await?;

    if !outcome.success {
        let reason = outcome.error.unwrap_or_else(|| "Invalid broadcast".to_string());
        return Ok(ActionOutcome::Invalid(format!("❌ {reason}")));
    }
    Ok(ActionOutcome::Done(format!(
        "📢 Broadcast finished: {} delivered, {} failed.",
        outcome.success_count, outcome.fail_count
    )))
}
