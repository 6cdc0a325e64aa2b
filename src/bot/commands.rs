use std::sync::Arc;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands as _;

use crate::admin;
use crate::bot::{callbacks, AppState};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum BotCommand {
    #[command(description = "Start chatting with Ananya")]
    Start,
    #[command(description = "Open the settings menu")]
    Settings,
    #[command(description = "Show help")]
    Help,
    #[command(description = "Open the admin panel (admins only)")]
    Admin,
    #[command(description = "Block a user by id or @username (admins only)")]
    Block(String),
    #[command(description = "Unblock a user by id or @username (admins only)")]
    Unblock(String),
    #[command(description = "Show bot statistics (admins only)")]
    Stats,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    if let Err(e) = run_command(&bot, &msg, cmd, &state).await {
        state
            .errors
            .report(&bot, msg.chat.id, Some(user_id), "command", &e)
            .await;
    }
    Ok(())
}

async fn run_command(
    bot: &Bot,
    msg: &Message,
    cmd: BotCommand,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    let from = match msg.from.as_ref() {
        Some(u) => u,
        None => return Ok(()),
    };
    let user_id = from.id.0 as i64;

    // Ensure user exists in DB
    let user = state
        .db
        .get_or_create_user(
            user_id,
            from.username.as_deref(),
            Some(from.first_name.as_str()),
            from.last_name.as_deref(),
        )
        .await?;
    state.cache.invalidate(user_id);

    match cmd {
        BotCommand::Start => {
            bot.send_message(
                msg.chat.id,
                "👋 Hi! I'm Ananya, your AI companion.\n\n\
                 💬 Just send me a message and we can chat.\n\
                 🌐 I can translate and reply in your language.\n\
                 🎙 Turn on voice replies in /settings.\n\
                 Use /help for all commands.",
            )
            .await?;
        }

        BotCommand::Settings => {
            let (text, keyboard) = callbacks::settings_menu(&user);
            bot.send_message(msg.chat.id, text)
                .reply_markup(keyboard)
                .await?;
        }

        BotCommand::Help => {
            bot.send_message(msg.chat.id, BotCommand::descriptions().to_string())
                .await?;
        }

        BotCommand::Admin => {
            if !state.db.is_admin(user_id).await? {
                bot.send_message(msg.chat.id, "⛔ This command is for admins only.")
                    .await?;
                return Ok(());
            }
            state.sessions.enter_panel(user_id);
            bot.send_message(msg.chat.id, "🛠 Admin Panel")
                .reply_markup(callbacks::admin_panel_markup())
                .await?;
        }

        BotCommand::Block(target) => {
            if !state.db.is_admin(user_id).await? {
                bot.send_message(msg.chat.id, "⛔ This command is for admins only.")
                    .await?;
                return Ok(());
            }
            let reply = block_by_input(state, &target).await?;
            bot.send_message(msg.chat.id, reply).await?;
        }

        BotCommand::Unblock(target) => {
            if !state.db.is_admin(user_id).await? {
                bot.send_message(msg.chat.id, "⛔ This command is for admins only.")
                    .await?;
                return Ok(());
            }
            let reply = unblock_by_input(state, &target).await?;
            bot.send_message(msg.chat.id, reply).await?;
        }

        BotCommand::Stats => {
            if !state.db.is_admin(user_id).await? {
                bot.send_message(msg.chat.id, "⛔ This command is for admins only.")
                    .await?;
                return Ok(());
            }
            let stats = state.db.get_stats().await?;
            bot.send_message(msg.chat.id, admin::format_stats(&stats))
                .await?;
        }
    }

    Ok(())
}

pub async fn block_by_input(state: &Arc<AppState>, input: &str) -> anyhow::Result<String> {
    if input.trim().is_empty() {
        return Ok("Usage: /block <user id or @username>".to_string());
    }
    let Some(target_id) = admin::resolve_user(&state.db, input).await? else {
        return Ok(format!("❌ No user found for '{}'", input.trim()));
    };
    Ok(match admin::block_user(&state.db, target_id).await? {
        admin::BlockResult::Blocked => {
            state.cache.invalidate(target_id);
            format!("🚫 User {target_id} blocked.")
        }
        admin::BlockResult::TargetIsAdmin => {
            format!("❌ User {target_id} is an admin and cannot be blocked.")
        }
        admin::BlockResult::NotFound => format!("❌ No user found for '{}'", input.trim()),
    })
}

pub async fn unblock_by_input(state: &Arc<AppState>, input: &str) -> anyhow::Result<String> {
    if input.trim().is_empty() {
        return Ok("Usage: /unblock <user id or @username>".to_string());
    }
    let Some(target_id) = admin::resolve_user(&state.db, input).await? else {
        return Ok(format!("❌ No user found for '{}'", input.trim()));
    };
    Ok(if admin::unblock_user(&state.db, target_id).await? {
        state.cache.invalidate(target_id);
        format!("✅ User {target_id} unblocked.")
    } else {
        format!("❌ No user found for '{}'", input.trim())
    })
}
