//! Single authoritative callback router. Every inline-button pattern is
//! handled exactly once, here; menu handlers and settings handlers share
//! the same dispatch so no pattern can be claimed twice.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::admin;
use crate::ai::lang;
use crate::bot::session::{AdminAction, DialogState, WizardState};
use crate::bot::AppState;
use crate::config::BUILTIN_PERSONALITIES;
use crate::db::models::User;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = q.from.id.0 as i64;
    let chat_id = q.message.as_ref().map(|m| m.chat().id);
    if let Err(e) = route_callback(&bot, &q, &state).await {
        if let Some(chat_id) = chat_id {
            state
                .errors
                .report(&bot, chat_id, Some(user_id), "callback", &e)
                .await;
        } else {
            tracing::error!("callback from {user_id} failed without a chat: {e:#}");
        }
    }
    Ok(())
}

async fn route_callback(bot: &Bot, q: &CallbackQuery, state: &Arc<AppState>) -> anyhow::Result<()> {
    let data = match q.data.as_deref() {
        Some(d) => d,
        None => return Ok(()),
    };
    let user_id = q.from.id.0 as i64;

    let screen = match q.message.as_ref() {
        Some(m) => Screen {
            chat_id: m.chat().id,
            message_id: m.regular_message().map(|msg| msg.id),
        },
        None => return Ok(()),
    };

    if let Some(rest) = data.strip_prefix("admin:") {
        // Authorization runs before any admin mutation or menu render.
        if !state.db.is_admin(user_id).await? {
            bot.answer_callback_query(&q.id)
                .text("⛔ Admins only")
                .await?;
            return Ok(());
        }
        handle_admin_callback(bot, q, state, user_id, &screen, rest).await?;
        return Ok(());
    }

    handle_user_callback(bot, q, state, user_id, &screen, data).await
}

/// Where to render a menu update: the message carrying the pressed button.
struct Screen {
    chat_id: ChatId,
    message_id: Option<teloxide::types::MessageId>,
}

impl Screen {
    /// Edit the button message in place, or send a new one when the
    /// original is inaccessible.
    async fn show(
        &self,
        bot: &Bot,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> anyhow::Result<()> {
        match self.message_id {
            Some(message_id) => {
                let mut edit = bot.edit_message_text(self.chat_id, message_id, text);
                if let Some(kb) = keyboard {
                    edit = edit.reply_markup(kb);
                }
                edit.await?;
            }
            None => {
                let mut send = bot.send_message(self.chat_id, text);
                if let Some(kb) = keyboard {
                    send = send.reply_markup(kb);
                }
                send.await?;
            }
        }
        Ok(())
    }
}

// ── Admin panel ────────────────────────────────────────────────────

async fn handle_admin_callback(
    bot: &Bot,
    q: &CallbackQuery,
    state: &Arc<AppState>,
    user_id: i64,
    screen: &Screen,
    action: &str,
) -> anyhow::Result<()> {
    // Every panel button press refreshes the 30-minute session window.
    state.sessions.touch(user_id);

    match action {
        "panel" => {
            // Back and Cancel both land here; an armed dialog must not
            // survive the navigation, or the next plain text would still
            // feed the abandoned action.
            state.sessions.clear_dialog(user_id);
            screen
                .show(bot, "🛠 Admin Panel", Some(admin_panel_markup()))
                .await?;
        }
        "users" => {
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![
                    InlineKeyboardButton::callback("🚫 Block", "admin:act:block"),
                    InlineKeyboardButton::callback("✅ Unblock", "admin:act:unblock"),
                ],
                vec![InlineKeyboardButton::callback(
                    "🔍 User details",
                    "admin:act:lookup",
                )],
                vec![InlineKeyboardButton::callback("« Back", "admin:panel")],
            ]);
            screen.show(bot, "👥 User Management", Some(keyboard)).await?;
        }
        "broadcast" => {
            let recent = state.db.list_recent_broadcasts(5).await?;
            let mut text = String::from("📢 Broadcast\n");
            if !recent.is_empty() {
                text.push_str("\nRecent:\n");
                for b in &recent {
                    let preview: String = b.message.chars().take(40).collect();
                    text.push_str(&format!(
                        "• {} — {}/{} delivered — {preview}\n",
                        b.created_at.format("%b %d"),
                        b.success_count,
                        b.total_users,
                    ));
                }
            }
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![InlineKeyboardButton::callback(
                    "📝 Text broadcast",
                    "admin:act:bcast_text",
                )],
                vec![InlineKeyboardButton::callback(
                    "🖼 Media broadcast",
                    "admin:act:bcast_media",
                )],
                vec![InlineKeyboardButton::callback("« Back", "admin:panel")],
            ]);
            screen.show(bot, &text, Some(keyboard)).await?;
        }
        "personalities" => {
            let profiles = state.db.get_all_personalities().await?;
            let mut text = String::from("🎭 Personalities\n\n");
            for p in &profiles {
                let marker = if p.is_active { "" } else { " (inactive)" };
                text.push_str(&format!("• {}{marker} — {}\n", p.name, p.description));
            }
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![
                    InlineKeyboardButton::callback("➕ Add", "admin:act:add_personality"),
                    InlineKeyboardButton::callback("➖ Remove", "admin:act:rm_personality"),
                ],
                vec![InlineKeyboardButton::callback(
                    "✏️ Edit",
                    "admin:act:edit_personality",
                )],
                vec![InlineKeyboardButton::callback("« Back", "admin:panel")],
            ]);
            screen.show(bot, &text, Some(keyboard)).await?;
        }
        "credentials" => {
            let usernames = state.db.list_credential_usernames().await?;
            let listing = if usernames.is_empty() {
                "none".to_string()
            } else {
                usernames.join(", ")
            };
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![
                    InlineKeyboardButton::callback("➕ Add", "admin:act:add_cred"),
                    InlineKeyboardButton::callback("➖ Remove", "admin:act:rm_cred"),
                ],
                vec![InlineKeyboardButton::callback("« Back", "admin:panel")],
            ]);
            screen
                .show(
                    bot,
                    &format!("🔑 Dashboard credentials: {listing}"),
                    Some(keyboard),
                )
                .await?;
        }
        "admins" => {
            let admins = state.db.list_admins().await?;
            let mut text = String::from("👮 Admins\n\n");
            for a in &admins {
                text.push_str(&format!("• {}\n", a.user_id));
            }
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![
                    InlineKeyboardButton::callback("➕ Add", "admin:act:add_admin"),
                    InlineKeyboardButton::callback("➖ Remove", "admin:act:rm_admin"),
                ],
                vec![InlineKeyboardButton::callback("« Back", "admin:panel")],
            ]);
            screen.show(bot, &text, Some(keyboard)).await?;
        }
        "stats" => {
            let stats = state.db.get_stats().await?;
            let keyboard = InlineKeyboardMarkup::new(vec![vec![
                InlineKeyboardButton::callback("« Back", "admin:panel"),
            ]]);
            screen
                .show(bot, &admin::format_stats(&stats), Some(keyboard))
                .await?;
        }
        "exit" => {
            state.sessions.exit_panel(user_id);
            screen.show(bot, "👋 Left the admin panel.", None).await?;
        }
        _ => {
            if let Some(act) = action.strip_prefix("act:") {
                start_admin_dialog(bot, state, user_id, screen, act).await?;
            } else {
                tracing::warn!("unknown admin callback '{action}' from {user_id}");
            }
        }
    }

    bot.answer_callback_query(&q.id).await?;
    Ok(())
}

/// Arm a dialog state so the admin's next plain-text message is consumed
/// by the matching action or wizard step.
async fn start_admin_dialog(
    bot: &Bot,
    state: &Arc<AppState>,
    user_id: i64,
    screen: &Screen,
    act: &str,
) -> anyhow::Result<()> {
    let (dialog, prompt) = match act {
        "block" => (
            DialogState::SingleShot(AdminAction::BlockUser),
            "Send the user id or @username to block:",
        ),
        "unblock" => (
            DialogState::SingleShot(AdminAction::UnblockUser),
            "Send the user id or @username to unblock:",
        ),
        "lookup" => (
            DialogState::SingleShot(AdminAction::LookupUser),
            "Send the user id or @username to look up:",
        ),
        "bcast_text" => (
            DialogState::SingleShot(AdminAction::BroadcastText),
            "Send the broadcast message (max 4000 characters):",
        ),
        "bcast_media" => (
            DialogState::SingleShot(AdminAction::BroadcastMedia),
            "Send a photo or document with a caption to broadcast:",
        ),
        "add_personality" => (
            DialogState::Wizard(WizardState::new()),
            "📝 Step 1/3: Send a name for the new personality (2-50 characters):",
        ),
        "rm_personality" => (
            DialogState::SingleShot(AdminAction::RemovePersonality),
            "Send the name of the personality to remove:",
        ),
        "edit_personality" => (
            DialogState::SingleShot(AdminAction::EditPersonality),
            "Send name|new description to update a personality:",
        ),
        "add_cred" => (
            DialogState::SingleShot(AdminAction::AddCredentials),
            "Send dashboard credentials as username|password:",
        ),
        "rm_cred" => (
            DialogState::SingleShot(AdminAction::RemoveCredentials),
            "Send the dashboard username to remove:",
        ),
        "add_admin" => (
            DialogState::SingleShot(AdminAction::AddAdmin),
            "Send the numeric user id of the new admin:",
        ),
        "rm_admin" => (
            DialogState::SingleShot(AdminAction::RemoveAdmin),
            "Send the numeric user id of the admin to remove:",
        ),
        _ => {
            tracing::warn!("unknown admin action '{act}' from {user_id}");
            return Ok(());
        }
    };

    state.sessions.set_dialog(user_id, dialog);
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "« Cancel",
        "admin:panel",
    )]]);
    screen.show(bot, prompt, Some(keyboard)).await?;
    Ok(())
}

// ── User settings ──────────────────────────────────────────────────

async fn handle_user_callback(
    bot: &Bot,
    q: &CallbackQuery,
    state: &Arc<AppState>,
    user_id: i64,
    screen: &Screen,
    data: &str,
) -> anyhow::Result<()> {
    let user = match state.db.get_user(user_id).await? {
        Some(u) => u,
        None => {
            state
                .db
                .get_or_create_user(
                    user_id,
                    q.from.username.as_deref(),
                    Some(q.from.first_name.as_str()),
                    q.from.last_name.as_deref(),
                )
                .await?
        }
    };

    match data {
        "settings" => {
            let (text, keyboard) = settings_menu(&user);
            screen.show(bot, &text, Some(keyboard)).await?;
        }
        "settings:audio" => {
            state
                .db
                .set_audio_enabled(user_id, !user.audio_enabled)
                .await?;
            state.cache.invalidate(user_id);
            let refreshed = state
                .db
                .get_user(user_id)
                .await?
                .unwrap_or(user);
            let (text, keyboard) = settings_menu(&refreshed);
            screen.show(bot, &text, Some(keyboard)).await?;
        }
        "settings:lang:input" => {
            screen
                .show(
                    bot,
                    "🌐 Choose your input language:",
                    Some(language_menu("input")),
                )
                .await?;
        }
        "settings:lang:output" => {
            screen
                .show(
                    bot,
                    "🌐 Choose the reply language:",
                    Some(language_menu("output")),
                )
                .await?;
        }
        "settings:lang:voice" => {
            screen
                .show(
                    bot,
                    "🎙 Choose the voice language:",
                    Some(language_menu("voice")),
                )
                .await?;
        }
        "settings:personality" => {
            let profiles = state.db.get_active_personalities().await?;
            let mut rows = Vec::new();
            for p in &profiles {
                if !user_can_use(&user, &p.name) {
                    continue;
                }
                let marker = if user.personality == p.name { "✅ " } else { "" };
                rows.push(vec![InlineKeyboardButton::callback(
                    format!("{marker}{}", p.name),
                    format!("personality:{}", p.name),
                )]);
            }
            rows.push(vec![InlineKeyboardButton::callback("« Back", "settings")]);
            screen
                .show(
                    bot,
                    "🎭 Choose a personality:",
                    Some(InlineKeyboardMarkup::new(rows)),
                )
                .await?;
        }
        _ => {
            if let Some(rest) = data.strip_prefix("lang:") {
                if let Some((kind, code)) = rest.split_once(':') {
                    set_language(state, user_id, &user, kind, code).await?;
                    let refreshed = state.db.get_user(user_id).await?.unwrap_or(user);
                    let (text, keyboard) = settings_menu(&refreshed);
                    screen.show(bot, &text, Some(keyboard)).await?;
                }
            } else if let Some(name) = data.strip_prefix("personality:") {
                if user_can_use(&user, name)
                    && state.db.get_personality_prompt(name).await?.is_some()
                {
                    state.db.set_personality(user_id, name).await?;
                    state.cache.invalidate(user_id);
                    bot.answer_callback_query(&q.id)
                        .text(format!("Personality set to {name}"))
                        .await?;
                    return Ok(());
                }
                bot.answer_callback_query(&q.id)
                    .text("That personality isn't available.")
                    .await?;
                return Ok(());
            } else {
                tracing::warn!("unknown callback '{data}' from {user_id}");
            }
        }
    }

    bot.answer_callback_query(&q.id).await?;
    Ok(())
}

async fn set_language(
    state: &Arc<AppState>,
    user_id: i64,
    user: &User,
    kind: &str,
    code: &str,
) -> anyhow::Result<()> {
    if code != "auto" && !lang::all_languages().iter().any(|(c, _)| *c == code) {
        anyhow::bail!("unknown language code '{code}'");
    }
    let mut prefs = user.language_prefs.0.clone();
    match kind {
        "input" => prefs.input = code.to_string(),
        "output" => prefs.output = code.to_string(),
        "voice" => prefs.voice = code.to_string(),
        _ => anyhow::bail!("unknown language preference kind '{kind}'"),
    }
    state.db.set_language_prefs(user_id, &prefs).await?;
    state.cache.invalidate(user_id);
    Ok(())
}

/// Built-in personalities are selectable by everyone; admin-created ones
/// only after propagation into the user's available list.
fn user_can_use(user: &User, name: &str) -> bool {
    BUILTIN_PERSONALITIES.iter().any(|(n, _, _)| *n == name)
        || user.available_personalities.0.iter().any(|n| n == name)
}

// ── Keyboards ──────────────────────────────────────────────────────

pub fn admin_panel_markup() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("👥 Users", "admin:users"),
            InlineKeyboardButton::callback("📢 Broadcast", "admin:broadcast"),
        ],
        vec![
            InlineKeyboardButton::callback("🎭 Personalities", "admin:personalities"),
            InlineKeyboardButton::callback("🔑 Credentials", "admin:credentials"),
        ],
        vec![
            InlineKeyboardButton::callback("👮 Admins", "admin:admins"),
            InlineKeyboardButton::callback("📊 Stats", "admin:stats"),
        ],
        vec![InlineKeyboardButton::callback("🚪 Exit", "admin:exit")],
    ])
}

pub fn settings_menu(user: &User) -> (String, InlineKeyboardMarkup) {
    let prefs = &user.language_prefs.0;
    let text = format!(
        "⚙️ Settings\n\n\
         Personality: {personality}\n\
         Voice replies: {audio}\n\
         Input language: {input}\n\
         Reply language: {output}\n\
         Voice language: {voice}",
        personality = user.personality,
        audio = if user.audio_enabled { "on 🎙" } else { "off" },
        input = lang::language_name(&prefs.input),
        output = lang::language_name(&prefs.output),
        voice = lang::language_name(&prefs.voice),
    );

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            if user.audio_enabled {
                "🔇 Turn voice replies off"
            } else {
                "🎙 Turn voice replies on"
            },
            "settings:audio",
        )],
        vec![
            InlineKeyboardButton::callback("🌐 Input", "settings:lang:input"),
            InlineKeyboardButton::callback("💬 Reply", "settings:lang:output"),
            InlineKeyboardButton::callback("🎙 Voice", "settings:lang:voice"),
        ],
        vec![InlineKeyboardButton::callback(
            "🎭 Personality",
            "settings:personality",
        )],
    ]);

    (text, keyboard)
}

fn language_menu(kind: &str) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    for (code, name) in lang::all_languages() {
        row.push(InlineKeyboardButton::callback(
            name.to_string(),
            format!("lang:{kind}:{code}"),
        ));
        if row.len() == 2 {
            rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows.push(vec![InlineKeyboardButton::callback("« Back", "settings")]);
    InlineKeyboardMarkup::new(rows)
}
