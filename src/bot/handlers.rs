use std::sync::Arc;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ReplyParameters};

use crate::ai::gemini::{GeminiReply, MediaPart};
use crate::ai::lang;
use crate::ai::tts;
use crate::bot::AppState;
use crate::config::BUILTIN_PERSONALITIES;
use crate::db::models::User;

/// Main chat handler: one inbound message becomes at most one AI turn,
/// with translation on both sides and optional chunked voice output.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    if let Err(e) = run_pipeline(&bot, &msg, &state).await {
        state
            .errors
            .report(&bot, msg.chat.id, Some(user_id), "chat pipeline", &e)
            .await;
    }
    Ok(())
}

/// Fixed refusal for blocked users. No AI call and no history record
/// happen behind it.
pub(crate) const BLOCKED_REPLY: &str = "🚫 You are blocked from using this bot.";

/// What one inbound chat message gets, decided before any AI call or
/// history write.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MessageGate {
    /// Live admin-panel session: the admin dispatcher owns this text.
    Silent,
    Refuse(&'static str),
    Proceed,
}

pub(crate) fn gate_message(in_admin_mode: bool, is_blocked: bool) -> MessageGate {
    if in_admin_mode {
        MessageGate::Silent
    } else if is_blocked {
        MessageGate::Refuse(BLOCKED_REPLY)
    } else {
        MessageGate::Proceed
    }
}

pub(crate) async fn run_pipeline(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    let from = match msg.from.as_ref() {
        Some(u) => u,
        None => return Ok(()),
    };
    let user_id = from.id.0 as i64;
    let chat_id = msg.chat.id;

    // ── 1. Load the user record (cached) ───────────────────────────
    let user = match state.cache.get(user_id) {
        Some(u) => u,
        None => {
            let u = state
                .db
                .get_or_create_user(
                    user_id,
                    from.username.as_deref(),
                    Some(from.first_name.as_str()),
                    from.last_name.as_deref(),
                )
                .await?;
            state.cache.insert(u.clone());
            u
        }
    };

    // ── 2. Entry gate ──────────────────────────────────────────────
    // An admin inside the panel never reaches the AI turn even if branch
    // order changes; blocked users get the fixed refusal and nothing else.
    match gate_message(state.sessions.is_in_admin_mode(user_id), user.is_blocked) {
        MessageGate::Silent => return Ok(()),
        MessageGate::Refuse(reply) => {
            bot.send_message(chat_id, reply).await?;
            return Ok(());
        }
        MessageGate::Proceed => {}
    }

    let has_media = msg.photo().is_some() || msg.document().is_some();
    let original_text = match msg.text().or_else(|| msg.caption()) {
        Some(t) => t.to_string(),
        None if has_media => "Please respond to this attachment.".to_string(),
        None => return Ok(()),
    };

    let _ = bot.send_chat_action(chat_id, ChatAction::Typing).await;

    // ── 3. Input-language normalization ────────────────────────────
    // A declared (non-auto) input preference means the AI should see the
    // message in that language, translating when the detected language
    // differs.
    let prefs = user.language_prefs.0.clone();
    let mut prompt_text = original_text.clone();
    if prefs.input != "auto" {
        let (detected, _) = state.translator.detect_language(&prompt_text).await;
        if base(&detected) != base(&prefs.input) {
            prompt_text = state
                .translator
                .translate(&prompt_text, &prefs.input, Some(&detected))
                .await;
        }
    }

    // ── 4. Media extraction (best-effort) ──────────────────────────
    let media_parts = extract_media(bot, msg).await;

    let status = bot.send_message(chat_id, "💭 Thinking...").await.ok();

    // ── 5. AI invocation ───────────────────────────────────────────
    let ai_config = state.db.get_ai_config(&state.config.default_model).await?;
    let persona = match state.db.get_personality_prompt(&user.personality).await? {
        Some(p) => p,
        None => default_prompt().to_string(),
    };
    let reply = state
        .gemini
        .get_response(&prompt_text, &persona, &media_parts, &ai_config)
        .await;

    if let Some(s) = &status {
        let _ = bot.delete_message(chat_id, s.id).await;
    }

    let reply_text = match reply? {
        GeminiReply::Text(text) => text,
        GeminiReply::Audio(bytes) => {
            // An audio-native model reply goes straight out as a voice
            // note; translation and TTS don't apply.
            let voice = InputFile::memory(bytes).file_name("reply.ogg");
            bot.send_voice(chat_id, voice)
                .reply_parameters(ReplyParameters::new(msg.id))
                .await?;
            let mimes: Vec<String> = media_parts.iter().map(|m| m.mime_type.clone()).collect();
            state
                .db
                .save_chat_history(user_id, &original_text, "[voice reply]", &mimes)
                .await?;
            state.db.bump_activity(user_id).await?;
            return Ok(());
        }
    };

    // ── 6. Output-language translation ─────────────────────────────
    let final_text = if prefs.output != "auto" {
        state
            .translator
            .translate(&reply_text, &prefs.output, None)
            .await
    } else {
        reply_text
    };

    // ── 7. Persist the turn ────────────────────────────────────────
    let mimes: Vec<String> = media_parts.iter().map(|m| m.mime_type.clone()).collect();
    state
        .db
        .save_chat_history(user_id, &original_text, &final_text, &mimes)
        .await?;
    state.db.bump_activity(user_id).await?;

    // ── 8. Final text reply ────────────────────────────────────────
    bot.send_message(chat_id, &final_text).await?;

    // ── 9. Optional voice reply ────────────────────────────────────
    if user.audio_enabled {
        send_voice_reply(bot, msg, state, &user, &final_text).await?;
    }

    Ok(())
}

/// Download photo/document attachments as inline media parts. Failures are
/// logged and swallowed: a broken attachment degrades the turn to
/// text-only, it never aborts the pipeline.
async fn extract_media(bot: &Bot, msg: &Message) -> Vec<MediaPart> {
    let mut parts = Vec::new();

    if let Some(photo) = msg.photo().and_then(|p| p.last()) {
        match download(bot, &photo.file.id).await {
            Ok(data) => parts.push(MediaPart {
                mime_type: "image/jpeg".to_string(),
                data,
            }),
            Err(e) => tracing::warn!("photo download failed: {e}"),
        }
    }

    if let Some(doc) = msg.document() {
        match download(bot, &doc.file.id).await {
            Ok(data) => parts.push(MediaPart {
                mime_type: doc
                    .mime_type
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
                data,
            }),
            Err(e) => tracing::warn!("document download failed: {e}"),
        }
    }

    parts
}

async fn download(bot: &Bot, file_id: &str) -> anyhow::Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    Ok(buf)
}

/// Synthesize the reply as sequential voice chunks replying to the user's
/// message. A failed chunk aborts the remainder with an apology; chunks
/// already sent stay delivered.
async fn send_voice_reply(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    user: &User,
    text: &str,
) -> anyhow::Result<()> {
    let chunks = tts::split_long_text(text, state.config.tts_chunk_chars);
    if chunks.is_empty() {
        return Ok(());
    }

    let voice_pref = &user.language_prefs.0.voice;
    let voice_lang = if voice_pref != "auto" {
        voice_pref.clone()
    } else {
        let (detected, _) = state.translator.detect_language(text).await;
        lang::voice_language(&detected).to_string()
    };

    let progress = if chunks.len() > 1 {
        bot.send_message(
            msg.chat.id,
            format!("🎙 Recording voice 1/{}...", chunks.len()),
        )
        .await
        .ok()
    } else {
        None
    };

    for (i, chunk) in chunks.iter().enumerate() {
        let _ = bot
            .send_chat_action(msg.chat.id, ChatAction::RecordVoice)
            .await;
        if let Some(p) = &progress {
            let _ = bot
                .edit_message_text(
                    msg.chat.id,
                    p.id,
                    format!("🎙 Recording voice {}/{}...", i + 1, chunks.len()),
                )
                .await;
        }

        match state.tts.text_to_speech(chunk, &voice_lang).await {
            Some(audio) => {
                let voice = InputFile::memory(audio).file_name(format!("reply_{}.mp3", i + 1));
                bot.send_voice(msg.chat.id, voice)
                    .reply_parameters(ReplyParameters::new(msg.id))
                    .await?;
            }
            None => {
                bot.send_message(
                    msg.chat.id,
                    "😔 Sorry, I couldn't create the voice message.",
                )
                .await?;
                break;
            }
        }
    }

    if let Some(p) = progress {
        let _ = bot.delete_message(msg.chat.id, p.id).await;
    }

    Ok(())
}

fn default_prompt() -> &'static str {
    BUILTIN_PERSONALITIES
        .iter()
        .find(|(name, _, _)| *name == crate::config::DEFAULT_PERSONALITY)
        .map(|(_, _, prompt)| *prompt)
        .unwrap_or("You are Ananya, a helpful and friendly AI.")
}

fn base(code: &str) -> &str {
    code.split('-').next().unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_mode_message_is_swallowed_silently() {
        assert_eq!(gate_message(true, false), MessageGate::Silent);
        // Admin mode wins even for a blocked row; the admin dispatcher
        // owns the text either way.
        assert_eq!(gate_message(true, true), MessageGate::Silent);
    }

    #[test]
    fn blocked_user_gets_the_fixed_refusal() {
        assert_eq!(gate_message(false, true), MessageGate::Refuse(BLOCKED_REPLY));
    }

    #[test]
    fn regular_user_proceeds_to_the_ai_turn() {
        assert_eq!(gate_message(false, false), MessageGate::Proceed);
    }
}
