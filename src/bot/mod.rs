pub mod admin;
pub mod callbacks;
pub mod commands;
pub mod errors;
pub mod handlers;
pub mod session;

use std::sync::Arc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::prelude::*;

use crate::ai::{gemini::GeminiClient, translate::Translator, tts::TtsManager};
use crate::config::AppConfig;
use crate::db::{cache::UserCache, Database};
use errors::ErrorReporter;
use session::SessionTracker;

/// Shared application state, accessible from all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub cache: UserCache,
    pub sessions: SessionTracker,
    pub gemini: GeminiClient,
    pub translator: Translator,
    pub tts: TtsManager,
    pub errors: ErrorReporter,
}

/// Build the teloxide update handler tree.
///
/// Branch order matters: the admin-dialog branch must run before the chat
/// branch, because a wizard answer is plain text with no structural marker
/// and is distinguished only by the sender's live dialog state.
pub fn build_handler() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    let command_handler = Update::filter_message()
        .filter_command::<commands::BotCommand>()
        .endpoint(commands::handle_command);

    let callback_handler = Update::filter_callback_query()
        .endpoint(callbacks::handle_callback);

    let admin_dialog_handler = Update::filter_message()
        .filter(|msg: Message, state: Arc<AppState>| {
            msg.from
                .as_ref()
                .map(|u| state.sessions.is_in_admin_mode(u.id.0 as i64))
                .unwrap_or(false)
        })
        .endpoint(admin::handle_admin_message);

    let message_handler = Update::filter_message()
        .endpoint(handlers::handle_message);

    dptree::entry()
        .branch(command_handler)
        .branch(callback_handler)
        .branch(admin_dialog_handler)
        .branch(message_handler)
}
