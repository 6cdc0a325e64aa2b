use std::sync::Arc;

use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

mod admin;
mod ai;
mod bot;
mod config;
mod db;
mod tasks;

use config::AppConfig;
use db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🤖 Starting Ananya bot...");

    // Load config
    let config = AppConfig::from_env()?;
    tracing::info!("Config loaded. Default model: {}", config.default_model);

    // Initialize database
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!("Database connected and migrations applied.");

    // Bootstrap admin and built-in personalities
    if db.add_admin(config.admin_user_id, None).await? {
        tracing::info!("bootstrap admin {} registered", config.admin_user_id);
    }
    admin::personality::initialize_defaults(&db).await?;

    // Initialize AI clients
    let gemini = ai::gemini::GeminiClient::new(&config.gemini_api_key);
    let translator = ai::translate::Translator::new(config.google_api_key.clone());
    let tts_manager = ai::tts::TtsManager::new(config.google_api_key.clone());

    // Build shared application state
    let state = Arc::new(bot::AppState {
        errors: bot::errors::ErrorReporter::new(config.admin_user_id),
        cache: db::cache::UserCache::new(),
        sessions: bot::session::SessionTracker::new(),
        gemini,
        translator,
        tts: tts_manager,
        db,
        config,
    });

    let background = tasks::spawn_background_tasks(state.clone());

    // Create the Telegram bot
    let bot = Bot::new(&state.config.telegram_bot_token);

    // Build the dispatcher
    let handler = bot::build_handler();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Dispatch returned (ctrl-c): stop background work, then release the
    // pool exactly once.
    for task in background {
        task.abort();
    }
    state.db.pool.close().await;
    tracing::info!("Shutdown complete.");

    Ok(())
}
