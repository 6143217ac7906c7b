use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recipe_pages::bot::{message_handler, BotState};
use recipe_pages::config::{BotConfig, SessionConfig, UpdateSource};
use recipe_pages::localization::init_localization;
use recipe_pages::metadata::{MetadataProvider, OmdbClient};

fn spawn_session_sweeper(state: Arc<BotState>, sessions: SessionConfig) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(sessions.sweep_secs));
        loop {
            interval.tick().await;
            let expired = state.collector.expire_idle(sessions.idle_timeout());
            if expired > 0 {
                info!(expired, remaining = state.collector.active_sessions(), "Swept idle sessions");
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Recipe Pages Telegram Bot");

    init_localization().context("Failed to load localization resources")?;
    let config = BotConfig::from_env().context("Invalid configuration")?;

    let metadata: Option<Arc<dyn MetadataProvider>> = match &config.metadata.api_key {
        Some(api_key) => Some(Arc::new(OmdbClient::new(
            api_key.clone(),
            config.metadata.base_url.clone(),
            config.metadata.recovery.clone(),
        ))),
        None => {
            warn!("OMDB_API_KEY not set, movie pages will be rendered without metadata");
            None
        }
    };

    let bot = Bot::new(&config.bot_token);
    let me = bot.get_me().await.context("Failed to reach Telegram")?;
    let bot_username = me.user.username.clone().unwrap_or_default();
    info!(bot_username = %bot_username, "Bot initialized");

    let state = Arc::new(BotState::new(bot_username, metadata));
    spawn_session_sweeper(Arc::clone(&state), config.sessions.clone());

    let handler = Update::filter_message().endpoint(message_handler);
    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match config.update_source {
        UpdateSource::Webhook { url, address } => {
            info!(%address, url = %url, "Starting webhook listener");
            let listener = webhooks::axum(bot, webhooks::Options::new(address, url))
                .await
                .context("Failed to set up webhook")?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        UpdateSource::Polling => {
            info!("Starting long polling");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}
