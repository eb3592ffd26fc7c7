mod api;
mod auth;
mod bot;
mod config;
mod error;
mod format;
mod notify;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::ApiState;
use crate::auth::AllowList;
use crate::bot::BotState;
use crate::config::Config;
use crate::notify::{Notifier, TelegramTransport};
use crate::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let allow_list = AllowList::parse(&config.telegram.allowed_usernames);
    if allow_list.is_empty() {
        warn!("Allow-list is empty: nobody can read lead data through the bot");
    }

    info!("Configuration loaded successfully");
    info!("  Database: {}", config.database.path.display());
    info!("  API port: {}", config.server.port);
    info!("  Allowed operators: {}", allow_list.len());

    // Open the store and bring the schema up to date
    let store = Store::open(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;

    let bot = Bot::new(&config.telegram.bot_token);

    let notifier = Notifier::new(
        store.clone(),
        Arc::new(TelegramTransport::new(bot.clone())),
    );

    // Lead intake API runs beside the bot dispatcher
    let api_state = ApiState {
        store: store.clone(),
        notifier,
    };
    let port = config.server.port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!("API server exited: {:#}", e);
        }
    });

    // Run the Telegram bot
    info!("Bot is starting...");
    let state = Arc::new(BotState::new(store, allow_list));
    bot::run(bot, state).await?;

    Ok(())
}
