use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{InputFile, KeyboardButton, KeyboardMarkup};
use tracing::{error, info, warn};

use crate::auth::{Access, AllowList};
use crate::error::Result as StoreResult;
use crate::format;
use crate::store::Store;

const BTN_LIST_TEXT: &str = "📋 Leads list (text)";
const BTN_DOWNLOAD_CSV: &str = "📂 Download CSV (.csv)";

/// How many leads the text reply shows.
const RECENT_LIMIT: i64 = 10;

/// Shared bot state, constructed once at startup.
pub struct BotState {
    store: Store,
    allow_list: AllowList,
}

impl BotState {
    pub fn new(store: Store, allow_list: AllowList) -> Self {
        Self { store, allow_list }
    }
}

/// Start the Telegram bot dispatcher. Blocks until shutdown.
pub async fn run(bot: Bot, state: Arc<BotState>) -> Result<()> {
    info!("Starting Telegram bot...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instruction {
    ListText,
    DownloadCsv,
}

/// Free-text routing over the button labels and their loose equivalents.
/// The CSV match runs first so "Download CSV" never falls into the text list.
fn parse_instruction(text: &str) -> Option<Instruction> {
    let trimmed = text.trim();
    // Legacy command, kept for operators used to the old bot
    if trimmed == "/leads" {
        return Some(Instruction::DownloadCsv);
    }

    let lower = trimmed.to_lowercase();
    if ["excel", "csv", "download", "скачать"]
        .iter()
        .any(|p| lower.contains(p))
    {
        return Some(Instruction::DownloadCsv);
    }
    if ["list", "text", "список", "текст"]
        .iter()
        .any(|p| lower.contains(p))
    {
        return Some(Instruction::ListText);
    }
    None
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user.clone(),
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    if text == "/start" || text == "/help" {
        return handle_start(&bot, &msg, &state, &user).await;
    }

    // Everything past this point requires allow-list membership. The denial
    // reply is per-invocation; /start has its own denial path above.
    match state.allow_list.check(user.username.as_deref()) {
        Access::Granted(_) => {}
        _ => {
            warn!(
                "Denied command from {:?} (ID: {}): {}",
                user.username, user.id, text
            );
            bot.send_message(msg.chat.id, "You do not have access.")
                .await?;
            return Ok(());
        }
    }

    match parse_instruction(&text) {
        Some(Instruction::ListText) => send_leads_text(&bot, &msg, &state).await,
        Some(Instruction::DownloadCsv) => send_leads_csv(&bot, &msg, &state).await,
        None => Ok(()),
    }
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    user: &teloxide::types::User,
) -> ResponseResult<()> {
    match state.allow_list.check(user.username.as_deref()) {
        Access::Granted(username) => {
            // Membership is the gate; a failed upsert must not lock the
            // operator out, the next /start simply retries it.
            match directory_id(user.id.0) {
                Some(telegram_id) => {
                    if let Err(e) = state.store.upsert_bot_user(telegram_id, &username).await {
                        error!("Failed to save bot user {} ({}): {}", username, user.id, e);
                    }
                }
                None => {
                    warn!(
                        "Telegram id {} does not fit the bot user directory",
                        user.id
                    );
                }
            }

            let keyboard = KeyboardMarkup::new(vec![
                vec![KeyboardButton::new(BTN_LIST_TEXT)],
                vec![KeyboardButton::new(BTN_DOWNLOAD_CSV)],
            ])
            .resize_keyboard();

            bot.send_message(msg.chat.id, "Welcome! You are authorized.")
                .reply_markup(keyboard)
                .await?;
        }
        Access::NoUsername => {
            bot.send_message(
                msg.chat.id,
                "You have no Telegram username set. Please set one in your settings.",
            )
            .await?;
        }
        Access::Denied => {
            warn!(
                "Access attempt: {:?} (ID: {})",
                user.username, user.id
            );
            bot.send_message(
                msg.chat.id,
                "Access denied. Your username is not on the allow-list.",
            )
            .await?;
        }
    }
    Ok(())
}

/// Telegram user ids fit the directory's signed id column per the Bot API;
/// anything larger is rejected rather than wrapped.
fn directory_id(raw: u64) -> Option<i64> {
    i64::try_from(raw).ok()
}

/// What a lead query answers with. Decided separately from the teloxide
/// glue so the empty-state rule stays unit-testable.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LeadReply {
    Empty,
    Text(String),
    Csv { filename: String, content: String },
}

async fn build_text_reply(store: &Store) -> StoreResult<LeadReply> {
    let leads = store.list_recent_leads(RECENT_LIMIT).await?;
    if leads.is_empty() {
        return Ok(LeadReply::Empty);
    }
    Ok(LeadReply::Text(format::leads_text(&leads)))
}

async fn build_csv_reply(store: &Store) -> StoreResult<LeadReply> {
    let leads = store.list_all_leads().await?;
    if leads.is_empty() {
        return Ok(LeadReply::Empty);
    }
    Ok(LeadReply::Csv {
        filename: format::csv_filename(Utc::now()),
        content: format::leads_csv(&leads),
    })
}

async fn send_reply(bot: &Bot, msg: &Message, reply: LeadReply) -> ResponseResult<()> {
    match reply {
        LeadReply::Empty => {
            bot.send_message(msg.chat.id, format::EMPTY_STATE).await?;
        }
        LeadReply::Text(text) => {
            bot.send_message(msg.chat.id, text).await?;
        }
        LeadReply::Csv { filename, content } => {
            let file = InputFile::memory(content.into_bytes()).file_name(filename);
            bot.send_document(msg.chat.id, file).await?;
        }
    }
    Ok(())
}

async fn send_leads_text(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    match build_text_reply(&state.store).await {
        Ok(reply) => send_reply(bot, msg, reply).await,
        Err(e) => {
            error!("Failed to fetch leads (text): {}", e);
            bot.send_message(msg.chat.id, "Failed to fetch lead data.")
                .await?;
            Ok(())
        }
    }
}

async fn send_leads_csv(bot: &Bot, msg: &Message, state: &BotState) -> ResponseResult<()> {
    match build_csv_reply(&state.store).await {
        Ok(reply) => send_reply(bot, msg, reply).await,
        Err(e) => {
            error!("Failed to fetch leads (CSV): {}", e);
            bot.send_message(msg.chat.id, "Failed to build the export file.")
                .await?;
            Ok(())
        }
    }
}
