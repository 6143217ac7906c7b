//! Message Handler module for processing incoming Telegram messages

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, error, info, warn};

use crate::delivery::{DocumentSink, FinalizeError};
use crate::dialogue::{CollectorError, Prompt, Record, SubmitOutcome};
use crate::flows::{FlowKind, FIELD_TITLE};
use crate::localization::{t_args_lang, t_lang};

use super::commands::{parse_command, Command};
use super::ui_builder::{
    format_ack, format_validation, help_message, remove_keyboard, terminator_keyboard,
    welcome_message,
};
use super::BotState;

/// What to send back for one text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text; any custom keyboard is removed
    Text(String),
    /// A prompt, with the terminator keyboard when it has one
    Prompt(Prompt),
    /// The conversation finished; run the finalizer
    Completed { kind: FlowKind, record: Record },
}

/// Decide the reply for a text message without touching the network
pub fn respond_to_text(
    state: &BotState,
    chat_id: ChatId,
    language_code: Option<&str>,
    text: &str,
) -> Result<Reply> {
    match parse_command(text, &state.bot_username) {
        Some(Command::Start) => return Ok(Reply::Text(welcome_message(language_code))),
        Some(Command::Help) => return Ok(Reply::Text(help_message(language_code))),
        Some(Command::Cancel) => {
            let key = if state.collector.cancel(&chat_id) {
                "session-cancelled"
            } else {
                "nothing-to-cancel"
            };
            return Ok(Reply::Text(t_lang(key, language_code)));
        }
        Some(Command::Recipe) => return start_flow(state, chat_id, FlowKind::Recipe, language_code),
        Some(Command::Movie) => return start_flow(state, chat_id, FlowKind::Movie, language_code),
        None => {}
    }

    match state.collector.submit(&chat_id, text) {
        Ok(SubmitOutcome::Prompt(prompt)) => Ok(Reply::Prompt(prompt)),
        Ok(SubmitOutcome::Acknowledged { prompt, collected }) => {
            Ok(Reply::Prompt(format_ack(&prompt, collected, language_code)))
        }
        Ok(SubmitOutcome::Complete(record)) => {
            let kind = record.flow.parse::<FlowKind>().map_err(|e| anyhow!(e))?;
            Ok(Reply::Completed { kind, record })
        }
        Err(CollectorError::NoActiveSession) => {
            Ok(Reply::Text(t_lang("no-session-hint", language_code)))
        }
        Err(CollectorError::Validation { message, prompt }) => {
            debug!(user_id = %chat_id, reason = %message, "Answer rejected, prompting again");
            Ok(Reply::Prompt(format_validation(&message, &prompt)))
        }
        Err(e @ CollectorError::Conflict(_)) => Err(e.into()),
    }
}

fn start_flow(
    state: &BotState,
    chat_id: ChatId,
    kind: FlowKind,
    language_code: Option<&str>,
) -> Result<Reply> {
    let flow = state.flows.get(kind, language_code)?;
    Ok(Reply::Prompt(state.collector.start(chat_id, flow)))
}

/// Sends finished documents to a chat
pub struct TelegramSink {
    bot: Bot,
    chat_id: ChatId,
    caption: Option<String>,
}

impl TelegramSink {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            caption: None,
        }
    }

    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

#[async_trait]
impl DocumentSink for TelegramSink {
    async fn send_document(&self, path: &Path) -> Result<()> {
        let request = self
            .bot
            .send_document(self.chat_id, InputFile::file(path.to_path_buf()));
        match &self.caption {
            Some(caption) => request.caption(caption.clone()).await?,
            None => request.await?,
        };
        Ok(())
    }
}

/// User-facing text for a failed finalizer
pub fn finalize_error_message(err: &FinalizeError, language_code: Option<&str>) -> String {
    match err {
        FinalizeError::Validation(_) => t_lang("error-no-links", language_code),
        _ => t_lang("error-finalize-failed", language_code),
    }
}

/// Send `reply` to the chat. A completed conversation is finalized here.
pub async fn send_reply(
    bot: &Bot,
    chat_id: ChatId,
    state: &BotState,
    reply: Reply,
    language_code: Option<&str>,
) -> Result<()> {
    match reply {
        Reply::Text(text) => {
            bot.send_message(chat_id, text)
                .reply_markup(remove_keyboard())
                .await?;
        }
        Reply::Prompt(Prompt {
            text,
            terminator: Some(terminator),
        }) => {
            bot.send_message(chat_id, text)
                .reply_markup(terminator_keyboard(&terminator))
                .await?;
        }
        Reply::Prompt(Prompt {
            text,
            terminator: None,
        }) => {
            bot.send_message(chat_id, text)
                .reply_markup(remove_keyboard())
                .await?;
        }
        Reply::Completed { kind, record } => {
            // The session is already gone; the record must reach the finalizer regardless
            if let Err(e) = bot
                .send_message(chat_id, t_lang("generating-document", language_code))
                .reply_markup(remove_keyboard())
                .await
            {
                warn!(user_id = %chat_id, flow = %kind, error = %e, "Failed to send status message");
            }

            let title = record.field(FIELD_TITLE).unwrap_or_default().trim();
            let sink = TelegramSink::new(bot.clone(), chat_id).caption(t_args_lang(
                "document-sent",
                &[("title", title)],
                language_code,
            ));
            match state.finalizer(kind).finalize(&record, &sink).await {
                Ok(delivered) => {
                    info!(user_id = %chat_id, flow = %kind, file_name = %delivered.file_name, bytes = delivered.bytes, "Document delivered");
                }
                Err(e) => {
                    error!(user_id = %chat_id, flow = %kind, error = %e, "Finalizer failed");
                    bot.send_message(chat_id, finalize_error_message(&e, language_code))
                        .await?;
                }
            }
        }
    }
    Ok(())
}

async fn handle_text_message(
    bot: &Bot,
    msg: &Message,
    state: &BotState,
    text: &str,
) -> Result<()> {
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");

    // Extract user's language code from Telegram
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    let reply = respond_to_text(state, msg.chat.id, language_code, text)?;
    send_reply(bot, msg.chat.id, state, reply, language_code).await
}

async fn handle_non_text_message(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    let language_code = msg
        .from
        .as_ref()
        .and_then(|user| user.language_code.as_deref());

    debug!(user_id = %msg.chat.id, "Received non-text message from user");

    let key = if state.collector.is_active(&msg.chat.id) {
        "text-only"
    } else {
        "unsupported-message"
    };
    bot.send_message(msg.chat.id, t_lang(key, language_code))
        .await?;
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> Result<()> {
    match msg.text() {
        Some(text) => handle_text_message(&bot, &msg, &state, text).await,
        None => handle_non_text_message(&bot, &msg, &state).await,
    }
}
