//! Telegram update handlers.
//!
//! Only the three bot commands are answered; any other message, and commands
//! addressed to another bot, are ignored.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use blob_core::messaging::types::BotCommand;

use crate::router::AppState;

mod commands;

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(cmd) = BotCommand::parse(text, state.bot_username.as_deref()) else {
        return Ok(());
    };

    commands::handle_command(msg.chat.id.0, cmd, state).await
}
