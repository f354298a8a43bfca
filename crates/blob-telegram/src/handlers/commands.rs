use std::sync::Arc;

use teloxide::prelude::ResponseResult;
use tracing::{error, info};

use blob_core::{domain::ChatId, messaging::types::BotCommand};

use crate::router::AppState;

/// Run one command to completion for a chat.
///
/// Commands for the same chat are serialized, so a `/daily` cannot interleave
/// its cancel and register steps with another `/daily` or `/stopdaily`.
/// Failures are logged and swallowed; the dispatcher keeps running.
pub async fn handle_command(
    chat_id: i64,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let _guard = state.chat_locks.lock_chat(chat_id).await;
    info!(chat = chat_id, command = cmd.name(), "command received");

    let chat = ChatId(chat_id);
    let res = match cmd {
        BotCommand::Start => state.bot.send_meme(chat).await,
        BotCommand::Daily => state.bot.subscribe(chat).await,
        BotCommand::StopDaily => state.bot.unsubscribe(chat).await,
    };

    if let Err(e) = res {
        error!(chat = chat_id, command = cmd.name(), "command failed: {e}");
    }
    Ok(())
}
