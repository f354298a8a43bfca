use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::OutgoingPhoto,
    Result,
};

/// Outbound messaging port.
///
/// Telegram is the only implementation; tests substitute a recording fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Upload a photo by its binary contents.
    async fn send_photo(&self, chat_id: ChatId, photo: OutgoingPhoto) -> Result<MessageRef>;
}
