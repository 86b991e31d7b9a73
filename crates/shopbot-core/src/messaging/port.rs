use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{Keyboard, MessagingCapabilities, PhotoRef},
    Result,
};

/// Outbound messaging gateway.
///
/// The core supplies structured content (recipient, HTML text, semantic
/// buttons); the adapter owns markup rendering. Every call returns
/// `Error::Delivery` on failure so callers can decide whether to propagate or
/// to log and move on.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef>;

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef>;

    async fn edit_html(&self, msg: MessageRef, html: &str, keyboard: Option<Keyboard>)
        -> Result<()>;

    async fn edit_caption(
        &self,
        msg: MessageRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()>;

    /// Replace (or with `None`, remove) the inline keyboard of a message.
    async fn edit_keyboard(&self, msg: MessageRef, keyboard: Option<Keyboard>) -> Result<()>;

    /// Idempotent: deleting an already gone message is not an error.
    async fn delete_message(&self, msg: MessageRef) -> Result<()>;

    async fn answer_callback(&self, callback_id: &str, text: Option<&str>, alert: bool)
        -> Result<()>;
}
