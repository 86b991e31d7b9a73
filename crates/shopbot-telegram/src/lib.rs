//! Telegram adapter (teloxide).
//!
//! This crate implements the `shopbot-core` MessagingPort over Telegram Bot API
//! and hosts the update handlers.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode},
    ApiError, RequestError,
};

use tokio::time::sleep;

pub mod dialog;
pub mod handlers;
pub mod router;

use shopbot_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ButtonKind, Keyboard, MessagingCapabilities, PhotoRef},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        Error::Delivery(format!("telegram error: {e}"))
    }

    async fn call<T, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
    ) -> std::result::Result<T, RequestError>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    sleep(d).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn with_retry<T, Fut>(&self, op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        self.call(op).await.map_err(Self::map_err)
    }

    /// Same as `with_retry` but treats "nothing to do" API answers as success.
    async fn with_retry_idempotent<T, Fut>(&self, op: impl FnMut() -> Fut) -> Result<()>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, RequestError>>,
        Fut::IntoFuture: Send,
    {
        match self.call(op).await {
            Ok(_) => Ok(()),
            Err(e) if is_benign(&e) => Ok(()),
            Err(e) => Err(Self::map_err(e)),
        }
    }
}

fn is_benign(e: &RequestError) -> bool {
    matches!(
        e,
        RequestError::Api(ApiError::MessageToDeleteNotFound | ApiError::MessageNotModified)
    )
}

/// Render semantic buttons into Telegram markup. Buttons with an unparsable URL
/// are dropped.
pub fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|b| match &b.kind {
                    ButtonKind::Action(action) => Some(InlineKeyboardButton::callback(
                        b.label.clone(),
                        action.encode(),
                    )),
                    ButtonKind::Url(url) => match reqwest::Url::parse(url) {
                        Ok(u) => Some(InlineKeyboardButton::url(b.label.clone(), u)),
                        Err(e) => {
                            tracing::warn!(url = %url, error = %e, "dropping button with bad url");
                            None
                        }
                    },
                })
                .collect::<Vec<_>>()
        })
        .filter(|row| !row.is_empty())
        .collect();
    InlineKeyboardMarkup::new(rows)
}

fn input_file(photo: &PhotoRef) -> InputFile {
    match photo {
        PhotoRef::FileId(id) => InputFile::file_id(id.clone()),
        PhotoRef::Path(path) => InputFile::file(path.clone()),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
            max_caption_len: 1024,
        }
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.as_ref().map(markup);
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
                    .disable_web_page_preview(true);
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        let markup = keyboard.as_ref().map(markup);
        let msg = self
            .with_retry(|| {
                let mut req = self
                    .bot
                    .send_photo(Self::tg_chat(chat_id), input_file(&photo))
                    .caption(caption_html.to_string())
                    .parse_mode(ParseMode::Html);
                if let Some(m) = &markup {
                    req = req.reply_markup(m.clone());
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_html(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        let markup = keyboard.as_ref().map(markup);
        self.with_retry_idempotent(|| {
            let mut req = self
                .bot
                .edit_message_text(
                    Self::tg_chat(msg.chat_id),
                    Self::tg_msg_id(msg.message_id),
                    html.to_string(),
                )
                .parse_mode(ParseMode::Html)
                .disable_web_page_preview(true);
            if let Some(m) = &markup {
                req = req.reply_markup(m.clone());
            }
            req
        })
        .await
    }

    async fn edit_caption(
        &self,
        msg: MessageRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        let markup = keyboard.as_ref().map(markup);
        self.with_retry_idempotent(|| {
            let mut req = self
                .bot
                .edit_message_caption(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
                .caption(caption_html.to_string())
                .parse_mode(ParseMode::Html);
            if let Some(m) = &markup {
                req = req.reply_markup(m.clone());
            }
            req
        })
        .await
    }

    async fn edit_keyboard(&self, msg: MessageRef, keyboard: Option<Keyboard>) -> Result<()> {
        let markup = keyboard.as_ref().map(markup);
        self.with_retry_idempotent(|| {
            let mut req = self.bot.edit_message_reply_markup(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
            );
            // Omitting the markup removes the keyboard.
            if let Some(m) = &markup {
                req = req.reply_markup(m.clone());
            }
            req
        })
        .await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.with_retry_idempotent(|| {
            self.bot
                .delete_message(Self::tg_chat(msg.chat_id), Self::tg_msg_id(msg.message_id))
        })
        .await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<()> {
        self.with_retry(|| {
            let mut req = self.bot.answer_callback_query(callback_id.to_string());
            if let Some(t) = text {
                req = req.text(t.to_string()).show_alert(alert);
            }
            req
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopbot_core::{actions::Action, messaging::types::Button};

    #[test]
    fn markup_encodes_actions_and_drops_bad_urls() {
        let kb = Keyboard::new(vec![
            vec![
                Button::action("take", Action::TakeRequest(7)),
                Button::action("close", Action::CloseRequest(7)),
            ],
            vec![Button::url("post", "https://t.me/c/123/45")],
            vec![Button::url("broken", "not a url")],
        ]);
        let m = markup(&kb);
        assert_eq!(m.inline_keyboard.len(), 2);
        assert_eq!(m.inline_keyboard[0].len(), 2);
        assert_eq!(m.inline_keyboard[0][0].text, "take");
        assert_eq!(m.inline_keyboard[1][0].text, "post");
    }

    #[test]
    fn benign_errors_are_recognised() {
        assert!(is_benign(&RequestError::Api(
            ApiError::MessageToDeleteNotFound
        )));
        assert!(is_benign(&RequestError::Api(ApiError::MessageNotModified)));
        assert!(!is_benign(&RequestError::Api(ApiError::BotBlocked)));
    }
}
