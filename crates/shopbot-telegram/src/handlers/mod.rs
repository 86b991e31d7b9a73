//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - resolves the sender into a shop `User`
//! - checks admin rights / rate limits
//! - calls into the `shopbot-core` services
//! - renders the result through the `MessagingPort`

use std::{path::Path, sync::Arc};

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use shopbot_core::{
    domain::{ChatId, Identity, MessageRef, User},
    messaging::types::{Keyboard, PhotoRef},
    Error, Result,
};

use crate::router::AppState;

mod callback;
mod client;
mod commands;
mod lots;
mod photo;
mod raffles;
mod requests;
mod text;

/// Everything a handler needs about the current update.
pub(crate) struct Ctx {
    pub state: Arc<AppState>,
    pub chat: ChatId,
    /// Message that carried the pressed button (callbacks only).
    pub msg: Option<MessageRef>,
    pub user: User,
}

/// How to answer a callback query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Answer {
    Silent,
    Toast(String),
    Alert(String),
}

impl Answer {
    pub fn toast(s: impl Into<String>) -> Self {
        Answer::Toast(s.into())
    }

    pub fn alert(s: impl Into<String>) -> Self {
        Answer::Alert(s.into())
    }
}

pub(crate) fn identity(u: &teloxide::types::User) -> Identity {
    Identity {
        tg_id: u.id.0 as i64,
        username: u.username.clone(),
        full_name: Some(u.full_name()).filter(|s| !s.trim().is_empty()),
    }
}

/// Storage and delivery problems are ours; everything else is the user's.
pub(crate) fn log_failure(context: &str, e: &Error) {
    match e {
        Error::Storage(_) | Error::Delivery(_) | Error::Io(_) | Error::Json(_) | Error::Config(_) => {
            tracing::warn!(context, error = %e, "handler failed")
        }
        _ => tracing::debug!(context, error = %e, "handler rejected input"),
    }
}

impl Ctx {
    pub fn is_admin(&self) -> bool {
        shopbot_core::security::is_admin(Some(self.user.tg_id), &self.state.cfg.admins)
    }

    pub async fn delete_quietly(&self, msg: Option<MessageRef>) {
        if let Some(m) = msg {
            if let Err(e) = self.state.messenger.delete_message(m).await {
                tracing::debug!(error = %e, "delete failed");
            }
        }
    }

    /// Replace the current message with a photo panel. Falls back to a text
    /// message when the photo cannot be sent.
    pub async fn show_photo_panel(
        &self,
        photo: &Path,
        caption: &str,
        keyboard: Keyboard,
    ) -> Result<MessageRef> {
        self.delete_quietly(self.msg).await;
        let photo = PhotoRef::guess(&photo.to_string_lossy());
        match self
            .state
            .messenger
            .send_photo(self.chat, photo, caption, Some(keyboard.clone()))
            .await
        {
            Ok(m) => Ok(m),
            Err(e) => {
                tracing::debug!(error = %e, "panel photo unavailable, sending text");
                self.state
                    .messenger
                    .send_html(self.chat, caption, Some(keyboard))
                    .await
            }
        }
    }

    /// Edit the current message's caption in place, or fall back to text.
    pub async fn show_caption(&self, caption: &str, keyboard: Keyboard) -> Result<MessageRef> {
        if let Some(m) = self.msg {
            match self
                .state
                .messenger
                .edit_caption(m, caption, Some(keyboard.clone()))
                .await
            {
                Ok(()) => return Ok(m),
                Err(e) => tracing::debug!(error = %e, "caption edit failed, trying text"),
            }
        }
        self.show_text(caption, keyboard).await
    }

    /// Edit the current text message in place, or replace it with a new one.
    pub async fn show_text(&self, html: &str, keyboard: Keyboard) -> Result<MessageRef> {
        if let Some(m) = self.msg {
            match self
                .state
                .messenger
                .edit_html(m, html, Some(keyboard.clone()))
                .await
            {
                Ok(()) => return Ok(m),
                Err(e) => tracing::debug!(error = %e, "text edit failed, resending"),
            }
            self.delete_quietly(Some(m)).await;
        }
        self.state
            .messenger
            .send_html(self.chat, html, Some(keyboard))
            .await
    }

    pub async fn say(&self, html: &str, keyboard: Option<Keyboard>) -> Result<MessageRef> {
        self.state.messenger.send_html(self.chat, html, keyboard).await
    }
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(_bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(from) = msg.from() else {
        return Ok(());
    };
    // Group chatter (including our own lot posts) is not for us.
    if !msg.chat.is_private() {
        return Ok(());
    }

    let chat_id = msg.chat.id.0;
    let _guard = state.chat_locks.lock_chat(chat_id).await;

    let user = match state.shop.users.resolve(&identity(from)).await {
        Ok(u) => u,
        Err(e) => {
            log_failure("resolve user", &e);
            return Ok(());
        }
    };
    let ctx = Ctx {
        state: state.clone(),
        chat: ChatId(chat_id),
        msg: None,
        user,
    };
    let incoming = MessageRef::new(chat_id, msg.id.0);

    let res = if let Some(t) = msg.text().filter(|t| t.starts_with('/')) {
        commands::handle_command(&ctx, incoming, t).await
    } else if let Some(photos) = msg.photo() {
        let file_id = photos.last().map(|p| p.file.id.clone()).unwrap_or_default();
        photo::handle_photo(&ctx, incoming, &file_id).await
    } else if let Some(t) = msg.text() {
        text::handle_text(&ctx, incoming, t).await
    } else {
        Ok(())
    };

    if let Err(e) = res {
        log_failure("message", &e);
        let _ = ctx.say(&e.user_message(), None).await;
    }
    Ok(())
}

