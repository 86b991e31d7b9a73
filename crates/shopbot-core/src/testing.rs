//! Test doubles shared by the service tests.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    config::Config,
    domain::{ChatId, Identity, MessageId, MessageRef, User},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Keyboard, MessagingCapabilities, PhotoRef},
    },
    store::{MemoryStore, ShopStore},
    Result, Shop,
};

#[derive(Clone, Debug)]
pub struct Sent {
    pub msg: MessageRef,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub photo: bool,
}

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    pub sends: Mutex<Vec<Sent>>,
    pub edits: Mutex<Vec<(MessageRef, String)>>,
    pub keyboard_edits: Mutex<Vec<(MessageRef, Option<Keyboard>)>>,
    pub deletes: Mutex<Vec<MessageRef>>,
    failing_chats: Mutex<HashSet<i64>>,
    failing_deletes: Mutex<bool>,
}

impl FakeMessenger {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Default::default()
        }
    }

    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        let id = *guard;
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(id),
        }
    }

    /// Sends to this chat fail with `Error::Delivery`.
    pub fn fail_chat(&self, chat: i64) {
        self.failing_chats.lock().unwrap().insert(chat);
    }

    /// Deletes fail with `Error::Delivery` (not "already gone").
    pub fn fail_deletes(&self) {
        *self.failing_deletes.lock().unwrap() = true;
    }

    pub fn sent_to(&self, chat: i64) -> Vec<Sent> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.msg.chat_id == ChatId(chat))
            .cloned()
            .collect()
    }

    pub fn edits_of(&self, msg: MessageRef) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| *m == msg)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageRef> {
        self.deletes.lock().unwrap().clone()
    }

    fn record_send(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<Keyboard>,
        photo: bool,
    ) -> Result<MessageRef> {
        if self.failing_chats.lock().unwrap().contains(&chat_id.0) {
            return Err(Error::Delivery(format!("chat {} unreachable", chat_id.0)));
        }
        let msg = self.alloc(chat_id);
        self.sends.lock().unwrap().push(Sent {
            msg,
            text: text.to_string(),
            keyboard,
            photo,
        });
        Ok(msg)
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
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
        self.record_send(chat_id, html, keyboard, false)
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        _photo: PhotoRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        self.record_send(chat_id, caption_html, keyboard, true)
    }

    async fn edit_html(&self, msg: MessageRef, html: &str, _keyboard: Option<Keyboard>) -> Result<()> {
        self.edits.lock().unwrap().push((msg, html.to_string()));
        Ok(())
    }

    async fn edit_caption(
        &self,
        msg: MessageRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.edits.lock().unwrap().push((msg, caption_html.to_string()));
        self.keyboard_edits.lock().unwrap().push((msg, keyboard));
        Ok(())
    }

    async fn edit_keyboard(&self, msg: MessageRef, keyboard: Option<Keyboard>) -> Result<()> {
        self.keyboard_edits.lock().unwrap().push((msg, keyboard));
        Ok(())
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.deletes.lock().unwrap().push(msg);
        if *self.failing_deletes.lock().unwrap() {
            return Err(Error::Delivery("delete failed".to_string()));
        }
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        _text: Option<&str>,
        _alert: bool,
    ) -> Result<()> {
        Ok(())
    }
}

/// A wired shop over the in-memory store and the fake messenger.
pub struct Harness {
    pub shop: Shop,
    pub store: Arc<MemoryStore>,
    pub api: Arc<FakeMessenger>,
}

pub const ADMIN_A: i64 = 100;
pub const ADMIN_B: i64 = 200;
pub const ADMIN_C: i64 = 300;

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::for_admins(vec![ADMIN_A, ADMIN_B, ADMIN_C]))
    }

    pub fn with_config(cfg: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(FakeMessenger::new());
        let shop = Shop::new(
            Arc::new(cfg),
            store.clone() as Arc<dyn ShopStore>,
            api.clone() as Arc<dyn MessagingPort>,
        );
        Self { shop, store, api }
    }

    pub async fn user(&self, tg_id: i64) -> User {
        self.shop
            .users
            .resolve(&Identity {
                tg_id,
                username: Some(format!("u{tg_id}")),
                full_name: Some(format!("User {tg_id}")),
            })
            .await
            .unwrap()
    }
}
