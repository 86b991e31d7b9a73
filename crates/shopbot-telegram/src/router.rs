use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use shopbot_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use shopbot_core::{
    config::Config, messaging::port::MessagingPort, security::RateLimiter, store::ShopStore, Shop,
};

use crate::dialog::Dialogs;
use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub shop: Arc<Shop>,
    pub messenger: Arc<dyn MessagingPort>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub chat_locks: Arc<ChatLocks>,
    pub dialogs: Arc<Dialogs>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, store: Arc<dyn ShopStore>, messenger: Arc<dyn MessagingPort>) -> Self {
        let shop = Arc::new(Shop::new(cfg.clone(), store, messenger.clone()));
        Self {
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                cfg.rate_limit_enabled,
                cfg.rate_limit_requests,
                cfg.rate_limit_window,
            ))),
            cfg,
            shop,
            messenger,
            chat_locks: Arc::new(ChatLocks::default()),
            dialogs: Arc::new(Dialogs::default()),
        }
    }
}

/// Locks nobody holds or waits on are dropped once the map grows past this.
const PRUNE_AT: usize = 1024;

#[derive(Default)]
struct LockMap {
    map: HashMap<i64, Arc<Mutex<()>>>,
    prune_at: usize,
}

/// Serializes updates of one chat so dialog steps apply in order.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<LockMap>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            if locks.map.len() >= locks.prune_at.max(PRUNE_AT) {
                locks.map.retain(|_, l| Arc::strong_count(l) > 1);
                locks.prune_at = locks.map.len() * 2;
            }
            locks
                .map
                .entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn ShopStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "shopbot started"),
        Err(e) => tracing::warn!(error = %e, "getMe failed"),
    }
    tracing::info!(admins = cfg.admins.len(), group_id = cfg.group_id, "configuration");
    if cfg.group_id == 0 {
        tracing::warn!("GROUP_ID is not set; lots cannot be published");
    }

    // Fan-out and panel refreshes come in bursts; the adapter still retries
    // once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState::new(cfg, store, messenger));

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn chat_lock_serializes_same_chat_only() {
        let locks = Arc::new(ChatLocks::default());
        let guard = locks.lock_chat(1).await;

        // Another chat is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(2)).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(same.is_err());

        drop(guard);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(1)).await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn released_chat_locks_are_pruned() {
        let locks = ChatLocks::default();
        let held = locks.lock_chat(-1).await;
        // Fills the map up to the threshold without crossing it.
        for chat in 0..(PRUNE_AT as i64 - 1) {
            drop(locks.lock_chat(chat).await);
        }
        let _next = locks.lock_chat(PRUNE_AT as i64).await;

        let guard = locks.inner.lock().await;
        assert_eq!(guard.map.len(), 2);
        assert!(guard.map.contains_key(&-1));
        drop(held);
    }
}
