use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{Keyboard, MessagingCapabilities, PhotoRef},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat.
    pub per_chat_min_interval: Duration,
    /// Group chats are limited to ~20 messages per minute.
    pub group_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),     // ~25/sec
            per_chat_min_interval: Duration::from_millis(250),  // bursts of panel edits
            group_min_interval: Duration::from_millis(3000),    // ~20/min
        }
    }
}

/// Idle per-chat limiters are dropped once the map grows past this.
const PRUNE_AT: usize = 1024;

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

struct ChatLimiters {
    map: HashMap<i64, Arc<Mutex<IntervalLimiter>>>,
    prune_at: usize,
}

impl ChatLimiters {
    /// A limiter nobody holds and whose slot has passed is as good as new.
    fn prune(&mut self) {
        let now = Instant::now();
        self.map.retain(|_, lim| {
            Arc::strong_count(lim) > 1 || lim.try_lock().map_or(true, |l| l.next > now)
        });
        self.prune_at = (self.map.len() * 2).max(PRUNE_AT);
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// Fan-out to many admins plus panel refreshes can burst; this keeps the bot
/// under Telegram's flood limits in the common case. It does not guarantee
/// zero 429s (the adapter still retries once on `RetryAfter`).
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<ChatLimiters>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(ChatLimiters {
                map: HashMap::new(),
                prune_at: PRUNE_AT,
            }),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        // Negative ids are groups/channels.
        let interval = if chat_id < 0 {
            self.cfg.group_min_interval
        } else {
            self.cfg.per_chat_min_interval
        };
        let mut chats = self.per_chat.lock().await;
        if chats.map.len() >= chats.prune_at {
            chats.prune();
        }
        chats
            .map
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(IntervalLimiter::new(interval))))
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_html(chat_id, html, keyboard).await
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        photo: PhotoRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        self.throttle_chat(chat_id.0).await;
        self.inner
            .send_photo(chat_id, photo, caption_html, keyboard)
            .await
    }

    async fn edit_html(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_html(msg, html, keyboard).await
    }

    async fn edit_caption(
        &self,
        msg: MessageRef,
        caption_html: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_caption(msg, caption_html, keyboard).await
    }

    async fn edit_keyboard(&self, msg: MessageRef, keyboard: Option<Keyboard>) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.edit_keyboard(msg, keyboard).await
    }

    async fn delete_message(&self, msg: MessageRef) -> Result<()> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.delete_message(msg).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        alert: bool,
    ) -> Result<()> {
        // No chat_id available here; apply global throttling only.
        self.throttle_global().await;
        self.inner.answer_callback(callback_id, text, alert).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limiter_spaces_consecutive_reservations() {
        let mut lim = IntervalLimiter::new(Duration::from_millis(100));
        assert_eq!(lim.reserve(), Duration::ZERO);
        let second = lim.reserve();
        assert!(second > Duration::from_millis(50));
        assert!(second <= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn idle_chat_limiters_are_pruned() {
        let cfg = ThrottleConfig {
            global_min_interval: Duration::ZERO,
            per_chat_min_interval: Duration::ZERO,
            group_min_interval: Duration::ZERO,
        };
        let api = Arc::new(crate::testing::FakeMessenger::new());
        let throttled = ThrottledMessenger::new(api, cfg);

        for chat in 0..(PRUNE_AT as i64 + 10) {
            throttled.send_html(ChatId(chat), "hi", None).await.unwrap();
        }
        let left = throttled.per_chat.lock().await.map.len();
        assert!(left <= 10, "{left} limiters kept");
    }
}
