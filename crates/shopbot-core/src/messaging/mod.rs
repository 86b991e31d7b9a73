//! Messaging gateway abstractions (Telegram adapter lives in `shopbot-telegram`).

pub mod port;
pub mod throttled;
pub mod types;
