//! Text formatting for Telegram HTML messages (prices, dates, status badges).

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::{domain::RequestStatus, errors::Error, Result};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `10000` → `10.000 руб.`
pub fn format_price_rub(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{sign}{grouped} руб.")
}

static NON_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9]").expect("valid regex"));

/// Parse a human-entered price: every non-digit is dropped ("10 000 ₽" → 10000).
pub fn parse_price(text: &str) -> Result<i64> {
    let cleaned = NON_DIGITS_RE.replace_all(text, "");
    if cleaned.is_empty() {
        return Err(Error::Validation("Некорректная цена. Введите число".to_string()));
    }
    cleaned
        .parse::<i64>()
        .map_err(|_| Error::Validation("Слишком большая цена".to_string()))
}

/// `dd.mm.YYYY HH:MM` (UTC) or a dash for missing values.
pub fn fmt_dt(dt: Option<DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.format("%d.%m.%Y %H:%M").to_string(),
        None => "—".to_string(),
    }
}

/// Compact duration: `2д 3ч`, `1ч 5м`, `7м`.
pub fn format_elapsed(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let mins = (seconds % 3600) / 60;
    if days > 0 {
        return format!("{days}д {hours}ч");
    }
    if hours > 0 {
        return format!("{hours}ч {mins}м");
    }
    format!("{mins}м")
}

pub fn status_icon(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "🟢",
        RequestStatus::Processing => "🟠",
        RequestStatus::Done => "🔴",
    }
}

pub fn status_name(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "Новая",
        RequestStatus::Processing => "В работе",
        RequestStatus::Done => "Закрыта",
    }
}

pub fn status_badge(status: RequestStatus) -> String {
    format!("{} {}", status_icon(status), status_name(status))
}

pub fn availability_dot(active: bool) -> &'static str {
    if active {
        "🟢"
    } else {
        "🔴"
    }
}

/// Truncate on a char boundary, appending `…` when shortened.
pub fn truncate_title(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
