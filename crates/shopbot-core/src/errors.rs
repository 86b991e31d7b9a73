/// Core error type for the shop bot.
///
/// Adapter crates map their specific errors into this type (`sqlx::Error` into
/// `Storage`, Telegram request errors into `Delivery`) so handlers can decide
/// between a short user-facing reply and a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("delivery error: {0}")]
    Delivery(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Short text suitable for a callback alert or a chat reply.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotFound(what) => format!("❌ Не найдено: {what}"),
            Error::Conflict(why) => format!("⚠️ {why}"),
            Error::Validation(why) => format!("❌ {why}"),
            Error::Delivery(_) => "⚠️ Не удалось отправить сообщение".to_string(),
            _ => "⚠️ Внутренняя ошибка, попробуйте позже".to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_hides_internal_details() {
        let e = Error::Storage("database is locked".to_string());
        assert!(!e.user_message().contains("locked"));

        let e = Error::Conflict("Заявка уже в работе".to_string());
        assert!(e.user_message().contains("уже в работе"));
        assert!(e.is_conflict());
    }
}
