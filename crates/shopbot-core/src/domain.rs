use std::fmt;

use chrono::{DateTime, Utc};

use crate::{errors::Error, Result};

/// Telegram chat id (numeric). Private chats share the user's id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a delivered Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat_id: i64, message_id: i32) -> Self {
        Self {
            chat_id: ChatId(chat_id),
            message_id: MessageId(message_id),
        }
    }
}

/// Identity of a platform user as seen in an incoming update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub tg_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
}

impl Identity {
    pub fn new(tg_id: i64) -> Self {
        Self {
            tg_id,
            username: None,
            full_name: None,
        }
    }
}

// ============== Users ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub tg_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn chat(&self) -> ChatId {
        ChatId(self.tg_id)
    }

    /// "Full Name (@username)" with whatever parts are known.
    pub fn display_name(&self) -> String {
        match (self.full_name.as_deref(), self.username.as_deref()) {
            (Some(name), Some(un)) if !name.is_empty() => format!("{name} (@{un})"),
            (Some(name), _) if !name.is_empty() => name.to_string(),
            (_, Some(un)) => format!("@{un}"),
            _ => format!("id {}", self.tg_id),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UserUpsert {
    pub tg_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
}

// ============== Sellables ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lot {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub photo: String,
    pub is_active: bool,
    pub message_id: Option<i32>,
    pub created_by: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const LOT_STATUS_ACTIVE: &str = "active";
pub const LOT_STATUS_ARCHIVED: &str = "archived";

#[derive(Clone, Debug)]
pub struct NewLot {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub photo: String,
    pub created_by: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub price: i64,
    pub photo: Option<String>,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewProduct {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub price: i64,
    pub photo: Option<String>,
}

/// Weak reference from a request to the thing being bought.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Lot(i64),
    Product(i64),
}

impl TargetRef {
    pub fn kind(&self) -> &'static str {
        match self {
            TargetRef::Lot(_) => "lot",
            TargetRef::Product(_) => "product",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            TargetRef::Lot(id) | TargetRef::Product(id) => *id,
        }
    }

    /// Rebuild from the `target_type` / `target_id` storage pair.
    pub fn from_parts(kind: &str, id: i64) -> Result<Self> {
        match kind {
            "lot" => Ok(TargetRef::Lot(id)),
            "product" => Ok(TargetRef::Product(id)),
            other => Err(Error::Validation(format!("unknown target type: {other}"))),
        }
    }
}

/// What a request needs to know about its target, whatever its kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sellable {
    pub target: TargetRef,
    pub name: String,
    pub price: i64,
    pub photo: Option<String>,
    pub active: bool,
}

impl From<&Lot> for Sellable {
    fn from(lot: &Lot) -> Self {
        Self {
            target: TargetRef::Lot(lot.id),
            name: lot.name.clone(),
            price: lot.price,
            photo: Some(lot.photo.clone()),
            active: lot.is_active,
        }
    }
}

impl From<&Product> for Sellable {
    fn from(p: &Product) -> Self {
        Self {
            target: TargetRef::Product(p.id),
            name: p.name.clone(),
            price: p.price,
            photo: p.photo.clone(),
            active: p.is_active,
        }
    }
}

// ============== Requests ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Pending,
    Processing,
    Done,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [
        RequestStatus::Pending,
        RequestStatus::Processing,
        RequestStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "processing" => Ok(RequestStatus::Processing),
            "done" => Ok(RequestStatus::Done),
            other => Err(Error::Validation(format!("unknown request status: {other}"))),
        }
    }

    /// Whether `take` may move a request out of this status.
    pub fn can_take(&self, allow_reopen: bool) -> bool {
        match self {
            RequestStatus::Pending => true,
            RequestStatus::Processing => false,
            RequestStatus::Done => allow_reopen,
        }
    }

    /// Whether `close` may move a request out of this status.
    pub fn can_close(&self) -> bool {
        !matches!(self, RequestStatus::Done)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub id: i64,
    pub user_id: i64,
    pub target: TargetRef,
    pub prepayment_amount: i64,
    pub total_amount: i64,
    pub status: RequestStatus,
    pub details: Option<String>,
    pub taken_by_admin_id: Option<i64>,
    pub taken_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct NewRequest {
    pub user_id: i64,
    pub target: TargetRef,
    pub prepayment_amount: i64,
    pub total_amount: i64,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a conditional status write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The write happened; carries the updated row.
    Applied(Request),
    /// The precondition failed; carries the untouched row.
    Rejected(Request),
    Missing,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub done: i64,
}

impl StatusCounts {
    pub fn get(&self, status: RequestStatus) -> i64 {
        match status {
            RequestStatus::Pending => self.pending,
            RequestStatus::Processing => self.processing,
            RequestStatus::Done => self.done,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.done
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub requests: u64,
    pub notifications: u64,
}

// ============== Notifications / panel state ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminNotification {
    pub id: i64,
    pub admin_user_id: i64,
    pub request_id: i64,
    pub message: Option<MessageRef>,
    pub is_hidden: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewNotification {
    pub admin_user_id: i64,
    pub request_id: i64,
    pub message: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminUiState {
    pub admin_user_id: i64,
    pub last_menu_message_id: Option<i32>,
    pub last_requests_message_id: Option<i32>,
}

// ============== Raffles ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raffle {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug)]
pub struct NewRaffle {
    pub title: String,
    pub description: String,
    pub start_at: DateTime<Utc>,
    pub end_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ref_round_trips_through_storage_pair() {
        let t = TargetRef::Lot(7);
        assert_eq!(TargetRef::from_parts(t.kind(), t.id()).unwrap(), t);
        assert!(TargetRef::from_parts("raffle", 1).is_err());
    }

    #[test]
    fn status_guards_follow_canonical_machine() {
        assert!(RequestStatus::Pending.can_take(false));
        assert!(!RequestStatus::Processing.can_take(true));
        assert!(!RequestStatus::Done.can_take(false));
        assert!(RequestStatus::Done.can_take(true));

        assert!(RequestStatus::Pending.can_close());
        assert!(RequestStatus::Processing.can_close());
        assert!(!RequestStatus::Done.can_close());
    }

    #[test]
    fn display_name_prefers_full_name_and_username() {
        let mut u = User {
            id: 1,
            tg_id: 42,
            username: Some("neo".to_string()),
            full_name: Some("Thomas A".to_string()),
            is_admin: false,
            created_at: Utc::now(),
        };
        assert_eq!(u.display_name(), "Thomas A (@neo)");
        u.full_name = None;
        assert_eq!(u.display_name(), "@neo");
        u.username = None;
        assert_eq!(u.display_name(), "id 42");
    }
}
