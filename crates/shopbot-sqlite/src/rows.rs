//! Row models and their mapping into core domain types.

use chrono::{DateTime, Utc};

use shopbot_core::{
    domain::{
        AdminNotification, AdminUiState, Lot, MessageRef, Product, Raffle, Request,
        RequestStatus, TargetRef, User,
    },
    Result,
};

pub(crate) fn to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub(crate) fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn opt_from_ms(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.map(from_ms)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub tg_id: i64,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub is_admin: bool,
    pub created_at_ms: i64,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            tg_id: r.tg_id,
            username: r.username,
            full_name: r.full_name,
            is_admin: r.is_admin,
            created_at: from_ms(r.created_at_ms),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct LotRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub photo: String,
    pub is_active: bool,
    pub message_id: Option<i32>,
    pub created_by: Option<i64>,
    pub status: String,
    pub created_at_ms: i64,
    pub updated_at_ms: Option<i64>,
}

impl From<LotRow> for Lot {
    fn from(r: LotRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            description: r.description,
            price: r.price,
            photo: r.photo,
            is_active: r.is_active,
            message_id: r.message_id,
            created_by: r.created_by,
            status: r.status,
            created_at: from_ms(r.created_at_ms),
            updated_at: opt_from_ms(r.updated_at_ms),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ProductRow {
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub price: i64,
    pub photo: Option<String>,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub created_at_ms: i64,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            kind: r.kind,
            description: r.description,
            price: r.price,
            photo: r.photo,
            is_active: r.is_active,
            created_by: r.created_by,
            created_at: from_ms(r.created_at_ms),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RequestRow {
    pub id: i64,
    pub user_id: i64,
    pub target_type: String,
    pub target_id: i64,
    pub prepayment_amount: i64,
    pub total_amount: i64,
    pub status: String,
    pub details: Option<String>,
    pub taken_by_admin_id: Option<i64>,
    pub taken_at_ms: Option<i64>,
    pub closed_at_ms: Option<i64>,
    pub created_at_ms: i64,
    pub updated_at_ms: Option<i64>,
}

impl TryFrom<RequestRow> for Request {
    type Error = shopbot_core::Error;

    fn try_from(r: RequestRow) -> Result<Self> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            target: TargetRef::from_parts(&r.target_type, r.target_id)?,
            prepayment_amount: r.prepayment_amount,
            total_amount: r.total_amount,
            status: RequestStatus::parse(&r.status)?,
            details: r.details,
            taken_by_admin_id: r.taken_by_admin_id,
            taken_at: opt_from_ms(r.taken_at_ms),
            closed_at: opt_from_ms(r.closed_at_ms),
            created_at: from_ms(r.created_at_ms),
            updated_at: opt_from_ms(r.updated_at_ms),
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct NotificationRow {
    pub id: i64,
    pub admin_user_id: i64,
    pub request_id: i64,
    pub chat_id: Option<i64>,
    pub tg_message_id: Option<i32>,
    pub is_hidden: bool,
    pub created_at_ms: i64,
}

impl From<NotificationRow> for AdminNotification {
    fn from(r: NotificationRow) -> Self {
        let message = match (r.chat_id, r.tg_message_id) {
            (Some(chat), Some(mid)) => Some(MessageRef::new(chat, mid)),
            _ => None,
        };
        Self {
            id: r.id,
            admin_user_id: r.admin_user_id,
            request_id: r.request_id,
            message,
            is_hidden: r.is_hidden,
            created_at: from_ms(r.created_at_ms),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UiStateRow {
    pub admin_user_id: i64,
    pub last_menu_message_id: Option<i32>,
    pub last_requests_message_id: Option<i32>,
}

impl From<UiStateRow> for AdminUiState {
    fn from(r: UiStateRow) -> Self {
        Self {
            admin_user_id: r.admin_user_id,
            last_menu_message_id: r.last_menu_message_id,
            last_requests_message_id: r.last_requests_message_id,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RaffleRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_at_ms: i64,
    pub end_at_ms: Option<i64>,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub updated_at_ms: Option<i64>,
}

impl From<RaffleRow> for Raffle {
    fn from(r: RaffleRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            start_at: from_ms(r.start_at_ms),
            end_at: opt_from_ms(r.end_at_ms),
            is_active: r.is_active,
            created_by: r.created_by,
            updated_at: opt_from_ms(r.updated_at_ms),
        }
    }
}
