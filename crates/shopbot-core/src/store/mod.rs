//! Persistence port.
//!
//! The relational store is the single shared mutable resource. Each method is
//! its own unit of work; the conditional transitions (`take_request`,
//! `close_request`) and `purge_requests` must be atomic in every
//! implementation so racing handlers cannot both pass a status precondition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{domain::*, Result};

pub mod memory;

pub use memory::MemoryStore;

#[async_trait]
pub trait ShopStore: Send + Sync {
    // Users
    async fn upsert_user(&self, user: UserUpsert) -> Result<User>;
    async fn user(&self, id: i64) -> Result<Option<User>>;
    async fn user_by_tg(&self, tg_id: i64) -> Result<Option<User>>;

    // Lots
    async fn insert_lot(&self, lot: NewLot, now: DateTime<Utc>) -> Result<Lot>;
    async fn lot(&self, id: i64) -> Result<Option<Lot>>;
    async fn lots(&self) -> Result<Vec<Lot>>;
    /// Persist every mutable field of an existing lot.
    async fn save_lot(&self, lot: &Lot) -> Result<()>;
    async fn delete_lot(&self, id: i64) -> Result<bool>;

    // Products
    async fn insert_product(&self, product: NewProduct, now: DateTime<Utc>) -> Result<Product>;
    async fn product(&self, id: i64) -> Result<Option<Product>>;

    // Requests
    async fn insert_request(&self, req: NewRequest) -> Result<Request>;
    async fn request(&self, id: i64) -> Result<Option<Request>>;
    /// `pending → processing` (and `done → processing` when `allow_reopen`),
    /// setting `taken_at`/`taken_by_admin_id` together.
    async fn take_request(
        &self,
        id: i64,
        admin_user_id: i64,
        now: DateTime<Utc>,
        allow_reopen: bool,
    ) -> Result<Transition>;
    /// `pending|processing → done`, setting `closed_at`.
    async fn close_request(&self, id: i64, now: DateTime<Utc>) -> Result<Transition>;
    async fn count_by_status(&self) -> Result<StatusCounts>;
    /// Newest first.
    async fn requests_by_status(
        &self,
        status: RequestStatus,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Request>>;
    /// Delete requests with `status` created strictly before `created_before`,
    /// together with their notifications.
    async fn purge_requests(
        &self,
        status: RequestStatus,
        created_before: DateTime<Utc>,
    ) -> Result<PurgeReport>;

    // Admin notifications
    async fn insert_notification(&self, n: NewNotification) -> Result<AdminNotification>;
    /// Non-hidden notifications for a request, oldest first.
    async fn visible_notifications(&self, request_id: i64) -> Result<Vec<AdminNotification>>;
    async fn latest_visible_notification(
        &self,
        request_id: i64,
        admin_user_id: i64,
    ) -> Result<Option<AdminNotification>>;
    async fn hide_notification(&self, id: i64) -> Result<()>;

    // Admin panel pointers
    async fn ui_state(&self, admin_user_id: i64) -> Result<Option<AdminUiState>>;
    async fn save_ui_state(&self, state: &AdminUiState) -> Result<()>;

    // Raffles
    async fn insert_raffle(&self, raffle: NewRaffle) -> Result<Raffle>;
    async fn raffle(&self, id: i64) -> Result<Option<Raffle>>;
    /// Most recently created active raffle.
    async fn active_raffle(&self) -> Result<Option<Raffle>>;
    /// `false` when the user already participates.
    async fn add_participant(&self, raffle_id: i64, user_tg_id: i64) -> Result<bool>;
    async fn participants(&self, raffle_id: i64) -> Result<Vec<i64>>;
    async fn deactivate_raffle(&self, id: i64, now: DateTime<Utc>) -> Result<bool>;
}
