use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{domain::*, errors::Error, store::ShopStore, Result};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
    lots: BTreeMap<i64, Lot>,
    products: BTreeMap<i64, Product>,
    requests: BTreeMap<i64, Request>,
    notifications: BTreeMap<i64, AdminNotification>,
    ui_states: BTreeMap<i64, AdminUiState>,
    raffles: BTreeMap<i64, Raffle>,
    participants: Vec<(i64, i64)>,
}

impl Inner {
    fn alloc(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process store. Each call holds one lock for its whole read-modify-write,
/// which gives the same atomicity as the SQLite adapter's conditional updates.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdate a request (maintenance tooling and tests).
    pub async fn set_request_created_at(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut g = self.inner.lock().await;
        let req = g
            .requests
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("request {id}")))?;
        req.created_at = at;
        Ok(())
    }

    pub async fn notifications_for(&self, request_id: i64) -> Vec<AdminNotification> {
        let g = self.inner.lock().await;
        g.notifications
            .values()
            .filter(|n| n.request_id == request_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn upsert_user(&self, u: UserUpsert) -> Result<User> {
        let mut g = self.inner.lock().await;
        if let Some(existing) = g.users.values_mut().find(|x| x.tg_id == u.tg_id) {
            if u.username.is_some() {
                existing.username = u.username;
            }
            if u.full_name.is_some() {
                existing.full_name = u.full_name;
            }
            existing.is_admin = u.is_admin;
            return Ok(existing.clone());
        }
        let id = g.alloc();
        let user = User {
            id,
            tg_id: u.tg_id,
            username: u.username,
            full_name: u.full_name,
            is_admin: u.is_admin,
            created_at: Utc::now(),
        };
        g.users.insert(id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn user_by_tg(&self, tg_id: i64) -> Result<Option<User>> {
        let g = self.inner.lock().await;
        Ok(g.users.values().find(|u| u.tg_id == tg_id).cloned())
    }

    async fn insert_lot(&self, lot: NewLot, now: DateTime<Utc>) -> Result<Lot> {
        let mut g = self.inner.lock().await;
        let id = g.alloc();
        let lot = Lot {
            id,
            name: lot.name,
            description: lot.description,
            price: lot.price,
            photo: lot.photo,
            is_active: true,
            message_id: None,
            created_by: lot.created_by,
            status: LOT_STATUS_ACTIVE.to_string(),
            created_at: now,
            updated_at: None,
        };
        g.lots.insert(id, lot.clone());
        Ok(lot)
    }

    async fn lot(&self, id: i64) -> Result<Option<Lot>> {
        Ok(self.inner.lock().await.lots.get(&id).cloned())
    }

    async fn lots(&self) -> Result<Vec<Lot>> {
        Ok(self.inner.lock().await.lots.values().cloned().collect())
    }

    async fn save_lot(&self, lot: &Lot) -> Result<()> {
        let mut g = self.inner.lock().await;
        let slot = g
            .lots
            .get_mut(&lot.id)
            .ok_or_else(|| Error::NotFound(format!("lot {}", lot.id)))?;
        *slot = lot.clone();
        Ok(())
    }

    async fn delete_lot(&self, id: i64) -> Result<bool> {
        Ok(self.inner.lock().await.lots.remove(&id).is_some())
    }

    async fn insert_product(&self, p: NewProduct, now: DateTime<Utc>) -> Result<Product> {
        let mut g = self.inner.lock().await;
        let id = g.alloc();
        let product = Product {
            id,
            name: p.name,
            kind: p.kind,
            description: p.description,
            price: p.price,
            photo: p.photo,
            is_active: true,
            created_by: None,
            created_at: now,
        };
        g.products.insert(id, product.clone());
        Ok(product)
    }

    async fn product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.inner.lock().await.products.get(&id).cloned())
    }

    async fn insert_request(&self, r: NewRequest) -> Result<Request> {
        let mut g = self.inner.lock().await;
        let id = g.alloc();
        let req = Request {
            id,
            user_id: r.user_id,
            target: r.target,
            prepayment_amount: r.prepayment_amount,
            total_amount: r.total_amount,
            status: RequestStatus::Pending,
            details: r.details,
            taken_by_admin_id: None,
            taken_at: None,
            closed_at: None,
            created_at: r.created_at,
            updated_at: None,
        };
        g.requests.insert(id, req.clone());
        Ok(req)
    }

    async fn request(&self, id: i64) -> Result<Option<Request>> {
        Ok(self.inner.lock().await.requests.get(&id).cloned())
    }

    async fn take_request(
        &self,
        id: i64,
        admin_user_id: i64,
        now: DateTime<Utc>,
        allow_reopen: bool,
    ) -> Result<Transition> {
        let mut g = self.inner.lock().await;
        let Some(req) = g.requests.get_mut(&id) else {
            return Ok(Transition::Missing);
        };
        if !req.status.can_take(allow_reopen) {
            return Ok(Transition::Rejected(req.clone()));
        }
        req.status = RequestStatus::Processing;
        req.taken_at = Some(now);
        req.taken_by_admin_id = Some(admin_user_id);
        req.closed_at = None;
        req.updated_at = Some(now);
        Ok(Transition::Applied(req.clone()))
    }

    async fn close_request(&self, id: i64, now: DateTime<Utc>) -> Result<Transition> {
        let mut g = self.inner.lock().await;
        let Some(req) = g.requests.get_mut(&id) else {
            return Ok(Transition::Missing);
        };
        if !req.status.can_close() {
            return Ok(Transition::Rejected(req.clone()));
        }
        req.status = RequestStatus::Done;
        req.closed_at = Some(now);
        req.updated_at = Some(now);
        Ok(Transition::Applied(req.clone()))
    }

    async fn count_by_status(&self) -> Result<StatusCounts> {
        let g = self.inner.lock().await;
        let mut counts = StatusCounts::default();
        for r in g.requests.values() {
            match r.status {
                RequestStatus::Pending => counts.pending += 1,
                RequestStatus::Processing => counts.processing += 1,
                RequestStatus::Done => counts.done += 1,
            }
        }
        Ok(counts)
    }

    async fn requests_by_status(
        &self,
        status: RequestStatus,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Request>> {
        let g = self.inner.lock().await;
        let mut rows: Vec<Request> = g
            .requests
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn purge_requests(
        &self,
        status: RequestStatus,
        created_before: DateTime<Utc>,
    ) -> Result<PurgeReport> {
        let mut g = self.inner.lock().await;
        let doomed: Vec<i64> = g
            .requests
            .values()
            .filter(|r| r.status == status && r.created_at < created_before)
            .map(|r| r.id)
            .collect();

        let before = g.notifications.len();
        g.notifications.retain(|_, n| !doomed.contains(&n.request_id));
        let notifications = (before - g.notifications.len()) as u64;

        for id in &doomed {
            g.requests.remove(id);
        }

        Ok(PurgeReport {
            requests: doomed.len() as u64,
            notifications,
        })
    }

    async fn insert_notification(&self, n: NewNotification) -> Result<AdminNotification> {
        let mut g = self.inner.lock().await;
        let id = g.alloc();
        let row = AdminNotification {
            id,
            admin_user_id: n.admin_user_id,
            request_id: n.request_id,
            message: n.message,
            is_hidden: false,
            created_at: n.created_at,
        };
        g.notifications.insert(id, row.clone());
        Ok(row)
    }

    async fn visible_notifications(&self, request_id: i64) -> Result<Vec<AdminNotification>> {
        let g = self.inner.lock().await;
        let mut rows: Vec<AdminNotification> = g
            .notifications
            .values()
            .filter(|n| n.request_id == request_id && !n.is_hidden)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn latest_visible_notification(
        &self,
        request_id: i64,
        admin_user_id: i64,
    ) -> Result<Option<AdminNotification>> {
        let g = self.inner.lock().await;
        Ok(g.notifications
            .values()
            .filter(|n| {
                n.request_id == request_id && n.admin_user_id == admin_user_id && !n.is_hidden
            })
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn hide_notification(&self, id: i64) -> Result<()> {
        let mut g = self.inner.lock().await;
        if let Some(n) = g.notifications.get_mut(&id) {
            n.is_hidden = true;
        }
        Ok(())
    }

    async fn ui_state(&self, admin_user_id: i64) -> Result<Option<AdminUiState>> {
        Ok(self.inner.lock().await.ui_states.get(&admin_user_id).cloned())
    }

    async fn save_ui_state(&self, state: &AdminUiState) -> Result<()> {
        let mut g = self.inner.lock().await;
        g.ui_states.insert(state.admin_user_id, state.clone());
        Ok(())
    }

    async fn insert_raffle(&self, r: NewRaffle) -> Result<Raffle> {
        let mut g = self.inner.lock().await;
        let id = g.alloc();
        let raffle = Raffle {
            id,
            title: r.title,
            description: r.description,
            start_at: r.start_at,
            end_at: r.end_at,
            is_active: true,
            created_by: r.created_by,
            updated_at: None,
        };
        g.raffles.insert(id, raffle.clone());
        Ok(raffle)
    }

    async fn raffle(&self, id: i64) -> Result<Option<Raffle>> {
        Ok(self.inner.lock().await.raffles.get(&id).cloned())
    }

    async fn active_raffle(&self) -> Result<Option<Raffle>> {
        let g = self.inner.lock().await;
        Ok(g.raffles.values().rev().find(|r| r.is_active).cloned())
    }

    async fn add_participant(&self, raffle_id: i64, user_tg_id: i64) -> Result<bool> {
        let mut g = self.inner.lock().await;
        if g.participants.contains(&(raffle_id, user_tg_id)) {
            return Ok(false);
        }
        g.participants.push((raffle_id, user_tg_id));
        Ok(true)
    }

    async fn participants(&self, raffle_id: i64) -> Result<Vec<i64>> {
        let g = self.inner.lock().await;
        Ok(g.participants
            .iter()
            .filter(|(r, _)| *r == raffle_id)
            .map(|(_, u)| *u)
            .collect())
    }

    async fn deactivate_raffle(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let mut g = self.inner.lock().await;
        let Some(r) = g.raffles.get_mut(&id) else {
            return Ok(false);
        };
        let was_active = r.is_active;
        r.is_active = false;
        r.updated_at = Some(now);
        Ok(was_active)
    }
}
