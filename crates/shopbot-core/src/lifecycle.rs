//! Request lifecycle: creation with admin fan-out, status transitions with
//! retraction of the other admins' notifications, and maintenance.
//!
//! Status machine: `pending → processing` (take), `pending|processing → done`
//! (close), plus `done → processing` only when reopen is enabled in config.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::task::JoinSet;

use crate::{
    audit::{AuditEvent, AuditLogger},
    catalog::Catalog,
    config::Config,
    domain::{
        AdminNotification, Identity, Lot, MessageRef, NewNotification, NewRequest, PurgeReport,
        Request, RequestStatus, Sellable, StatusCounts, TargetRef, Transition, User,
    },
    errors::Error,
    formatting::escape_html,
    messaging::port::MessagingPort,
    panels::AdminPanels,
    store::ShopStore,
    users::UserDirectory,
    views::{self, NoticeKind},
    Result,
};

pub const PAGE_SIZE: i64 = 10;

/// A request with everything needed to render it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestCard {
    pub request: Request,
    pub buyer: Option<User>,
    pub executor: Option<User>,
    /// `None` when the target was deleted after the request was placed.
    pub target: Option<Sellable>,
    pub link: Option<String>,
}

impl RequestCard {
    /// Current target price, falling back to the amount recorded at purchase.
    pub fn price(&self) -> i64 {
        self.target
            .as_ref()
            .map(|t| t.price)
            .unwrap_or(self.request.total_amount)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestSummary {
    pub id: i64,
    pub name: String,
    pub price: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestPage {
    pub status: RequestStatus,
    /// Zero-based.
    pub page: u32,
    pub total_pages: u32,
    pub entries: Vec<RequestSummary>,
}

/// `total * percent / 100`, truncated toward zero.
pub fn prepayment(total: i64, percent: i64) -> i64 {
    (i128::from(total) * i128::from(percent) / 100) as i64
}

fn conflict_message(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Processing => "Заявка уже в работе",
        RequestStatus::Done => "Заявка уже закрыта",
        RequestStatus::Pending => "Заявка ещё не взята в работу",
    }
}

fn not_found(request_id: i64) -> Error {
    Error::NotFound(format!("заявка #{request_id}"))
}

pub struct RequestLifecycle {
    cfg: Arc<Config>,
    store: Arc<dyn ShopStore>,
    messenger: Arc<dyn MessagingPort>,
    users: UserDirectory,
    catalog: Arc<Catalog>,
    panels: Arc<AdminPanels>,
    audit: AuditLogger,
}

impl RequestLifecycle {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn ShopStore>,
        messenger: Arc<dyn MessagingPort>,
        users: UserDirectory,
        catalog: Arc<Catalog>,
        panels: Arc<AdminPanels>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            cfg,
            store,
            messenger,
            users,
            catalog,
            panels,
            audit,
        }
    }

    pub async fn request(&self, id: i64) -> Result<Request> {
        self.store.request(id).await?.ok_or_else(|| not_found(id))
    }

    /// Persist a `pending` request, tell the buyer, and notify every admin.
    /// Only delivered admin notifications are recorded.
    pub async fn create_request(
        &self,
        buyer: &User,
        target: TargetRef,
        method: &str,
    ) -> Result<Request> {
        let sellable = self.catalog.resolve(target).await?;
        let total = sellable.price;
        let method = method.trim();

        let req = self
            .store
            .insert_request(NewRequest {
                user_id: buyer.id,
                target,
                prepayment_amount: prepayment(total, self.cfg.prepay_percent),
                total_amount: total,
                details: (!method.is_empty()).then(|| method.to_string()),
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(
            request_id = req.id,
            buyer = buyer.tg_id,
            target = %format!("{}:{}", target.kind(), target.id()),
            total,
            "request created"
        );

        let card = self.card(req.clone()).await?;
        if let Err(e) = self
            .messenger
            .send_html(buyer.chat(), &views::buyer_created_text(&card), None)
            .await
        {
            tracing::warn!(request_id = req.id, error = %e, "buyer confirmation failed");
        }

        let delivered = self.fan_out(&card).await;
        self.audit.record(AuditEvent::request(
            "request_created",
            buyer.tg_id,
            req.id,
            Some(&format!("notified {delivered}/{} admins", self.cfg.admins.len())),
        ));
        self.panels.refresh_all().await;
        Ok(req)
    }

    /// Send the new-request notification to all configured admins
    /// concurrently; returns how many were delivered.
    async fn fan_out(&self, card: &RequestCard) -> usize {
        let text = views::notification_text(card, NoticeKind::New);
        let keyboard = views::notification_keyboard(card, self.cfg.allow_reopen);
        let request_id = card.request.id;

        let mut tasks = JoinSet::new();
        for tg_id in &self.cfg.admins {
            let admin = match self.users.resolve(&Identity::new(*tg_id)).await {
                Ok(admin) => admin,
                Err(e) => {
                    tracing::warn!(admin = tg_id, error = %e, "failed to resolve admin");
                    continue;
                }
            };
            let messenger = self.messenger.clone();
            let text = text.clone();
            let keyboard = keyboard.clone();
            tasks.spawn(async move {
                let sent = messenger
                    .send_html(admin.chat(), &text, Some(keyboard))
                    .await;
                (admin, sent)
            });
        }

        let mut delivered = 0;
        while let Some(joined) = tasks.join_next().await {
            let (admin, sent) = match joined {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(request_id, error = %e, "notification task failed");
                    continue;
                }
            };
            let msg = match sent {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(
                        request_id,
                        admin = admin.tg_id,
                        error = %e,
                        "admin notification not delivered"
                    );
                    continue;
                }
            };
            let recorded = self
                .store
                .insert_notification(NewNotification {
                    admin_user_id: admin.id,
                    request_id,
                    message: Some(msg),
                    created_at: Utc::now(),
                })
                .await;
            match recorded {
                Ok(_) => delivered += 1,
                Err(e) => {
                    tracing::warn!(request_id, admin = admin.tg_id, error = %e, "failed to record notification")
                }
            }
        }
        delivered
    }

    /// Claim a request for `admin`.
    pub async fn take(&self, request_id: i64, admin: &User) -> Result<Request> {
        let req = match self
            .store
            .take_request(request_id, admin.id, Utc::now(), self.cfg.allow_reopen)
            .await?
        {
            Transition::Applied(r) => r,
            Transition::Rejected(r) => {
                return Err(Error::Conflict(conflict_message(r.status).to_string()))
            }
            Transition::Missing => return Err(not_found(request_id)),
        };
        tracing::info!(request_id, admin = admin.tg_id, "request taken");

        self.after_transition(&req, admin, views::buyer_taken_text(&req, admin))
            .await;
        self.audit.record(AuditEvent::request(
            "request_taken",
            admin.tg_id,
            req.id,
            None,
        ));
        Ok(req)
    }

    pub async fn close(&self, request_id: i64, admin: &User) -> Result<Request> {
        let req = match self.store.close_request(request_id, Utc::now()).await? {
            Transition::Applied(r) => r,
            Transition::Rejected(r) => {
                return Err(Error::Conflict(conflict_message(r.status).to_string()))
            }
            Transition::Missing => return Err(not_found(request_id)),
        };
        tracing::info!(request_id, admin = admin.tg_id, "request closed");

        self.after_transition(&req, admin, views::buyer_closed_text(&req, admin))
            .await;
        self.audit.record(AuditEvent::request(
            "request_closed",
            admin.tg_id,
            req.id,
            None,
        ));
        Ok(req)
    }

    /// Side effects of a committed status change. None of these can undo it,
    /// so every failure is logged and skipped.
    async fn after_transition(&self, req: &Request, admin: &User, buyer_text: String) {
        match self.users.find(Some(req.user_id)).await {
            Ok(Some(buyer)) => {
                if let Err(e) = self
                    .messenger
                    .send_html(buyer.chat(), &buyer_text, None)
                    .await
                {
                    tracing::warn!(request_id = req.id, error = %e, "buyer update failed");
                }
            }
            Ok(None) => tracing::warn!(request_id = req.id, "buyer record missing"),
            Err(e) => tracing::warn!(request_id = req.id, error = %e, "buyer lookup failed"),
        }

        match self.retract_others(req.id, admin.id).await {
            Ok(n) if n > 0 => tracing::debug!(request_id = req.id, retracted = n, "retracted"),
            Ok(_) => {}
            Err(e) => tracing::warn!(request_id = req.id, error = %e, "retraction failed"),
        }

        if let Err(e) = self.edit_own(req, admin).await {
            tracing::warn!(request_id = req.id, error = %e, "own notification update failed");
        }

        self.panels.refresh_all().await;
    }

    /// Hide every visible notification of other admins, deleting the message
    /// best-effort. A failed delete still hides the row.
    async fn retract_others(&self, request_id: i64, keep_admin_user_id: i64) -> Result<usize> {
        let notes = self.store.visible_notifications(request_id).await?;
        let mut retracted = 0;
        for n in notes
            .into_iter()
            .filter(|n| n.admin_user_id != keep_admin_user_id)
        {
            if let Some(msg) = n.message {
                if let Err(e) = self.messenger.delete_message(msg).await {
                    tracing::debug!(request_id, notification = n.id, error = %e, "delete failed");
                }
            }
            self.store.hide_notification(n.id).await?;
            retracted += 1;
        }
        Ok(retracted)
    }

    async fn edit_own(&self, req: &Request, admin: &User) -> Result<()> {
        let Some(note) = self
            .store
            .latest_visible_notification(req.id, admin.id)
            .await?
        else {
            return Ok(());
        };
        let Some(msg) = note.message else {
            return Ok(());
        };
        let card = self.card(req.clone()).await?;
        self.messenger
            .edit_html(
                msg,
                &views::notification_text(&card, NoticeKind::Update),
                Some(views::notification_keyboard(&card, self.cfg.allow_reopen)),
            )
            .await
    }

    /// Hide the admin's own latest visible notification. No-op when there is
    /// none.
    pub async fn hide_notification(&self, request_id: i64, admin: &User) -> Result<()> {
        let Some(note) = self
            .store
            .latest_visible_notification(request_id, admin.id)
            .await?
        else {
            return Ok(());
        };
        self.store.hide_notification(note.id).await?;
        if let Some(msg) = note.message {
            if let Err(e) = self.messenger.delete_message(msg).await {
                tracing::debug!(request_id, error = %e, "hidden notification not deleted");
            }
        }
        Ok(())
    }

    /// Cleanup window of `days` whole days; rejects what chrono cannot hold.
    pub fn purge_window(days: i64) -> Result<Duration> {
        if days < 0 {
            return Err(Error::Validation(
                "Срок очистки не может быть отрицательным".to_string(),
            ));
        }
        Duration::try_days(days)
            .ok_or_else(|| Error::Validation("Слишком большой срок очистки".to_string()))
    }

    /// Delete requests in `status` older than `older_than`, with their
    /// notifications, in one store transaction.
    pub async fn purge_stale(
        &self,
        older_than: Duration,
        status: RequestStatus,
        actor_tg_id: Option<i64>,
    ) -> Result<PurgeReport> {
        let cutoff = Utc::now()
            .checked_sub_signed(older_than)
            .ok_or_else(|| Error::Validation("Слишком большой срок очистки".to_string()))?;
        let report = self.store.purge_requests(status, cutoff).await?;
        tracing::info!(
            status = %status,
            requests = report.requests,
            notifications = report.notifications,
            "purged stale requests"
        );
        self.audit.record(AuditEvent::purge(
            actor_tg_id,
            &format!(
                "status={status} older_than_days={} requests={} notifications={}",
                older_than.num_days(),
                report.requests,
                report.notifications
            ),
        ));
        if report.requests > 0 {
            self.panels.refresh_all().await;
        }
        Ok(report)
    }

    /// Message of the admin's latest visible notification for a request.
    pub async fn notification_message(
        &self,
        request_id: i64,
        admin: &User,
    ) -> Result<Option<MessageRef>> {
        Ok(self
            .store
            .latest_visible_notification(request_id, admin.id)
            .await?
            .and_then(|n| n.message))
    }

    pub async fn counts_by_status(&self) -> Result<StatusCounts> {
        self.store.count_by_status().await
    }

    /// Send the acting admin a fresh copy of the notification.
    pub async fn resend_notification(
        &self,
        request_id: i64,
        admin: &User,
    ) -> Result<AdminNotification> {
        let card = self.describe(request_id).await?;
        let msg = self
            .messenger
            .send_html(
                admin.chat(),
                &views::notification_text(&card, NoticeKind::Repeat),
                Some(views::notification_keyboard(&card, self.cfg.allow_reopen)),
            )
            .await?;
        self.store
            .insert_notification(NewNotification {
                admin_user_id: admin.id,
                request_id,
                message: Some(msg),
                created_at: Utc::now(),
            })
            .await
    }

    /// Newest first, `PAGE_SIZE` per page. Out-of-range pages clamp to the last.
    pub async fn list_by_status(&self, status: RequestStatus, page: u32) -> Result<RequestPage> {
        let total = self.store.count_by_status().await?.get(status);
        let total_pages = ((total + PAGE_SIZE - 1) / PAGE_SIZE).max(1) as u32;
        let page = page.min(total_pages - 1);

        let rows = self
            .store
            .requests_by_status(status, i64::from(page) * PAGE_SIZE, PAGE_SIZE)
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for r in rows {
            let (name, price) = match self.catalog.find(r.target).await? {
                Some(t) => (t.name, t.price),
                None => ("—".to_string(), r.total_amount),
            };
            entries.push(RequestSummary {
                id: r.id,
                name,
                price,
            });
        }
        Ok(RequestPage {
            status,
            page,
            total_pages,
            entries,
        })
    }

    pub async fn describe(&self, request_id: i64) -> Result<RequestCard> {
        let req = self.request(request_id).await?;
        self.card(req).await
    }

    async fn card(&self, request: Request) -> Result<RequestCard> {
        let buyer = self.users.find(Some(request.user_id)).await?;
        let executor = self.users.find(request.taken_by_admin_id).await?;
        let (target, link) = match request.target {
            TargetRef::Lot(id) => {
                let lot: Option<Lot> = self.store.lot(id).await?;
                (
                    lot.as_ref().map(Sellable::from),
                    lot.as_ref().and_then(|l| self.catalog.post_link(l)),
                )
            }
            other => (self.catalog.find(other).await?, None),
        };
        Ok(RequestCard {
            request,
            buyer,
            executor,
            target,
            link,
        })
    }

    /// Relay free text from an admin to the request's buyer.
    pub async fn message_buyer(&self, request_id: i64, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("Пустое сообщение".to_string()));
        }
        let req = self.request(request_id).await?;
        let html = format!("✉ Сообщение по заявке №{}:\n\n{}", req.id, escape_html(text));
        let max = self.messenger.capabilities().max_message_len;
        if html.chars().count() > max {
            return Err(Error::Validation(format!(
                "Сообщение длиннее {max} символов"
            )));
        }
        let buyer = self.users.get(req.user_id).await?;
        self.messenger.send_html(buyer.chat(), &html, None).await?;
        Ok(())
    }

    /// Flip availability of the lot a request points at.
    pub async fn toggle_target_lot(&self, request_id: i64, admin: &User) -> Result<Lot> {
        let req = self.request(request_id).await?;
        let TargetRef::Lot(lot_id) = req.target else {
            return Err(Error::NotFound("лот для этой заявки".to_string()));
        };
        self.catalog.toggle_lot(lot_id, Some(admin.tg_id)).await
    }
}
