//! SQLite implementation of `shopbot_core::store::ShopStore` (sqlx).
//!
//! Conditional status transitions are single `UPDATE … WHERE status …`
//! statements; purge runs in one transaction, notifications first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use shopbot_core::{
    domain::*,
    store::ShopStore,
    Error, Result,
};

mod rows;
pub mod schema;

use rows::*;

pub(crate) fn db_err(e: sqlx::Error) -> Error {
    Error::Storage(e.to_string())
}

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed with `?mode=rwc`) and bootstrap the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Initializing database: {}", url);

        // Every connection to `:memory:` is a separate database.
        let in_memory = url.contains(":memory:");
        let mut opts = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            opts = opts.idle_timeout(None).max_lifetime(None);
        }
        let pool = opts.connect(url).await.map_err(db_err)?;

        schema::create_schema(&pool).await?;
        info!("Database initialized successfully");
        Ok(Self { pool })
    }

    async fn fetch_request(&self, id: i64) -> Result<Option<Request>> {
        let row: Option<RequestRow> = sqlx::query_as("SELECT * FROM requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Request::try_from).transpose()
    }

    /// Applied when the conditional write touched the row, otherwise the
    /// current row (or its absence) explains why not.
    async fn transition_outcome(&self, id: i64, rows_affected: u64) -> Result<Transition> {
        let current = self.fetch_request(id).await?;
        Ok(match (rows_affected, current) {
            (1, Some(r)) => Transition::Applied(r),
            (_, Some(r)) => Transition::Rejected(r),
            (_, None) => Transition::Missing,
        })
    }
}

#[async_trait]
impl ShopStore for SqliteStore {
    async fn upsert_user(&self, u: UserUpsert) -> Result<User> {
        sqlx::query(
            r#"
            INSERT INTO users (tg_id, username, full_name, is_admin, created_at_ms)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(tg_id) DO UPDATE SET
                username = COALESCE(excluded.username, users.username),
                full_name = COALESCE(excluded.full_name, users.full_name),
                is_admin = excluded.is_admin
            "#,
        )
        .bind(u.tg_id)
        .bind(&u.username)
        .bind(&u.full_name)
        .bind(u.is_admin)
        .bind(to_ms(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.user_by_tg(u.tg_id)
            .await?
            .ok_or_else(|| Error::Storage(format!("user {} vanished after upsert", u.tg_id)))
    }

    async fn user(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(User::from))
    }

    async fn user_by_tg(&self, tg_id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE tg_id = ?")
            .bind(tg_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(User::from))
    }

    async fn insert_lot(&self, lot: NewLot, now: DateTime<Utc>) -> Result<Lot> {
        let id = sqlx::query(
            r#"
            INSERT INTO lots (name, description, price, photo, is_active, created_by, status, created_at_ms)
            VALUES (?, ?, ?, ?, 1, ?, ?, ?)
            "#,
        )
        .bind(&lot.name)
        .bind(&lot.description)
        .bind(lot.price)
        .bind(&lot.photo)
        .bind(lot.created_by)
        .bind(LOT_STATUS_ACTIVE)
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.lot(id)
            .await?
            .ok_or_else(|| Error::Storage(format!("lot {id} vanished after insert")))
    }

    async fn lot(&self, id: i64) -> Result<Option<Lot>> {
        let row: Option<LotRow> = sqlx::query_as("SELECT * FROM lots WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Lot::from))
    }

    async fn lots(&self) -> Result<Vec<Lot>> {
        let rows: Vec<LotRow> = sqlx::query_as("SELECT * FROM lots ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Lot::from).collect())
    }

    async fn save_lot(&self, lot: &Lot) -> Result<()> {
        let res = sqlx::query(
            r#"
            UPDATE lots
            SET name = ?, description = ?, price = ?, photo = ?, is_active = ?,
                message_id = ?, status = ?, updated_at_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(&lot.name)
        .bind(&lot.description)
        .bind(lot.price)
        .bind(&lot.photo)
        .bind(lot.is_active)
        .bind(lot.message_id)
        .bind(&lot.status)
        .bind(lot.updated_at.map(to_ms))
        .bind(lot.id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 0 {
            return Err(Error::NotFound(format!("lot {}", lot.id)));
        }
        Ok(())
    }

    async fn delete_lot(&self, id: i64) -> Result<bool> {
        let res = sqlx::query("DELETE FROM lots WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_product(&self, p: NewProduct, now: DateTime<Utc>) -> Result<Product> {
        let id = sqlx::query(
            r#"
            INSERT INTO products (name, kind, description, price, photo, is_active, created_at_ms)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&p.name)
        .bind(&p.kind)
        .bind(&p.description)
        .bind(p.price)
        .bind(&p.photo)
        .bind(to_ms(now))
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.product(id)
            .await?
            .ok_or_else(|| Error::Storage(format!("product {id} vanished after insert")))
    }

    async fn product(&self, id: i64) -> Result<Option<Product>> {
        let row: Option<ProductRow> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Product::from))
    }

    async fn insert_request(&self, r: NewRequest) -> Result<Request> {
        let id = sqlx::query(
            r#"
            INSERT INTO requests
                (user_id, target_type, target_id, prepayment_amount, total_amount, status, details, created_at_ms)
            VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(r.user_id)
        .bind(r.target.kind())
        .bind(r.target.id())
        .bind(r.prepayment_amount)
        .bind(r.total_amount)
        .bind(&r.details)
        .bind(to_ms(r.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.fetch_request(id)
            .await?
            .ok_or_else(|| Error::Storage(format!("request {id} vanished after insert")))
    }

    async fn request(&self, id: i64) -> Result<Option<Request>> {
        self.fetch_request(id).await
    }

    async fn take_request(
        &self,
        id: i64,
        admin_user_id: i64,
        now: DateTime<Utc>,
        allow_reopen: bool,
    ) -> Result<Transition> {
        let res = sqlx::query(
            r#"
            UPDATE requests
            SET status = 'processing', taken_at_ms = ?, taken_by_admin_id = ?,
                closed_at_ms = NULL, updated_at_ms = ?
            WHERE id = ? AND (status = 'pending' OR (? AND status = 'done'))
            "#,
        )
        .bind(to_ms(now))
        .bind(admin_user_id)
        .bind(to_ms(now))
        .bind(id)
        .bind(allow_reopen)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.transition_outcome(id, res.rows_affected()).await
    }

    async fn close_request(&self, id: i64, now: DateTime<Utc>) -> Result<Transition> {
        let res = sqlx::query(
            r#"
            UPDATE requests
            SET status = 'done', closed_at_ms = ?, updated_at_ms = ?
            WHERE id = ? AND status != 'done'
            "#,
        )
        .bind(to_ms(now))
        .bind(to_ms(now))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        self.transition_outcome(id, res.rows_affected()).await
    }

    async fn count_by_status(&self) -> Result<StatusCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM requests GROUP BY status")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        let mut counts = StatusCounts::default();
        for (status, n) in rows {
            match RequestStatus::parse(&status)? {
                RequestStatus::Pending => counts.pending = n,
                RequestStatus::Processing => counts.processing = n,
                RequestStatus::Done => counts.done = n,
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
        let rows: Vec<RequestRow> = sqlx::query_as(
            r#"
            SELECT * FROM requests
            WHERE status = ?
            ORDER BY created_at_ms DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(status.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(Request::try_from).collect()
    }

    async fn purge_requests(
        &self,
        status: RequestStatus,
        created_before: DateTime<Utc>,
    ) -> Result<PurgeReport> {
        let cutoff = to_ms(created_before);
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let notifications = sqlx::query(
            r#"
            DELETE FROM admin_notifications
            WHERE request_id IN (
                SELECT id FROM requests WHERE status = ? AND created_at_ms < ?
            )
            "#,
        )
        .bind(status.as_str())
        .bind(cutoff)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected();

        let requests = sqlx::query("DELETE FROM requests WHERE status = ? AND created_at_ms < ?")
            .bind(status.as_str())
            .bind(cutoff)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected();

        tx.commit().await.map_err(db_err)?;
        Ok(PurgeReport {
            requests,
            notifications,
        })
    }

    async fn insert_notification(&self, n: NewNotification) -> Result<AdminNotification> {
        let id = sqlx::query(
            r#"
            INSERT INTO admin_notifications
                (admin_user_id, request_id, chat_id, tg_message_id, is_hidden, created_at_ms)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(n.admin_user_id)
        .bind(n.request_id)
        .bind(n.message.map(|m| m.chat_id.0))
        .bind(n.message.map(|m| m.message_id.0))
        .bind(to_ms(n.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        Ok(AdminNotification {
            id,
            admin_user_id: n.admin_user_id,
            request_id: n.request_id,
            message: n.message,
            is_hidden: false,
            created_at: n.created_at,
        })
    }

    async fn visible_notifications(&self, request_id: i64) -> Result<Vec<AdminNotification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"
            SELECT * FROM admin_notifications
            WHERE request_id = ? AND is_hidden = 0
            ORDER BY created_at_ms, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(AdminNotification::from).collect())
    }

    async fn latest_visible_notification(
        &self,
        request_id: i64,
        admin_user_id: i64,
    ) -> Result<Option<AdminNotification>> {
        let row: Option<NotificationRow> = sqlx::query_as(
            r#"
            SELECT * FROM admin_notifications
            WHERE request_id = ? AND admin_user_id = ? AND is_hidden = 0
            ORDER BY created_at_ms DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(request_id)
        .bind(admin_user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(AdminNotification::from))
    }

    async fn hide_notification(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE admin_notifications SET is_hidden = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn ui_state(&self, admin_user_id: i64) -> Result<Option<AdminUiState>> {
        let row: Option<UiStateRow> =
            sqlx::query_as("SELECT * FROM admin_ui_state WHERE admin_user_id = ?")
                .bind(admin_user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(AdminUiState::from))
    }

    async fn save_ui_state(&self, state: &AdminUiState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_ui_state
                (admin_user_id, last_menu_message_id, last_requests_message_id, updated_at_ms)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(admin_user_id) DO UPDATE SET
                last_menu_message_id = excluded.last_menu_message_id,
                last_requests_message_id = excluded.last_requests_message_id,
                updated_at_ms = excluded.updated_at_ms
            "#,
        )
        .bind(state.admin_user_id)
        .bind(state.last_menu_message_id)
        .bind(state.last_requests_message_id)
        .bind(to_ms(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_raffle(&self, r: NewRaffle) -> Result<Raffle> {
        let id = sqlx::query(
            r#"
            INSERT INTO raffles (title, description, start_at_ms, end_at_ms, is_active, created_by)
            VALUES (?, ?, ?, ?, 1, ?)
            "#,
        )
        .bind(&r.title)
        .bind(&r.description)
        .bind(to_ms(r.start_at))
        .bind(r.end_at.map(to_ms))
        .bind(r.created_by)
        .execute(&self.pool)
        .await
        .map_err(db_err)?
        .last_insert_rowid();

        self.raffle(id)
            .await?
            .ok_or_else(|| Error::Storage(format!("raffle {id} vanished after insert")))
    }

    async fn raffle(&self, id: i64) -> Result<Option<Raffle>> {
        let row: Option<RaffleRow> = sqlx::query_as("SELECT * FROM raffles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Raffle::from))
    }

    async fn active_raffle(&self) -> Result<Option<Raffle>> {
        let row: Option<RaffleRow> =
            sqlx::query_as("SELECT * FROM raffles WHERE is_active = 1 ORDER BY id DESC LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(Raffle::from))
    }

    async fn add_participant(&self, raffle_id: i64, user_tg_id: i64) -> Result<bool> {
        let res = sqlx::query(
            r#"
            INSERT OR IGNORE INTO raffle_participants (raffle_id, user_tg_id, created_at_ms)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(raffle_id)
        .bind(user_tg_id)
        .bind(to_ms(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(res.rows_affected() == 1)
    }

    async fn participants(&self, raffle_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_tg_id FROM raffle_participants WHERE raffle_id = ? ORDER BY id",
        )
        .bind(raffle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn deactivate_raffle(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE raffles SET is_active = 0, updated_at_ms = ? WHERE id = ? AND is_active = 1",
        )
        .bind(to_ms(now))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(res.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    async fn buyer(s: &SqliteStore) -> User {
        s.upsert_user(UserUpsert {
            tg_id: 7,
            username: Some("buyer".to_string()),
            full_name: None,
            is_admin: false,
        })
        .await
        .unwrap()
    }

    async fn pending(s: &SqliteStore, user_id: i64, created_at: DateTime<Utc>) -> Request {
        s.insert_request(NewRequest {
            user_id,
            target: TargetRef::Lot(1),
            prepayment_amount: 2000,
            total_amount: 10000,
            details: Some("Самовывоз".to_string()),
            created_at,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_keeps_known_profile_fields() {
        let s = store().await;
        let first = buyer(&s).await;
        let second = s
            .upsert_user(UserUpsert {
                tg_id: 7,
                username: None,
                full_name: Some("Ivan".to_string()),
                is_admin: true,
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.username.as_deref(), Some("buyer"));
        assert_eq!(second.full_name.as_deref(), Some("Ivan"));
        assert!(second.is_admin);
    }

    #[tokio::test]
    async fn request_round_trips_through_columns() {
        let s = store().await;
        let u = buyer(&s).await;
        let created = pending(&s, u.id, Utc::now()).await;

        let loaded = s.request(created.id).await.unwrap().unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.target, TargetRef::Lot(1));
        assert_eq!(loaded.status, RequestStatus::Pending);
        assert_eq!(loaded.prepayment_amount, 2000);
        assert!(loaded.taken_at.is_none());
    }

    #[tokio::test]
    async fn take_is_conditional() {
        let s = store().await;
        let u = buyer(&s).await;
        let r = pending(&s, u.id, Utc::now()).await;
        let t1 = Utc::now();

        let Transition::Applied(taken) = s.take_request(r.id, 100, t1, false).await.unwrap() else {
            panic!("first take must apply");
        };
        assert_eq!(taken.status, RequestStatus::Processing);
        assert_eq!(taken.taken_by_admin_id, Some(100));
        assert_eq!(taken.taken_at.map(|t| t.timestamp_millis()), Some(t1.timestamp_millis()));

        let later = t1 + Duration::seconds(5);
        let Transition::Rejected(untouched) = s.take_request(r.id, 200, later, false).await.unwrap()
        else {
            panic!("second take must be rejected");
        };
        assert_eq!(untouched.taken_by_admin_id, Some(100));
        assert_eq!(untouched.taken_at, taken.taken_at);

        assert_eq!(
            s.take_request(999, 100, t1, false).await.unwrap(),
            Transition::Missing
        );
    }

    #[tokio::test]
    async fn racing_takes_apply_once() {
        let s = store().await;
        let u = buyer(&s).await;
        let r = pending(&s, u.id, Utc::now()).await;
        let now = Utc::now();

        let (a, b) = tokio::join!(
            s.take_request(r.id, 100, now, false),
            s.take_request(r.id, 200, now, false)
        );
        let applied = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(|t| matches!(t, Transition::Applied(_)))
            .count();
        assert_eq!(applied, 1);
    }

    #[tokio::test]
    async fn close_and_reopen() {
        let s = store().await;
        let u = buyer(&s).await;
        let r = pending(&s, u.id, Utc::now()).await;
        let now = Utc::now();

        let Transition::Applied(closed) = s.close_request(r.id, now).await.unwrap() else {
            panic!("close from pending must apply");
        };
        assert_eq!(closed.status, RequestStatus::Done);
        assert!(closed.closed_at.is_some());
        assert!(matches!(
            s.close_request(r.id, now).await.unwrap(),
            Transition::Rejected(_)
        ));
        assert!(matches!(
            s.take_request(r.id, 1, now, false).await.unwrap(),
            Transition::Rejected(_)
        ));

        let Transition::Applied(reopened) = s.take_request(r.id, 1, now, true).await.unwrap() else {
            panic!("reopen must apply when allowed");
        };
        assert_eq!(reopened.status, RequestStatus::Processing);
        assert!(reopened.closed_at.is_none());
    }

    #[tokio::test]
    async fn counts_and_paging() {
        let s = store().await;
        let u = buyer(&s).await;
        let t0 = Utc::now();
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(pending(&s, u.id, t0 + Duration::seconds(i)).await.id);
        }
        s.close_request(ids[0], t0).await.unwrap();
        s.take_request(ids[1], 1, t0, false).await.unwrap();

        let counts = s.count_by_status().await.unwrap();
        assert_eq!(
            counts,
            StatusCounts {
                pending: 2,
                processing: 1,
                done: 1
            }
        );

        let page = s
            .requests_by_status(RequestStatus::Pending, 0, 1)
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[3]);
        let next = s
            .requests_by_status(RequestStatus::Pending, 1, 1)
            .await
            .unwrap();
        assert_eq!(next[0].id, ids[2]);
    }

    #[tokio::test]
    async fn purge_is_selective_and_cascades() {
        let s = store().await;
        let u = buyer(&s).await;
        let now = Utc::now();
        let old = now - Duration::days(10);

        let old_done = pending(&s, u.id, old).await;
        let fresh_done = pending(&s, u.id, now).await;
        let old_pending = pending(&s, u.id, old).await;
        s.close_request(old_done.id, now).await.unwrap();
        s.close_request(fresh_done.id, now).await.unwrap();

        for r in [&old_done, &fresh_done, &old_pending] {
            for admin in [1, 2] {
                s.insert_notification(NewNotification {
                    admin_user_id: admin,
                    request_id: r.id,
                    message: Some(MessageRef::new(admin, r.id as i32)),
                    created_at: now,
                })
                .await
                .unwrap();
            }
        }

        let cutoff = now - Duration::days(7);
        let report = s
            .purge_requests(RequestStatus::Done, cutoff)
            .await
            .unwrap();
        assert_eq!(
            report,
            PurgeReport {
                requests: 1,
                notifications: 2
            }
        );
        assert!(s.request(old_done.id).await.unwrap().is_none());
        assert!(s.request(old_pending.id).await.unwrap().is_some());
        assert_eq!(s.visible_notifications(fresh_done.id).await.unwrap().len(), 2);
        assert_eq!(s.visible_notifications(old_pending.id).await.unwrap().len(), 2);

        let none = s
            .purge_requests(RequestStatus::Done, cutoff)
            .await
            .unwrap();
        assert_eq!(none, PurgeReport::default());
    }

    #[tokio::test]
    async fn latest_visible_notification_skips_hidden() {
        let s = store().await;
        let t0 = Utc::now();
        let first = s
            .insert_notification(NewNotification {
                admin_user_id: 1,
                request_id: 5,
                message: Some(MessageRef::new(100, 10)),
                created_at: t0,
            })
            .await
            .unwrap();
        let second = s
            .insert_notification(NewNotification {
                admin_user_id: 1,
                request_id: 5,
                message: Some(MessageRef::new(100, 11)),
                created_at: t0 + Duration::seconds(1),
            })
            .await
            .unwrap();

        let latest = s.latest_visible_notification(5, 1).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert_eq!(latest.message, Some(MessageRef::new(100, 11)));

        s.hide_notification(second.id).await.unwrap();
        s.hide_notification(second.id).await.unwrap();
        let latest = s.latest_visible_notification(5, 1).await.unwrap().unwrap();
        assert_eq!(latest.id, first.id);
        assert!(s.latest_visible_notification(5, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lots_save_and_delete() {
        let s = store().await;
        let mut lot = s
            .insert_lot(
                NewLot {
                    name: "Кресло".to_string(),
                    description: "Почти новое".to_string(),
                    price: 10000,
                    photo: "file-1".to_string(),
                    created_by: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(lot.is_active);
        assert_eq!(lot.status, LOT_STATUS_ACTIVE);

        lot.is_active = false;
        lot.status = LOT_STATUS_ARCHIVED.to_string();
        lot.message_id = Some(42);
        s.save_lot(&lot).await.unwrap();
        let loaded = s.lot(lot.id).await.unwrap().unwrap();
        assert!(!loaded.is_active);
        assert_eq!(loaded.message_id, Some(42));

        assert!(s.delete_lot(lot.id).await.unwrap());
        assert!(!s.delete_lot(lot.id).await.unwrap());
        assert!(s.save_lot(&lot).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn ui_state_upserts() {
        let s = store().await;
        assert!(s.ui_state(1).await.unwrap().is_none());
        let mut st = AdminUiState {
            admin_user_id: 1,
            last_menu_message_id: Some(10),
            last_requests_message_id: None,
        };
        s.save_ui_state(&st).await.unwrap();
        st.last_requests_message_id = Some(11);
        s.save_ui_state(&st).await.unwrap();
        assert_eq!(s.ui_state(1).await.unwrap(), Some(st));
    }

    #[tokio::test]
    async fn raffle_participation_is_unique() {
        let s = store().await;
        let r = s
            .insert_raffle(NewRaffle {
                title: "Приз".to_string(),
                description: String::new(),
                start_at: Utc::now(),
                end_at: None,
                created_by: None,
            })
            .await
            .unwrap();
        assert_eq!(s.active_raffle().await.unwrap().map(|x| x.id), Some(r.id));
        assert!(s.add_participant(r.id, 5).await.unwrap());
        assert!(!s.add_participant(r.id, 5).await.unwrap());
        assert!(s.add_participant(r.id, 6).await.unwrap());
        assert_eq!(s.participants(r.id).await.unwrap(), vec![5, 6]);

        assert!(s.deactivate_raffle(r.id, Utc::now()).await.unwrap());
        assert!(!s.deactivate_raffle(r.id, Utc::now()).await.unwrap());
        assert!(s.active_raffle().await.unwrap().is_none());
    }
}
