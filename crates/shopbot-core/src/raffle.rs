use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    audit::{AuditEvent, AuditLogger},
    domain::{ChatId, NewRaffle, Raffle, User},
    errors::Error,
    formatting::escape_html,
    messaging::port::MessagingPort,
    store::ShopStore,
    Result,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FinishReport {
    pub participants: usize,
    pub notified: usize,
}

pub struct Raffles {
    store: Arc<dyn ShopStore>,
    messenger: Arc<dyn MessagingPort>,
    audit: AuditLogger,
}

impl Raffles {
    pub fn new(
        store: Arc<dyn ShopStore>,
        messenger: Arc<dyn MessagingPort>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            store,
            messenger,
            audit,
        }
    }

    /// Start a raffle now. Only one raffle may be active at a time.
    pub async fn create(
        &self,
        admin: &User,
        title: &str,
        description: &str,
        end_at: Option<DateTime<Utc>>,
    ) -> Result<Raffle> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Название розыгрыша пустое".to_string()));
        }
        let now = Utc::now();
        if matches!(end_at, Some(end) if end <= now) {
            return Err(Error::Validation(
                "Дата окончания должна быть в будущем".to_string(),
            ));
        }
        if self.store.active_raffle().await?.is_some() {
            return Err(Error::Conflict("Уже есть активный розыгрыш".to_string()));
        }
        let raffle = self
            .store
            .insert_raffle(NewRaffle {
                title: title.to_string(),
                description: description.trim().to_string(),
                start_at: now,
                end_at,
                created_by: Some(admin.id),
            })
            .await?;
        tracing::info!(raffle_id = raffle.id, "raffle created");
        Ok(raffle)
    }

    /// Active raffle with its participant count.
    pub async fn active(&self) -> Result<Option<(Raffle, usize)>> {
        let Some(r) = self.store.active_raffle().await? else {
            return Ok(None);
        };
        let n = self.store.participants(r.id).await?.len();
        Ok(Some((r, n)))
    }

    pub async fn join(&self, user_tg_id: i64) -> Result<Raffle> {
        self.join_at(user_tg_id, Utc::now()).await
    }

    pub async fn join_at(&self, user_tg_id: i64, now: DateTime<Utc>) -> Result<Raffle> {
        let raffle = self
            .store
            .active_raffle()
            .await?
            .ok_or_else(|| Error::NotFound("активный розыгрыш".to_string()))?;
        if now < raffle.start_at {
            return Err(Error::Validation("Розыгрыш ещё не начался ⏳".to_string()));
        }
        if matches!(raffle.end_at, Some(end) if now > end) {
            return Err(Error::Validation("Розыгрыш уже завершён 🏁".to_string()));
        }
        if !self.store.add_participant(raffle.id, user_tg_id).await? {
            return Err(Error::Conflict(
                "Вы уже участвуете в этом розыгрыше!".to_string(),
            ));
        }
        Ok(raffle)
    }

    /// Deactivate and tell every participant; undelivered messages are logged.
    pub async fn finish(&self, id: i64) -> Result<FinishReport> {
        let raffle = self
            .store
            .raffle(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("розыгрыш {id}")))?;
        if !self.store.deactivate_raffle(id, Utc::now()).await? {
            return Err(Error::Conflict("Розыгрыш уже завершён".to_string()));
        }

        let participants = self.store.participants(id).await?;
        let text = format!("🏁 Розыгрыш «{}» завершён!", escape_html(&raffle.title));
        let mut notified = 0;
        for tg_id in &participants {
            match self.messenger.send_html(ChatId(*tg_id), &text, None).await {
                Ok(_) => notified += 1,
                Err(e) => tracing::warn!(raffle_id = id, user = tg_id, error = %e, "raffle notice failed"),
            }
        }

        let report = FinishReport {
            participants: participants.len(),
            notified,
        };
        self.audit.record(AuditEvent::raffle(
            "raffle_finished",
            id,
            Some(&format!(
                "participants={} notified={}",
                report.participants, report.notified
            )),
        ));
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use chrono::Duration;

    #[tokio::test]
    async fn join_rules() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;

        let err = h.shop.raffles.join(5).await.unwrap_err();
        assert!(err.is_not_found());

        let r = h
            .shop
            .raffles
            .create(&admin, "Приз", "Кресло", Some(Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert_eq!(h.shop.raffles.join(5).await.unwrap().id, r.id);
        assert!(h.shop.raffles.join(5).await.unwrap_err().is_conflict());

        let early = r.start_at - Duration::minutes(1);
        assert!(matches!(
            h.shop.raffles.join_at(6, early).await,
            Err(Error::Validation(_))
        ));
        let late = r.end_at.unwrap() + Duration::minutes(1);
        assert!(matches!(
            h.shop.raffles.join_at(6, late).await,
            Err(Error::Validation(_))
        ));

        let (_, n) = h.shop.raffles.active().await.unwrap().unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn create_rejects_second_active_and_past_end() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let past = Some(Utc::now() - Duration::hours(1));
        assert!(matches!(
            h.shop.raffles.create(&admin, "x", "", past).await,
            Err(Error::Validation(_))
        ));
        h.shop.raffles.create(&admin, "x", "", None).await.unwrap();
        assert!(h
            .shop
            .raffles
            .create(&admin, "y", "", None)
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn finish_notifies_participants_best_effort() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let r = h.shop.raffles.create(&admin, "Приз", "", None).await.unwrap();
        for tg in [11, 12, 13] {
            h.shop.raffles.join(tg).await.unwrap();
        }
        h.api.fail_chat(12);

        let report = h.shop.raffles.finish(r.id).await.unwrap();
        assert_eq!(
            report,
            FinishReport {
                participants: 3,
                notified: 2
            }
        );
        assert!(h.api.sent_to(11)[0].text.contains("Приз"));
        assert!(h.shop.raffles.active().await.unwrap().is_none());
        assert!(h.shop.raffles.join(11).await.unwrap_err().is_not_found());
        assert!(h.shop.raffles.finish(r.id).await.unwrap_err().is_conflict());
    }
}
