use std::sync::Arc;

use chrono::Utc;

use crate::{
    audit::{AuditEvent, AuditLogger},
    config::Config,
    domain::{
        ChatId, Lot, MessageRef, NewLot, Sellable, TargetRef, User, LOT_STATUS_ACTIVE,
        LOT_STATUS_ARCHIVED,
    },
    errors::Error,
    messaging::{port::MessagingPort, types::PhotoRef},
    store::ShopStore,
    views, Result,
};

/// Input of the lot creation dialog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LotDraft {
    pub name: String,
    pub description: String,
    pub price: i64,
    /// Telegram file id of the uploaded photo.
    pub photo: String,
}

impl LotDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Название лота не может быть пустым".to_string()));
        }
        if self.price < 0 {
            return Err(Error::Validation("Цена не может быть отрицательной".to_string()));
        }
        if self.photo.trim().is_empty() {
            return Err(Error::Validation("Нужно фото лота".to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LotEdit {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}

/// Lots and their group posts.
pub struct Catalog {
    cfg: Arc<Config>,
    store: Arc<dyn ShopStore>,
    messenger: Arc<dyn MessagingPort>,
    audit: AuditLogger,
}

impl Catalog {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn ShopStore>,
        messenger: Arc<dyn MessagingPort>,
        audit: AuditLogger,
    ) -> Self {
        Self {
            cfg,
            store,
            messenger,
            audit,
        }
    }

    fn group(&self) -> ChatId {
        ChatId(self.cfg.group_id)
    }

    pub async fn lot(&self, id: i64) -> Result<Lot> {
        self.store
            .lot(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("лот {id}")))
    }

    pub async fn lots(&self) -> Result<Vec<Lot>> {
        self.store.lots().await
    }

    /// Lots paired with their group post links.
    pub async fn lots_with_links(&self) -> Result<Vec<(Lot, Option<String>)>> {
        let lots = self.store.lots().await?;
        Ok(lots
            .into_iter()
            .map(|l| {
                let link = self.post_link(&l);
                (l, link)
            })
            .collect())
    }

    pub async fn resolve(&self, target: TargetRef) -> Result<Sellable> {
        self.find(target)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} {}", target.kind(), target.id())))
    }

    /// Like `resolve`, but a missing target is `None` (it may have been
    /// deleted after the request was placed).
    pub async fn find(&self, target: TargetRef) -> Result<Option<Sellable>> {
        match target {
            TargetRef::Lot(id) => Ok(self.store.lot(id).await?.as_ref().map(Sellable::from)),
            TargetRef::Product(id) => Ok(self
                .store
                .product(id)
                .await?
                .as_ref()
                .map(Sellable::from)),
        }
    }

    /// `https://t.me/<username>/<mid>` for public groups, otherwise the
    /// private `t.me/c/<id>/<mid>` form with the `-100` prefix stripped.
    pub fn post_link(&self, lot: &Lot) -> Option<String> {
        let mid = lot.message_id?;
        if let Some(un) = &self.cfg.group_username {
            return Some(format!("https://t.me/{un}/{mid}"));
        }
        if self.cfg.group_id == 0 {
            return None;
        }
        let gid = self.cfg.group_id.to_string();
        let base = match gid.strip_prefix("-100") {
            Some(rest) => rest.to_string(),
            None => self.cfg.group_id.unsigned_abs().to_string(),
        };
        Some(format!("https://t.me/c/{base}/{mid}"))
    }

    /// The post caption must fit the messenger's limit even with the sold
    /// mark appended.
    pub fn check_caption(&self, name: &str, description: &str, price: i64) -> Result<()> {
        let len = views::lot_preview_caption(name, description, price)
            .chars()
            .count()
            + views::LOT_SOLD_MARK.chars().count();
        let max = self.messenger.capabilities().max_caption_len;
        if len > max {
            return Err(Error::Validation(format!(
                "Описание слишком длинное: {len} символов при лимите {max}"
            )));
        }
        Ok(())
    }

    /// Insert the lot and post it to the group with buy buttons. If the post
    /// cannot be delivered the row is removed again and the error returned.
    pub async fn publish_lot(&self, author: &User, draft: LotDraft) -> Result<Lot> {
        draft.validate()?;
        self.check_caption(draft.name.trim(), draft.description.trim(), draft.price)?;
        if self.cfg.group_id == 0 {
            return Err(Error::Config("GROUP_ID is not configured".to_string()));
        }

        let mut lot = self
            .store
            .insert_lot(
                NewLot {
                    name: draft.name.trim().to_string(),
                    description: draft.description.trim().to_string(),
                    price: draft.price,
                    photo: draft.photo,
                    created_by: Some(author.id),
                },
                Utc::now(),
            )
            .await?;

        let posted = self
            .messenger
            .send_photo(
                self.group(),
                PhotoRef::FileId(lot.photo.clone()),
                &views::lot_caption(&lot),
                views::buy_keyboard(&lot),
            )
            .await;
        let msg = match posted {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(lot_id = lot.id, error = %e, "lot post failed; rolling back");
                self.store.delete_lot(lot.id).await?;
                return Err(e);
            }
        };

        lot.message_id = Some(msg.message_id.0);
        self.store.save_lot(&lot).await?;

        tracing::info!(lot_id = lot.id, message_id = msg.message_id.0, "lot published");
        self.audit.record(AuditEvent::lot(
            "lot_published",
            Some(author.tg_id),
            lot.id,
            Some(&lot.name),
        ));
        Ok(lot)
    }

    /// Flip availability: the status label follows, and the group post gets
    /// its caption refreshed with buy buttons shown only while active.
    pub async fn toggle_lot(&self, id: i64, actor_tg_id: Option<i64>) -> Result<Lot> {
        let mut lot = self.lot(id).await?;
        lot.is_active = !lot.is_active;
        lot.status = if lot.is_active {
            LOT_STATUS_ACTIVE
        } else {
            LOT_STATUS_ARCHIVED
        }
        .to_string();
        lot.updated_at = Some(Utc::now());
        self.store.save_lot(&lot).await?;

        self.refresh_post(&lot).await;
        self.audit.record(AuditEvent::lot(
            "lot_toggled",
            actor_tg_id,
            lot.id,
            Some(&lot.status),
        ));
        Ok(lot)
    }

    pub async fn edit_lot(&self, id: i64, edit: LotEdit) -> Result<Lot> {
        let mut lot = self.lot(id).await?;
        if let Some(name) = edit.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::Validation(
                    "Название лота не может быть пустым".to_string(),
                ));
            }
            lot.name = name.to_string();
        }
        if let Some(description) = edit.description {
            lot.description = description.trim().to_string();
        }
        if let Some(price) = edit.price {
            if price < 0 {
                return Err(Error::Validation(
                    "Цена не может быть отрицательной".to_string(),
                ));
            }
            lot.price = price;
        }
        self.check_caption(&lot.name, &lot.description, lot.price)?;
        lot.updated_at = Some(Utc::now());
        self.store.save_lot(&lot).await?;
        self.refresh_post(&lot).await;
        Ok(lot)
    }

    /// Retract the group post, then delete the row. A post that cannot be
    /// retracted keeps the lot in place.
    pub async fn delete_lot(&self, id: i64, actor_tg_id: Option<i64>) -> Result<()> {
        let lot = self.lot(id).await?;
        if let Some(mid) = lot.message_id {
            self.messenger
                .delete_message(MessageRef::new(self.cfg.group_id, mid))
                .await?;
        }
        self.store.delete_lot(id).await?;
        tracing::info!(lot_id = id, "lot deleted");
        self.audit.record(AuditEvent::lot(
            "lot_deleted",
            actor_tg_id,
            id,
            Some(&lot.name),
        ));
        Ok(())
    }

    async fn refresh_post(&self, lot: &Lot) {
        let Some(mid) = lot.message_id else {
            return;
        };
        let msg = MessageRef::new(self.cfg.group_id, mid);
        if let Err(e) = self
            .messenger
            .edit_caption(msg, &views::lot_caption(lot), views::buy_keyboard(lot))
            .await
        {
            tracing::warn!(lot_id = lot.id, error = %e, "failed to refresh lot post");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{actions::Action, domain::NewProduct, testing::*};

    fn draft() -> LotDraft {
        LotDraft {
            name: "  Кресло ".to_string(),
            description: "Почти новое".to_string(),
            price: 10000,
            photo: "file-1".to_string(),
        }
    }

    #[tokio::test]
    async fn publish_posts_to_group_with_buy_buttons() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let lot = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap();

        assert_eq!(lot.name, "Кресло");
        let posts = h.api.sent_to(-1001234567890);
        assert_eq!(posts.len(), 1);
        assert!(posts[0].photo);
        let kb = posts[0].keyboard.as_ref().unwrap();
        assert_eq!(
            kb.actions(),
            vec![&Action::BuyLot(lot.id), &Action::BuyLotDelivery(lot.id)]
        );

        let stored = h.shop.catalog.lot(lot.id).await.unwrap();
        assert_eq!(stored.message_id, Some(posts[0].msg.message_id.0));
        assert_eq!(
            h.shop.catalog.post_link(&stored),
            Some(format!("https://t.me/c/1234567890/{}", posts[0].msg.message_id.0))
        );
    }

    #[tokio::test]
    async fn failed_post_rolls_back_the_lot() {
        let h = Harness::new();
        h.api.fail_chat(-1001234567890);
        let admin = h.user(ADMIN_A).await;
        let err = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap_err();
        assert!(matches!(err, Error::Delivery(_)));
        assert!(h.shop.catalog.lots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_drafts_are_rejected_before_storage() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let mut d = draft();
        d.name = "   ".to_string();
        let err = h.shop.catalog.publish_lot(&admin, d).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.api.sends.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn overlong_caption_is_rejected_before_posting() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let mut d = draft();
        d.description = "а".repeat(1000);
        let err = h.shop.catalog.publish_lot(&admin, d).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.shop.catalog.lots().await.unwrap().is_empty());
        assert!(h.api.sends.lock().unwrap().is_empty());

        let lot = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap();
        let edit = LotEdit {
            description: Some("б".repeat(1000)),
            ..Default::default()
        };
        let err = h.shop.catalog.edit_lot(lot.id, edit).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let stored = h.shop.catalog.lot(lot.id).await.unwrap();
        assert_eq!(stored.description, "Почти новое");
    }

    #[tokio::test]
    async fn toggle_updates_label_and_post_keyboard() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let lot = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap();

        let off = h.shop.catalog.toggle_lot(lot.id, Some(ADMIN_A)).await.unwrap();
        assert!(!off.is_active);
        assert_eq!(off.status, LOT_STATUS_ARCHIVED);
        let (_, kb) = h.api.keyboard_edits.lock().unwrap().last().cloned().unwrap();
        assert!(kb.is_none());

        let on = h.shop.catalog.toggle_lot(lot.id, Some(ADMIN_A)).await.unwrap();
        assert!(on.is_active);
        assert_eq!(on.status, LOT_STATUS_ACTIVE);
        let (_, kb) = h.api.keyboard_edits.lock().unwrap().last().cloned().unwrap();
        assert!(kb.is_some());
    }

    #[tokio::test]
    async fn delete_retracts_post_first() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let lot = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap();

        h.shop.catalog.delete_lot(lot.id, Some(ADMIN_A)).await.unwrap();
        assert_eq!(
            h.api.deleted(),
            vec![MessageRef::new(-1001234567890, lot.message_id.unwrap())]
        );
        assert!(h.shop.catalog.lot(lot.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn delete_keeps_lot_when_post_cannot_be_retracted() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let lot = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap();
        h.api.fail_deletes();

        assert!(h.shop.catalog.delete_lot(lot.id, None).await.is_err());
        assert!(h.shop.catalog.lot(lot.id).await.is_ok());
    }

    #[tokio::test]
    async fn edit_validates_and_refreshes_caption() {
        let h = Harness::new();
        let admin = h.user(ADMIN_A).await;
        let lot = h.shop.catalog.publish_lot(&admin, draft()).await.unwrap();

        let err = h
            .shop
            .catalog
            .edit_lot(
                lot.id,
                LotEdit {
                    price: Some(-1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let edited = h
            .shop
            .catalog
            .edit_lot(
                lot.id,
                LotEdit {
                    name: Some("Диван".to_string()),
                    price: Some(15000),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.price, 15000);
        let post = MessageRef::new(-1001234567890, lot.message_id.unwrap());
        let edits = h.api.edits_of(post);
        assert!(edits.last().unwrap().contains("Диван"));
        assert!(edits.last().unwrap().contains("15.000 руб."));
    }

    #[tokio::test]
    async fn resolve_covers_both_target_kinds() {
        let h = Harness::new();
        let product = h
            .store
            .insert_product(
                NewProduct {
                    name: "Подписка".to_string(),
                    kind: "digital".to_string(),
                    description: None,
                    price: 500,
                    photo: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let s = h
            .shop
            .catalog
            .resolve(TargetRef::Product(product.id))
            .await
            .unwrap();
        assert_eq!(s.price, 500);
        assert!(s.active);
        assert!(h
            .shop
            .catalog
            .resolve(TargetRef::Lot(404))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn post_link_prefers_public_username() {
        let mut cfg = Config::for_admins(vec![1]);
        cfg.group_username = Some("shopgroup".to_string());
        let h = Harness::with_config(cfg);
        let lot = Lot {
            id: 1,
            name: "x".to_string(),
            description: String::new(),
            price: 0,
            photo: String::new(),
            is_active: true,
            message_id: Some(42),
            created_by: None,
            status: LOT_STATUS_ACTIVE.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        };
        assert_eq!(
            h.shop.catalog.post_link(&lot),
            Some("https://t.me/shopgroup/42".to_string())
        );
        let unposted = Lot {
            message_id: None,
            ..lot
        };
        assert_eq!(h.shop.catalog.post_link(&unposted), None);
    }
}
