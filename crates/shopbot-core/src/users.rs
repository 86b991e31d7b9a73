use std::sync::Arc;

use crate::{
    config::Config,
    domain::{Identity, User, UserUpsert},
    errors::Error,
    store::ShopStore,
    Result,
};

/// Maps platform identities to internal user records, creating them lazily.
#[derive(Clone)]
pub struct UserDirectory {
    cfg: Arc<Config>,
    store: Arc<dyn ShopStore>,
}

impl UserDirectory {
    pub fn new(cfg: Arc<Config>, store: Arc<dyn ShopStore>) -> Self {
        Self { cfg, store }
    }

    /// Upsert by `tg_id`. Profile fields are refreshed when the update carries
    /// them; the admin flag always follows the configured admin set.
    pub async fn resolve(&self, who: &Identity) -> Result<User> {
        self.store
            .upsert_user(UserUpsert {
                tg_id: who.tg_id,
                username: who.username.clone(),
                full_name: who.full_name.clone(),
                is_admin: self.cfg.is_admin(who.tg_id),
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        self.store
            .user(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("пользователь {id}")))
    }

    pub async fn find(&self, id: Option<i64>) -> Result<Option<User>> {
        match id {
            Some(id) => self.store.user(id).await,
            None => Ok(None),
        }
    }

    /// Configured admins that already have a user record.
    pub async fn known_admins(&self) -> Result<Vec<User>> {
        let mut out = Vec::with_capacity(self.cfg.admins.len());
        for tg_id in &self.cfg.admins {
            if let Some(u) = self.store.user_by_tg(*tg_id).await? {
                out.push(u);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn resolve_is_lazy_and_tracks_admin_set() {
        let cfg = Arc::new(Config::for_admins(vec![100]));
        let dir = UserDirectory::new(cfg, Arc::new(MemoryStore::new()));

        assert!(dir.known_admins().await.unwrap().is_empty());

        let admin = dir.resolve(&Identity::new(100)).await.unwrap();
        assert!(admin.is_admin);
        let again = dir.resolve(&Identity::new(100)).await.unwrap();
        assert_eq!(admin.id, again.id);

        let buyer = dir
            .resolve(&Identity {
                tg_id: 7,
                username: Some("buyer".to_string()),
                full_name: None,
            })
            .await
            .unwrap();
        assert!(!buyer.is_admin);
        assert_eq!(dir.get(buyer.id).await.unwrap().tg_id, 7);
        assert!(dir.get(9999).await.unwrap_err().is_not_found());

        let admins = dir.known_admins().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].tg_id, 100);
    }
}
