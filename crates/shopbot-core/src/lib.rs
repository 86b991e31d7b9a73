//! Core domain + application logic for the lot-shop Telegram bot.
//!
//! This crate is framework-agnostic. Telegram and the SQL database live behind
//! ports (`MessagingPort`, `ShopStore`) implemented in adapter crates.

use std::sync::Arc;

pub mod actions;
pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod lifecycle;
pub mod logging;
pub mod messaging;
pub mod panels;
pub mod raffle;
pub mod security;
pub mod store;
pub mod users;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

use crate::{
    audit::AuditLogger, catalog::Catalog, config::Config, lifecycle::RequestLifecycle,
    messaging::port::MessagingPort, panels::AdminPanels, raffle::Raffles, store::ShopStore,
    users::UserDirectory,
};

/// The application services, wired over one store and one messenger.
pub struct Shop {
    pub cfg: Arc<Config>,
    pub users: UserDirectory,
    pub catalog: Arc<Catalog>,
    pub panels: Arc<AdminPanels>,
    pub requests: RequestLifecycle,
    pub raffles: Raffles,
}

impl Shop {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn ShopStore>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let audit = AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json);
        let users = UserDirectory::new(cfg.clone(), store.clone());
        let catalog = Arc::new(Catalog::new(
            cfg.clone(),
            store.clone(),
            messenger.clone(),
            audit.clone(),
        ));
        let panels = Arc::new(AdminPanels::new(
            store.clone(),
            messenger.clone(),
            users.clone(),
        ));
        let requests = RequestLifecycle::new(
            cfg.clone(),
            store.clone(),
            messenger.clone(),
            users.clone(),
            catalog.clone(),
            panels.clone(),
            audit.clone(),
        );
        let raffles = Raffles::new(store, messenger, audit);

        Self {
            cfg,
            users,
            catalog,
            panels,
            requests,
            raffles,
        }
    }
}
