use std::sync::Arc;

use crate::{
    domain::{AdminUiState, MessageRef, User},
    messaging::port::MessagingPort,
    store::ShopStore,
    users::UserDirectory,
    views, Result,
};

/// Tracks the last rendered panel messages per admin so counters can be
/// refreshed in place.
pub struct AdminPanels {
    store: Arc<dyn ShopStore>,
    messenger: Arc<dyn MessagingPort>,
    users: UserDirectory,
}

impl AdminPanels {
    pub fn new(
        store: Arc<dyn ShopStore>,
        messenger: Arc<dyn MessagingPort>,
        users: UserDirectory,
    ) -> Self {
        Self {
            store,
            messenger,
            users,
        }
    }

    async fn state(&self, admin: &User) -> Result<AdminUiState> {
        Ok(self
            .store
            .ui_state(admin.id)
            .await?
            .unwrap_or(AdminUiState {
                admin_user_id: admin.id,
                ..Default::default()
            }))
    }

    pub async fn remember_menu(&self, admin: &User, msg: MessageRef) -> Result<()> {
        let mut st = self.state(admin).await?;
        st.last_menu_message_id = Some(msg.message_id.0);
        self.store.save_ui_state(&st).await
    }

    pub async fn remember_requests(&self, admin: &User, msg: MessageRef) -> Result<()> {
        let mut st = self.state(admin).await?;
        st.last_requests_message_id = Some(msg.message_id.0);
        self.store.save_ui_state(&st).await
    }

    /// Re-render the admin's remembered panels with current counts. Edit
    /// failures are logged; the panel may simply have been deleted.
    pub async fn refresh(&self, admin: &User) -> Result<()> {
        let Some(st) = self.store.ui_state(admin.id).await? else {
            return Ok(());
        };
        let counts = self.store.count_by_status().await?;

        if let Some(mid) = st.last_menu_message_id {
            let msg = MessageRef::new(admin.tg_id, mid);
            if let Err(e) = self
                .messenger
                .edit_caption(
                    msg,
                    views::ADMIN_PANEL_CAPTION,
                    Some(views::admin_panel(counts.pending)),
                )
                .await
            {
                tracing::debug!(admin = admin.tg_id, error = %e, "admin menu refresh failed");
            }
        }

        if let Some(mid) = st.last_requests_message_id {
            let msg = MessageRef::new(admin.tg_id, mid);
            if let Err(e) = self
                .messenger
                .edit_caption(
                    msg,
                    &views::requests_root_caption(&counts),
                    Some(views::requests_root_keyboard(&counts)),
                )
                .await
            {
                tracing::debug!(admin = admin.tg_id, error = %e, "requests panel refresh failed");
            }
        }
        Ok(())
    }

    pub async fn refresh_all(&self) {
        let admins = match self.users.known_admins().await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list admins for panel refresh");
                return;
            }
        };
        for admin in admins {
            if let Err(e) = self.refresh(&admin).await {
                tracing::warn!(admin = admin.tg_id, error = %e, "panel refresh failed");
            }
        }
    }
}
