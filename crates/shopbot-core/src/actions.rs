//! Semantic button actions and their callback-data encoding.
//!
//! Telegram limits callback data to 64 bytes; every encoding here is a short
//! `name` or `name:arg[:arg]` string.

use std::fmt;

use crate::domain::RequestStatus;

/// Largest cleanup window a button may carry.
pub const MAX_PURGE_DAYS: i64 = 3650;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    // Client
    Catalog,
    BuyLot(i64),
    BuyLotDelivery(i64),
    JoinRaffle,
    BackToMain,

    // Admin navigation
    OpenAdminPanel,
    BackToAdmin,

    // Requests panel
    Requests,
    RequestsTab { status: RequestStatus, page: u32 },
    OpenRequest(i64),
    TakeRequest(i64),
    CloseRequest(i64),
    HideRequest(i64),
    ResendRequest(i64),
    ToggleRequestLot(i64),
    MessageBuyer(i64),
    CleanupPrompt,
    CleanupDo(i64),

    // Lots
    Lots,
    CreateLot,
    PublishLot,
    AdminLots,
    ToggleLot(i64),
    EditLot(i64),
    DeleteLot(i64),
    NoopLot(i64),

    // Raffles
    AdminRaffles,
    CreateRaffle,
    FinishRaffle(i64),

    Noop,
}

impl Action {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse callback data; `None` for anything we did not produce.
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        let name = parts.next()?;
        let arg = parts.next();
        let arg2 = parts.next();
        if parts.next().is_some() {
            return None;
        }

        let id = || arg.and_then(|s| s.parse::<i64>().ok());

        let action = match (name, arg) {
            ("catalog", None) => Action::Catalog,
            ("buy_lot", Some(_)) => Action::BuyLot(id()?),
            ("buy_lot_delivery", Some(_)) => Action::BuyLotDelivery(id()?),
            ("raffle", None) => Action::JoinRaffle,
            ("back_to_main", None) => Action::BackToMain,
            ("open_admin_panel", None) => Action::OpenAdminPanel,
            ("back_to_admin", None) => Action::BackToAdmin,
            ("requests", None) => Action::Requests,
            ("req_tab", Some(status)) => {
                let status = RequestStatus::parse(status).ok()?;
                let page = match arg2 {
                    Some(p) => p.parse::<u32>().ok()?,
                    None => 0,
                };
                return Some(Action::RequestsTab { status, page });
            }
            ("req_open", Some(_)) => Action::OpenRequest(id()?),
            ("req_take", Some(_)) => Action::TakeRequest(id()?),
            ("req_close", Some(_)) => Action::CloseRequest(id()?),
            ("hide_req", Some(_)) => Action::HideRequest(id()?),
            ("req_resend", Some(_)) => Action::ResendRequest(id()?),
            ("req_toggle_lot", Some(_)) => Action::ToggleRequestLot(id()?),
            ("req_msg", Some(_)) => Action::MessageBuyer(id()?),
            ("requests_cleanup", None) => Action::CleanupPrompt,
            ("requests_cleanup_do", Some(_)) => {
                let days = id()?;
                if !(0..=MAX_PURGE_DAYS).contains(&days) {
                    return None;
                }
                Action::CleanupDo(days)
            }
            ("lots", None) => Action::Lots,
            ("create_lot", None) => Action::CreateLot,
            ("publish_lot", None) => Action::PublishLot,
            ("admin_lots", None) => Action::AdminLots,
            ("toggle_status", Some(_)) => Action::ToggleLot(id()?),
            ("lot_edit", Some(_)) => Action::EditLot(id()?),
            ("lot_delete", Some(_)) => Action::DeleteLot(id()?),
            ("noop_lot", Some(_)) => Action::NoopLot(id()?),
            ("admin_raffle", None) => Action::AdminRaffles,
            ("raffle_create", None) => Action::CreateRaffle,
            ("raffle_finish", Some(_)) => Action::FinishRaffle(id()?),
            ("noop", None) => Action::Noop,
            _ => return None,
        };

        if arg2.is_some() {
            return None;
        }
        Some(action)
    }

    /// Actions only administrators may trigger.
    pub fn requires_admin(&self) -> bool {
        !matches!(
            self,
            Action::Catalog
                | Action::BuyLot(_)
                | Action::BuyLotDelivery(_)
                | Action::JoinRaffle
                | Action::BackToMain
                | Action::NoopLot(_)
                | Action::Noop
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Catalog => write!(f, "catalog"),
            Action::BuyLot(id) => write!(f, "buy_lot:{id}"),
            Action::BuyLotDelivery(id) => write!(f, "buy_lot_delivery:{id}"),
            Action::JoinRaffle => write!(f, "raffle"),
            Action::BackToMain => write!(f, "back_to_main"),
            Action::OpenAdminPanel => write!(f, "open_admin_panel"),
            Action::BackToAdmin => write!(f, "back_to_admin"),
            Action::Requests => write!(f, "requests"),
            Action::RequestsTab { status, page } => write!(f, "req_tab:{status}:{page}"),
            Action::OpenRequest(id) => write!(f, "req_open:{id}"),
            Action::TakeRequest(id) => write!(f, "req_take:{id}"),
            Action::CloseRequest(id) => write!(f, "req_close:{id}"),
            Action::HideRequest(id) => write!(f, "hide_req:{id}"),
            Action::ResendRequest(id) => write!(f, "req_resend:{id}"),
            Action::ToggleRequestLot(id) => write!(f, "req_toggle_lot:{id}"),
            Action::MessageBuyer(id) => write!(f, "req_msg:{id}"),
            Action::CleanupPrompt => write!(f, "requests_cleanup"),
            Action::CleanupDo(days) => write!(f, "requests_cleanup_do:{days}"),
            Action::Lots => write!(f, "lots"),
            Action::CreateLot => write!(f, "create_lot"),
            Action::PublishLot => write!(f, "publish_lot"),
            Action::AdminLots => write!(f, "admin_lots"),
            Action::ToggleLot(id) => write!(f, "toggle_status:{id}"),
            Action::EditLot(id) => write!(f, "lot_edit:{id}"),
            Action::DeleteLot(id) => write!(f, "lot_delete:{id}"),
            Action::NoopLot(id) => write!(f, "noop_lot:{id}"),
            Action::AdminRaffles => write!(f, "admin_raffle"),
            Action::CreateRaffle => write!(f, "raffle_create"),
            Action::FinishRaffle(id) => write!(f, "raffle_finish:{id}"),
            Action::Noop => write!(f, "noop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tab_with_and_without_page() {
        assert_eq!(
            Action::parse("req_tab:processing:3"),
            Some(Action::RequestsTab {
                status: RequestStatus::Processing,
                page: 3
            })
        );
        assert_eq!(
            Action::parse("req_tab:done"),
            Some(Action::RequestsTab {
                status: RequestStatus::Done,
                page: 0
            })
        );
        assert_eq!(Action::parse("req_tab:archived:1"), None);
    }

    #[test]
    fn rejects_malformed_data() {
        assert_eq!(Action::parse(""), None);
        assert_eq!(Action::parse("req_take"), None);
        assert_eq!(Action::parse("req_take:abc"), None);
        assert_eq!(Action::parse("req_take:1:2"), None);
        assert_eq!(Action::parse("catalog:1"), None);
        assert_eq!(Action::parse("askuser:1:2"), None);
    }

    #[test]
    fn cleanup_window_is_bounded() {
        assert_eq!(
            Action::parse("requests_cleanup_do:3650"),
            Some(Action::CleanupDo(MAX_PURGE_DAYS))
        );
        assert_eq!(Action::parse("requests_cleanup_do:0"), Some(Action::CleanupDo(0)));
        assert_eq!(Action::parse("requests_cleanup_do:3651"), None);
        assert_eq!(Action::parse("requests_cleanup_do:-1"), None);
        assert_eq!(
            Action::parse(&format!("requests_cleanup_do:{}", i64::MAX)),
            None
        );
    }

    #[test]
    fn encodings_fit_callback_limit_and_parse_back() {
        let samples = [
            Action::BuyLotDelivery(i64::MAX),
            Action::RequestsTab {
                status: RequestStatus::Processing,
                page: u32::MAX,
            },
            Action::CleanupDo(7),
            Action::ToggleRequestLot(123456789),
        ];
        for a in samples {
            let data = a.encode();
            assert!(data.len() <= 64, "{data} exceeds 64 bytes");
            assert_eq!(Action::parse(&data), Some(a));
        }
    }

    #[test]
    fn buyer_actions_do_not_require_admin() {
        assert!(!Action::BuyLot(1).requires_admin());
        assert!(!Action::JoinRaffle.requires_admin());
        assert!(Action::TakeRequest(1).requires_admin());
        assert!(Action::CleanupDo(7).requires_admin());
    }
}
