//! Captions and keyboards shared by the services and the Telegram handlers.

use crate::{
    actions::Action,
    domain::{Lot, Raffle, Request, RequestStatus, StatusCounts, TargetRef, User},
    formatting::{
        availability_dot, escape_html, fmt_dt, format_elapsed, format_price_rub, status_badge,
        status_icon, truncate_title,
    },
    lifecycle::{RequestCard, RequestPage},
    messaging::types::{Button, Keyboard},
};

pub const ADMIN_PANEL_CAPTION: &str = "⚙ Панель администратора:\nВыберите раздел:";
pub const LOTS_PANEL_CAPTION: &str = "📦 Управление лотами:";
pub const CLIENT_MENU_HINT: &str = "Выберите действие ниже:";

/// Max chars of a lot name inside a request list button.
pub const TRIM_LEN: usize = 48;

fn back(action: Action) -> Button {
    Button::action("⬅ Назад", action)
}

// ============== Menus ==============

pub fn client_menu(is_admin: bool) -> Keyboard {
    let mut kb = Keyboard::column(vec![
        Button::action("📂 Каталог", Action::Catalog),
        Button::action("🎁 Участвовать в розыгрыше", Action::JoinRaffle),
    ]);
    if is_admin {
        kb = kb.push(Button::action(
            "⚙ Панель администратора",
            Action::OpenAdminPanel,
        ));
    }
    kb
}

pub fn admin_panel(pending: i64) -> Keyboard {
    Keyboard::column(vec![
        Button::action(format!("📑 Заявки (Новых: {pending})"), Action::Requests),
        Button::action("📦 Лоты", Action::Lots),
        Button::action("🎁 Розыгрыши", Action::AdminRaffles),
        back(Action::BackToMain),
    ])
}

pub fn lots_menu() -> Keyboard {
    Keyboard::column(vec![
        Button::action("➕ Создать лот", Action::CreateLot),
        Button::action("📋 Список лотов", Action::AdminLots),
        back(Action::BackToAdmin),
    ])
}

pub fn back_only(action: Action) -> Keyboard {
    Keyboard::column(vec![back(action)])
}

// ============== Lots ==============

/// Caption of a lot post, also used for the pre-publish preview.
pub fn lot_preview_caption(name: &str, description: &str, price: i64) -> String {
    format!(
        "📦 <b>{}</b>\n\n{}\n\n💰 <b>{}</b>",
        escape_html(name),
        escape_html(description),
        format_price_rub(price)
    )
}

/// Appended to the post caption while a lot is sold.
pub const LOT_SOLD_MARK: &str = "\n\n🔴 <b>Продано</b>";

pub fn lot_caption(lot: &Lot) -> String {
    let mut out = lot_preview_caption(&lot.name, &lot.description, lot.price);
    if !lot.is_active {
        out.push_str(LOT_SOLD_MARK);
    }
    out
}

/// Buy buttons under a group post; removed while the lot is inactive.
pub fn buy_keyboard(lot: &Lot) -> Option<Keyboard> {
    if !lot.is_active {
        return None;
    }
    Some(Keyboard::column(vec![
        Button::action("🛒 Купить", Action::BuyLot(lot.id)),
        Button::action("🚚 Купить с доставкой", Action::BuyLotDelivery(lot.id)),
    ]))
}

pub fn lot_preview_keyboard() -> Keyboard {
    Keyboard::column(vec![
        Button::action("✅ Опубликовать", Action::PublishLot),
        back(Action::Lots),
    ])
}

pub fn catalog_text(lots: &[(Lot, Option<String>)]) -> String {
    if lots.is_empty() {
        return "📦 Каталог пуст, пока нет доступных лотов.".to_string();
    }
    let mut lines = vec!["📂 <b>Каталог лотов:</b>\n".to_string()];
    for (lot, link) in lots {
        let title = match link {
            Some(link) => format!("<a href=\"{}\">Лот ID: {}</a>", escape_html(link), lot.id),
            None => format!("Лот ID: {}", lot.id),
        };
        let status = if lot.is_active {
            "🟢 В наличии"
        } else {
            "🔴 Продан"
        };
        lines.push(format!(
            "📦 {title} | {}\n💰 {}\n{status}\n──────────────────────",
            escape_html(&lot.name),
            format_price_rub(lot.price)
        ));
    }
    lines.join("\n")
}

pub fn admin_lots_keyboard(lots: &[(Lot, Option<String>)]) -> Keyboard {
    let mut kb = Keyboard::default();
    for (lot, link) in lots {
        let label = format!(
            "{} id-{} | {} | {}",
            availability_dot(lot.is_active),
            lot.id,
            truncate_title(&lot.name, 20),
            format_price_rub(lot.price)
        );
        let left = match link {
            Some(link) => Button::url(label, link.clone()),
            None => Button::action(label, Action::NoopLot(lot.id)),
        };
        kb = kb.push(left).push_row(vec![
            Button::action("🔄 Статус", Action::ToggleLot(lot.id)),
            Button::action("✏ Изменить", Action::EditLot(lot.id)),
            Button::action("🗑 Удалить", Action::DeleteLot(lot.id)),
        ]);
    }
    kb.push(back(Action::Lots))
}

// ============== Requests ==============

pub fn requests_root_caption(counts: &StatusCounts) -> String {
    format!("📑 Заявки (всего: {})", counts.total())
}

pub fn requests_root_keyboard(counts: &StatusCounts) -> Keyboard {
    let mut kb = Keyboard::default();
    for status in RequestStatus::ALL {
        kb = kb.push(Button::action(
            format!("{} ({})", status_badge(status), counts.get(status)),
            Action::RequestsTab { status, page: 0 },
        ));
    }
    kb.push(Button::action("🧹 Очистка закрытых", Action::CleanupPrompt))
        .push(back(Action::BackToAdmin))
}

pub fn requests_tab_caption(page: &RequestPage) -> String {
    format!(
        "📂 {} заявки (стр. {}/{}):",
        status_badge(page.status),
        page.page + 1,
        page.total_pages
    )
}

pub fn requests_tab_keyboard(page: &RequestPage) -> Keyboard {
    let mut kb = Keyboard::default();
    for e in &page.entries {
        let label = format!(
            "{} #{} • {} • {}",
            status_icon(page.status),
            e.id,
            truncate_title(&e.name, TRIM_LEN),
            format_price_rub(e.price)
        );
        kb = kb.push(Button::action(label, Action::OpenRequest(e.id)));
    }

    let mut nav = Vec::new();
    if page.page > 0 {
        nav.push(Button::action(
            "◀",
            Action::RequestsTab {
                status: page.status,
                page: page.page - 1,
            },
        ));
    }
    if page.page + 1 < page.total_pages {
        nav.push(Button::action(
            "▶",
            Action::RequestsTab {
                status: page.status,
                page: page.page + 1,
            },
        ));
    }
    if !nav.is_empty() {
        kb = kb.push_row(nav);
    }
    kb.push(back(Action::Requests))
}

pub fn cleanup_prompt_text(days: i64) -> String {
    format!("🧹 Удалить закрытые заявки старше {days} дн. вместе с уведомлениями?")
}

pub fn cleanup_prompt_keyboard(days: i64) -> Keyboard {
    Keyboard::column(vec![
        Button::action(format!("✅ Удалить (> {days} дн.)"), Action::CleanupDo(days)),
        back(Action::Requests),
    ])
}

pub fn cleanup_done_keyboard() -> Keyboard {
    Keyboard::column(vec![
        Button::action("⬅ Назад к заявкам", Action::Requests),
        Button::action("🏠 В панель", Action::OpenAdminPanel),
    ])
}

fn user_line(user: Option<&User>) -> String {
    match user {
        Some(u) => escape_html(&u.display_name()),
        None => "—".to_string(),
    }
}

fn target_line(card: &RequestCard) -> String {
    let req = &card.request;
    let (label, id) = match req.target {
        TargetRef::Lot(id) => ("📦 Лот", id),
        TargetRef::Product(id) => ("🧾 Товар", id),
    };
    match &card.target {
        Some(t) => format!(
            "{label}({id}){}: {}",
            availability_dot(t.active),
            escape_html(&t.name)
        ),
        None => format!("{label}({id})🔴: —"),
    }
}

/// Full request view for the admin panel.
pub fn request_card_text(card: &RequestCard) -> String {
    let req = &card.request;
    let mut out = format!(
        "📄 Заявка #{} | Статус: {}\n\n{}\nКлиент: {}\nИсполнитель: {}\n\n",
        req.id,
        status_badge(req.status),
        target_line(card),
        user_line(card.buyer.as_ref()),
        user_line(card.executor.as_ref()),
    );
    out.push_str(&format!(
        "Сумма: {} (предоплата {})\n",
        format_price_rub(card.price()),
        format_price_rub(req.prepayment_amount)
    ));
    if let Some(details) = &req.details {
        out.push_str(&format!("Способ: {}\n", escape_html(details)));
    }
    out.push_str(&format!(
        "🗓 Создана: {}\n🟠 Начата: {}\n🔴 Завершена: {}",
        fmt_dt(Some(req.created_at)),
        fmt_dt(req.taken_at),
        fmt_dt(req.closed_at)
    ));
    out
}

pub fn request_card_keyboard(card: &RequestCard, allow_reopen: bool) -> Keyboard {
    let req = &card.request;
    let mut kb = Keyboard::default();
    let mut status_row = Vec::new();
    if req.status.can_take(allow_reopen) {
        status_row.push(Button::action("🟠 В работу", Action::TakeRequest(req.id)));
    }
    if req.status.can_close() {
        status_row.push(Button::action("🔴 Закрыть", Action::CloseRequest(req.id)));
    }
    if !status_row.is_empty() {
        kb = kb.push_row(status_row);
    }
    if matches!(req.target, TargetRef::Lot(_)) {
        kb = kb.push(Button::action(
            "🔁 Наличие лота",
            Action::ToggleRequestLot(req.id),
        ));
    }
    kb = kb.push_row(vec![
        Button::action("✉ Написать клиенту", Action::MessageBuyer(req.id)),
        Button::action("🔔 Повторить", Action::ResendRequest(req.id)),
    ]);
    if let Some(un) = card.buyer.as_ref().and_then(|b| b.username.as_deref()) {
        kb = kb.push(Button::url("👤 Профиль клиента", format!("https://t.me/{un}")));
    }
    if let Some(link) = &card.link {
        kb = kb.push(Button::url("🔗 К объявлению", link.clone()));
    }
    kb.push(back(Action::RequestsTab {
        status: req.status,
        page: 0,
    }))
}

// ============== Admin notifications ==============

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    New,
    Repeat,
    /// In-place edit after a status change.
    Update,
}

pub fn notification_text(card: &RequestCard, kind: NoticeKind) -> String {
    let req = &card.request;
    let header = match kind {
        NoticeKind::New => "📢 <b>Новый заказ!</b>".to_string(),
        NoticeKind::Repeat => "🔔 <b>Повтор заявки</b>".to_string(),
        NoticeKind::Update => format!("🛎 <b>{}</b>", status_badge(req.status)),
    };
    let tg_id = card
        .buyer
        .as_ref()
        .map(|b| b.tg_id.to_string())
        .unwrap_or_default();
    let name = card
        .target
        .as_ref()
        .map(|t| escape_html(&t.name))
        .unwrap_or_else(|| "—".to_string());

    let mut out = format!(
        "{header}\n\n👤 Пользователь: {}\n🆔 Telegram ID: <code>{tg_id}</code>\n\n📦 Лот: <b>{name}</b>\n💰 Цена: {}\n💳 Предоплата: {}\n",
        user_line(card.buyer.as_ref()),
        format_price_rub(card.price()),
        format_price_rub(req.prepayment_amount),
    );
    if let Some(details) = &req.details {
        out.push_str(&format!("🚀 Способ: {}\n", escape_html(details)));
    }
    out.push_str(&format!(
        "🗓 Создана: {}\n📝 Заявка ID: <code>{}</code>",
        fmt_dt(Some(req.created_at)),
        req.id
    ));
    if kind == NoticeKind::Update {
        if let Some(executor) = &card.executor {
            out.push_str(&format!(
                "\n👨‍💼 Исполнитель: {}",
                escape_html(&executor.display_name())
            ));
        }
    }
    out
}

pub fn notification_keyboard(card: &RequestCard, allow_reopen: bool) -> Keyboard {
    let req = &card.request;
    let mut kb = Keyboard::default();
    if let Some(link) = &card.link {
        kb = kb.push(Button::url("🔗 К объявлению", link.clone()));
    }
    let mut row = Vec::new();
    if req.status.can_take(allow_reopen) {
        row.push(Button::action("🟠 В работу", Action::TakeRequest(req.id)));
    }
    if req.status.can_close() {
        row.push(Button::action("🔴 Закрыть", Action::CloseRequest(req.id)));
    }
    if !row.is_empty() {
        kb = kb.push_row(row);
    }
    kb.push_row(vec![
        Button::action("📄 Открыть", Action::OpenRequest(req.id)),
        Button::action("🙈 Скрыть", Action::HideRequest(req.id)),
    ])
}

// ============== Buyer messages ==============

pub fn buyer_created_text(card: &RequestCard) -> String {
    let req = &card.request;
    let name = card
        .target
        .as_ref()
        .map(|t| escape_html(&t.name))
        .unwrap_or_else(|| "—".to_string());
    let mut out = format!(
        "✅ Заявка №{} отправлена администратору. С вами скоро свяжутся!\n\n📦 {name}\n💰 Сумма: {}\n💳 Предоплата: {}",
        req.id,
        format_price_rub(req.total_amount),
        format_price_rub(req.prepayment_amount),
    );
    if let Some(details) = &req.details {
        out.push_str(&format!("\n🚀 Способ: {}", escape_html(details)));
    }
    out
}

pub fn buyer_taken_text(req: &Request, admin: &User) -> String {
    format!(
        "✅ Ваша заявка №{} взята в работу\n👨‍💼 Менеджер: {}\n🗓 {}",
        req.id,
        escape_html(&admin.display_name()),
        fmt_dt(req.taken_at)
    )
}

pub fn buyer_closed_text(req: &Request, admin: &User) -> String {
    let mut out = format!(
        "🧾 Заявка №{} закрыта\n👨‍💼 Закрыл: {}\n🗓 Период: {} — {}",
        req.id,
        escape_html(&admin.display_name()),
        fmt_dt(req.taken_at),
        fmt_dt(req.closed_at)
    );
    if let (Some(taken), Some(closed)) = (req.taken_at, req.closed_at) {
        out.push_str(&format!(
            "\n⏱ В работе: {}",
            format_elapsed((closed - taken).num_seconds())
        ));
    }
    out.push_str("\n🙏 Спасибо, что выбрали нас!");
    out
}

// ============== Raffles ==============

pub fn raffles_panel_text(active: Option<(&Raffle, usize)>) -> String {
    match active {
        None => "🎁 Активных розыгрышей нет.".to_string(),
        Some((r, participants)) => format!(
            "🎁 <b>{}</b>\n\n{}\n\n🗓 Начало: {}\n🏁 Окончание: {}\n👥 Участников: {participants}",
            escape_html(&r.title),
            escape_html(&r.description),
            fmt_dt(Some(r.start_at)),
            fmt_dt(r.end_at),
        ),
    }
}

pub fn raffles_panel_keyboard(active: Option<&Raffle>) -> Keyboard {
    let kb = match active {
        Some(r) => Keyboard::column(vec![Button::action(
            "🏁 Завершить розыгрыш",
            Action::FinishRaffle(r.id),
        )]),
        None => Keyboard::column(vec![Button::action(
            "➕ Новый розыгрыш",
            Action::CreateRaffle,
        )]),
    };
    kb.push(back(Action::BackToAdmin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Sellable, LOT_STATUS_ACTIVE};
    use chrono::Utc;

    fn card(status: RequestStatus) -> RequestCard {
        RequestCard {
            request: Request {
                id: 12,
                user_id: 1,
                target: TargetRef::Lot(3),
                prepayment_amount: 2000,
                total_amount: 10000,
                status,
                details: Some("Самовывоз".to_string()),
                taken_by_admin_id: None,
                taken_at: None,
                closed_at: None,
                created_at: Utc::now(),
                updated_at: None,
            },
            buyer: None,
            executor: None,
            target: Some(Sellable {
                target: TargetRef::Lot(3),
                name: "<Кресло>".to_string(),
                price: 10000,
                photo: None,
                active: true,
            }),
            link: Some("https://t.me/c/1234567890/5".to_string()),
        }
    }

    #[test]
    fn notification_offers_actions_by_status() {
        let pending = notification_keyboard(&card(RequestStatus::Pending), false);
        let actions = pending.actions();
        assert!(actions.contains(&&Action::TakeRequest(12)));
        assert!(actions.contains(&&Action::CloseRequest(12)));
        assert!(actions.contains(&&Action::HideRequest(12)));

        let done = notification_keyboard(&card(RequestStatus::Done), false);
        assert!(!done.actions().contains(&&Action::TakeRequest(12)));
        assert!(!done.actions().contains(&&Action::CloseRequest(12)));

        let reopen = notification_keyboard(&card(RequestStatus::Done), true);
        assert!(reopen.actions().contains(&&Action::TakeRequest(12)));
    }

    #[test]
    fn texts_escape_user_content() {
        let text = notification_text(&card(RequestStatus::Pending), NoticeKind::New);
        assert!(text.contains("&lt;Кресло&gt;"));
        assert!(text.contains("10.000 руб."));
        assert!(text.contains("2.000 руб."));
        assert!(text.contains("Самовывоз"));
    }

    #[test]
    fn catalog_links_are_escaped() {
        let lot = Lot {
            id: 3,
            name: "Стол".to_string(),
            description: String::new(),
            price: 500,
            photo: "file-3".to_string(),
            message_id: Some(9),
            is_active: true,
            status: LOT_STATUS_ACTIVE.to_string(),
            created_by: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        let text = catalog_text(&[(lot, Some("https://t.me/shop/9\"><b>x".to_string()))]);
        let expected = "<a href=\"https://t.me/shop/9&quot;&gt;&lt;b&gt;x\">Лот ID: 3</a>";
        assert!(text.contains(expected));
    }

    #[test]
    fn tab_keyboard_pages() {
        let page = RequestPage {
            status: RequestStatus::Pending,
            page: 1,
            total_pages: 3,
            entries: vec![],
        };
        let kb = requests_tab_keyboard(&page);
        let actions = kb.actions();
        assert!(actions.contains(&&Action::RequestsTab {
            status: RequestStatus::Pending,
            page: 0
        }));
        assert!(actions.contains(&&Action::RequestsTab {
            status: RequestStatus::Pending,
            page: 2
        }));
        assert_eq!(requests_tab_caption(&page), "📂 🟢 Новая заявки (стр. 2/3):");
    }
}
