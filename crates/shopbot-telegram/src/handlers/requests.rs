use shopbot_core::{
    domain::{Request, RequestStatus},
    formatting::status_badge,
    lifecycle::RequestLifecycle,
    views, Result,
};

use super::{lots, Answer, Ctx};
use crate::dialog::Dialog;

pub(super) async fn root(ctx: &Ctx) -> Result<Answer> {
    let shop = &ctx.state.shop;
    let counts = shop.requests.counts_by_status().await?;
    let msg = ctx
        .show_photo_panel(
            &ctx.state.cfg.requests_panel_photo,
            &views::requests_root_caption(&counts),
            views::requests_root_keyboard(&counts),
        )
        .await?;
    shop.panels.remember_requests(&ctx.user, msg).await?;
    Ok(Answer::Silent)
}

pub(super) async fn tab(ctx: &Ctx, status: RequestStatus, page: u32) -> Result<Answer> {
    let page = ctx.state.shop.requests.list_by_status(status, page).await?;
    ctx.show_caption(
        &views::requests_tab_caption(&page),
        views::requests_tab_keyboard(&page),
    )
    .await?;
    Ok(Answer::Silent)
}

pub(super) async fn open(ctx: &Ctx, id: i64) -> Result<Answer> {
    render_card(ctx, id).await?;
    Ok(Answer::Silent)
}

async fn render_card(ctx: &Ctx, id: i64) -> Result<()> {
    let card = ctx.state.shop.requests.describe(id).await?;
    ctx.show_caption(
        &views::request_card_text(&card),
        views::request_card_keyboard(&card, ctx.state.cfg.allow_reopen),
    )
    .await?;
    Ok(())
}

/// After a transition the lifecycle already rewrote the admin's own
/// notification; a card opened from the panel still needs a re-render.
async fn refresh_clicked(ctx: &Ctx, req: &Request) -> Result<()> {
    let own = ctx
        .state
        .shop
        .requests
        .notification_message(req.id, &ctx.user)
        .await?;
    if own.is_some() && own == ctx.msg {
        return Ok(());
    }
    render_card(ctx, req.id).await
}

pub(super) async fn take(ctx: &Ctx, id: i64) -> Result<Answer> {
    let req = ctx.state.shop.requests.take(id, &ctx.user).await?;
    if let Err(e) = refresh_clicked(ctx, &req).await {
        tracing::debug!(request_id = id, error = %e, "card refresh failed");
    }
    Ok(Answer::toast(format!(
        "Заявка №{id}: {}",
        status_badge(req.status)
    )))
}

pub(super) async fn close(ctx: &Ctx, id: i64) -> Result<Answer> {
    let req = ctx.state.shop.requests.close(id, &ctx.user).await?;
    if let Err(e) = refresh_clicked(ctx, &req).await {
        tracing::debug!(request_id = id, error = %e, "card refresh failed");
    }
    Ok(Answer::toast(format!(
        "Заявка №{id}: {}",
        status_badge(req.status)
    )))
}

/// Hide this admin's notification and drop the message the button was on.
pub(super) async fn hide(ctx: &Ctx, id: i64) -> Result<Answer> {
    ctx.state
        .shop
        .requests
        .hide_notification(id, &ctx.user)
        .await?;
    ctx.delete_quietly(ctx.msg).await;
    Ok(Answer::toast("🙈 Скрыто"))
}

pub(super) async fn resend(ctx: &Ctx, id: i64) -> Result<Answer> {
    ctx.state
        .shop
        .requests
        .resend_notification(id, &ctx.user)
        .await?;
    Ok(Answer::toast("🔔 Уведомление отправлено повторно"))
}

pub(super) async fn toggle_lot(ctx: &Ctx, id: i64) -> Result<Answer> {
    let lot = ctx
        .state
        .shop
        .requests
        .toggle_target_lot(id, &ctx.user)
        .await?;
    render_card(ctx, id).await?;
    Ok(Answer::toast(format!(
        "Лот №{}: {}",
        lot.id,
        lots::lot_status_label(&lot.status)
    )))
}

pub(super) async fn message_buyer(ctx: &Ctx, id: i64) -> Result<Answer> {
    ctx.state.shop.requests.request(id).await?;
    lots::start_dialog(ctx, Dialog::MessageBuyer { request_id: id }).await?;
    Ok(Answer::Silent)
}

pub(super) async fn cleanup_prompt(ctx: &Ctx) -> Result<Answer> {
    let days = ctx.state.cfg.purge_days;
    ctx.show_caption(
        &views::cleanup_prompt_text(days),
        views::cleanup_prompt_keyboard(days),
    )
    .await?;
    Ok(Answer::Silent)
}

pub(super) async fn cleanup_do(ctx: &Ctx, days: i64) -> Result<Answer> {
    let window = RequestLifecycle::purge_window(days)?;
    let report = ctx
        .state
        .shop
        .requests
        .purge_stale(
            window,
            RequestStatus::Done,
            Some(ctx.user.tg_id),
        )
        .await?;
    let text = format!(
        "🧹 Готово. Удалено заявок: {}, уведомлений: {}.",
        report.requests, report.notifications
    );
    ctx.show_caption(&text, views::cleanup_done_keyboard())
        .await?;
    Ok(Answer::Silent)
}
