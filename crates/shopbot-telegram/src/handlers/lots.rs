use shopbot_core::{domain::LOT_STATUS_ACTIVE, views, Result};

use super::{Answer, Ctx};
use crate::dialog::Dialog;

/// Admin panel photo with the pending badge; remembered for later refreshes.
pub(super) async fn admin_panel(ctx: &Ctx) -> Result<Answer> {
    let shop = &ctx.state.shop;
    let counts = shop.requests.counts_by_status().await?;
    let msg = ctx
        .show_photo_panel(
            &ctx.state.cfg.admin_panel_photo,
            views::ADMIN_PANEL_CAPTION,
            views::admin_panel(counts.pending),
        )
        .await?;
    shop.panels.remember_menu(&ctx.user, msg).await?;
    Ok(Answer::Silent)
}

pub(super) async fn menu(ctx: &Ctx) -> Result<Answer> {
    ctx.show_photo_panel(
        &ctx.state.cfg.lots_panel_photo,
        views::LOTS_PANEL_CAPTION,
        views::lots_menu(),
    )
    .await?;
    Ok(Answer::Silent)
}

/// Start a dialog by replacing the current message with its first prompt.
pub(super) async fn start_dialog(ctx: &Ctx, dialog: Dialog) -> Result<()> {
    ctx.delete_quietly(ctx.msg).await;
    let prompt = ctx
        .say(
            dialog.first_prompt(),
            Some(views::back_only(dialog.back_action())),
        )
        .await?;
    ctx.state.dialogs.set(ctx.chat.0, dialog, Some(prompt)).await;
    Ok(())
}

pub(super) async fn create(ctx: &Ctx) -> Result<Answer> {
    start_dialog(ctx, Dialog::LotName).await?;
    Ok(Answer::Silent)
}

pub(super) async fn publish(ctx: &Ctx) -> Result<Answer> {
    let dialogs = &ctx.state.dialogs;
    let Some(session) = dialogs.take(ctx.chat.0).await else {
        return Ok(Answer::alert("⚠ Ошибка: данные не найдены"));
    };
    let Dialog::LotConfirm(draft) = session.dialog else {
        dialogs.set(ctx.chat.0, session.dialog, session.prompt).await;
        return Ok(Answer::alert("⚠ Сначала заполните все поля лота"));
    };

    match ctx
        .state
        .shop
        .catalog
        .publish_lot(&ctx.user, draft.clone())
        .await
    {
        Ok(lot) => {
            tracing::info!(lot_id = lot.id, admin = ctx.user.tg_id, "lot published");
            menu(ctx).await?;
            Ok(Answer::alert(format!("✅ Лот №{} опубликован", lot.id)))
        }
        Err(e) => {
            // Keep the preview so the admin can retry.
            dialogs
                .set(ctx.chat.0, Dialog::LotConfirm(draft), session.prompt)
                .await;
            Err(e)
        }
    }
}

pub(super) async fn list(ctx: &Ctx) -> Result<Answer> {
    render_list(ctx).await?;
    Ok(Answer::Silent)
}

async fn render_list(ctx: &Ctx) -> Result<()> {
    let lots = ctx.state.shop.catalog.lots_with_links().await?;
    let caption = if lots.is_empty() {
        "📋 Лотов пока нет."
    } else {
        "📋 Список лотов:"
    };
    ctx.show_caption(caption, views::admin_lots_keyboard(&lots))
        .await?;
    Ok(())
}

pub(super) async fn toggle(ctx: &Ctx, id: i64) -> Result<Answer> {
    let lot = ctx
        .state
        .shop
        .catalog
        .toggle_lot(id, Some(ctx.user.tg_id))
        .await?;
    render_list(ctx).await?;
    Ok(Answer::toast(lot_status_label(&lot.status)))
}

pub(super) fn lot_status_label(status: &str) -> &'static str {
    if status == LOT_STATUS_ACTIVE {
        "🟢 В наличии"
    } else {
        "🔴 Продан"
    }
}

pub(super) async fn edit(ctx: &Ctx, id: i64) -> Result<Answer> {
    // Fail early on a stale button.
    ctx.state.shop.catalog.lot(id).await?;
    start_dialog(ctx, Dialog::EditLotName { lot_id: id }).await?;
    Ok(Answer::Silent)
}

pub(super) async fn delete(ctx: &Ctx, id: i64) -> Result<Answer> {
    ctx.state
        .shop
        .catalog
        .delete_lot(id, Some(ctx.user.tg_id))
        .await?;
    render_list(ctx).await?;
    Ok(Answer::toast(format!("🗑 Лот №{id} удалён")))
}
