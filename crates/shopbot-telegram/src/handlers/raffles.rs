use shopbot_core::{views, Result};

use super::{lots, Answer, Ctx};
use crate::dialog::Dialog;

pub(super) async fn panel(ctx: &Ctx) -> Result<Answer> {
    render_panel(ctx).await?;
    Ok(Answer::Silent)
}

async fn render_panel(ctx: &Ctx) -> Result<()> {
    let active = ctx.state.shop.raffles.active().await?;
    let text = views::raffles_panel_text(active.as_ref().map(|(r, n)| (r, *n)));
    let kb = views::raffles_panel_keyboard(active.as_ref().map(|(r, _)| r));
    ctx.show_caption(&text, kb).await?;
    Ok(())
}

pub(super) async fn create(ctx: &Ctx) -> Result<Answer> {
    if let Some((raffle, _)) = ctx.state.shop.raffles.active().await? {
        return Ok(Answer::alert(format!(
            "⚠ Уже идёт розыгрыш «{}»",
            raffle.title
        )));
    }
    lots::start_dialog(ctx, Dialog::RaffleTitle).await?;
    Ok(Answer::Silent)
}

pub(super) async fn finish(ctx: &Ctx, id: i64) -> Result<Answer> {
    let report = ctx.state.shop.raffles.finish(id).await?;
    tracing::info!(
        raffle_id = id,
        participants = report.participants,
        notified = report.notified,
        "raffle finished"
    );
    render_panel(ctx).await?;
    Ok(Answer::alert(format!(
        "🏁 Розыгрыш завершён. Участников: {}, уведомлено: {}",
        report.participants, report.notified
    )))
}
