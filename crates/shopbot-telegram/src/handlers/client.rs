use shopbot_core::{actions::Action, domain::TargetRef, views, Result};

use super::{Answer, Ctx};

pub const METHOD_PICKUP: &str = "Самовывоз";
pub const METHOD_DELIVERY: &str = "Доставка";

/// Start photo with the client menu; admins get the admin entry as well.
pub(super) async fn back_to_main(ctx: &Ctx) -> Result<Answer> {
    show_start(ctx).await?;
    Ok(Answer::Silent)
}

pub(super) async fn show_start(ctx: &Ctx) -> Result<()> {
    let cfg = &ctx.state.cfg;
    let admin = ctx.is_admin();
    let caption = if admin {
        &cfg.start_message_admin
    } else {
        &cfg.start_message_client
    };
    ctx.show_photo_panel(&cfg.start_photo, caption, views::client_menu(admin))
        .await?;
    Ok(())
}

pub(super) async fn catalog(ctx: &Ctx) -> Result<Answer> {
    let lots = ctx.state.shop.catalog.lots_with_links().await?;
    ctx.show_text(
        &views::catalog_text(&lots),
        views::back_only(Action::BackToMain),
    )
    .await?;
    Ok(Answer::Silent)
}

/// Buy button under a lot post in the group.
pub(super) async fn buy(ctx: &Ctx, lot_id: i64, delivery: bool) -> Result<Answer> {
    let (allowed, retry_after) = ctx
        .state
        .rate_limiter
        .lock()
        .await
        .check(ctx.user.tg_id);
    if !allowed {
        let wait = retry_after.map(|d| d.as_secs().max(1)).unwrap_or(1);
        return Ok(Answer::alert(format!(
            "⏳ Слишком много запросов. Попробуйте через {wait} с."
        )));
    }

    let method = if delivery {
        METHOD_DELIVERY
    } else {
        METHOD_PICKUP
    };
    let req = ctx
        .state
        .shop
        .requests
        .create_request(&ctx.user, TargetRef::Lot(lot_id), method)
        .await?;
    tracing::info!(request_id = req.id, buyer = ctx.user.tg_id, delivery, "buy click");

    Ok(Answer::alert(if delivery {
        format!("✅ Заявка №{} с доставкой отправлена админу!", req.id)
    } else {
        format!(
            "✅ Заявка №{} отправлена админу. С вами скоро свяжутся!",
            req.id
        )
    }))
}

pub(super) async fn join_raffle(ctx: &Ctx) -> Result<Answer> {
    let raffle = ctx.state.shop.raffles.join(ctx.user.tg_id).await?;
    Ok(Answer::alert(format!(
        "✅ Вы участвуете в розыгрыше «{}»!",
        raffle.title
    )))
}
