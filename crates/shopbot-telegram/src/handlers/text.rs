use chrono::Utc;

use shopbot_core::{
    actions::Action,
    domain::MessageRef,
    messaging::types::PhotoRef,
    views, Result,
};

use super::Ctx;
use crate::dialog::{Dialog, Finished, Input, Session, Step};

/// Plain text in a private chat: either the next dialog answer or a nudge
/// towards the menu.
pub(super) async fn handle_text(ctx: &Ctx, incoming: MessageRef, text: &str) -> Result<()> {
    let Some(session) = ctx.state.dialogs.take(ctx.chat.0).await else {
        ctx.say(views::CLIENT_MENU_HINT, Some(views::client_menu(ctx.is_admin())))
            .await?;
        return Ok(());
    };
    advance(ctx, incoming, session, Input::Text(text)).await
}

/// Feed one input into the chat's dialog and render whatever comes next.
pub(super) async fn advance(
    ctx: &Ctx,
    incoming: MessageRef,
    session: Session,
    input: Input<'_>,
) -> Result<()> {
    let dialogs = &ctx.state.dialogs;
    let Session { dialog, prompt } = session;

    let step = dialog.feed(input, Utc::now());
    ctx.delete_quietly(Some(incoming)).await;

    match step {
        Step::Ignored(same) => {
            dialogs.set(ctx.chat.0, same, prompt).await;
        }
        Step::Ask(next, question) => {
            ctx.delete_quietly(prompt).await;
            let kb = views::back_only(next.back_action());
            let sent = ctx.say(question, Some(kb)).await?;
            dialogs.set(ctx.chat.0, next, Some(sent)).await;
        }
        Step::Invalid(same, reason) => {
            ctx.delete_quietly(prompt).await;
            let kb = views::back_only(same.back_action());
            let sent = ctx.say(&format!("⚠ {reason}"), Some(kb)).await?;
            dialogs.set(ctx.chat.0, same, Some(sent)).await;
        }
        Step::Done(done) => {
            ctx.delete_quietly(prompt).await;
            finish(ctx, done).await?;
        }
    }
    Ok(())
}

async fn finish(ctx: &Ctx, done: Finished) -> Result<()> {
    let shop = &ctx.state.shop;
    match done {
        Finished::LotPreview(draft) => {
            if let Err(e) = shop
                .catalog
                .check_caption(&draft.name, &draft.description, draft.price)
            {
                let retry = Dialog::LotDescription { name: draft.name };
                let html = format!("{}\n\n{}", e.user_message(), retry.first_prompt());
                let sent = ctx
                    .say(&html, Some(views::back_only(retry.back_action())))
                    .await?;
                ctx.state.dialogs.set(ctx.chat.0, retry, Some(sent)).await;
                return Ok(());
            }
            let caption = views::lot_preview_caption(&draft.name, &draft.description, draft.price);
            let preview = ctx
                .state
                .messenger
                .send_photo(
                    ctx.chat,
                    PhotoRef::FileId(draft.photo.clone()),
                    &caption,
                    Some(views::lot_preview_keyboard()),
                )
                .await?;
            ctx.state
                .dialogs
                .set(ctx.chat.0, Dialog::LotConfirm(draft), Some(preview))
                .await;
        }
        Finished::LotEdit { lot_id, edit } => {
            shop.catalog.edit_lot(lot_id, edit).await?;
            tracing::info!(lot_id, admin = ctx.user.tg_id, "lot edited");
            ctx.say(
                "✅ Лот успешно обновлён",
                Some(views::back_only(Action::AdminLots)),
            )
            .await?;
        }
        Finished::BuyerMessage { request_id, text } => {
            shop.requests.message_buyer(request_id, &text).await?;
            tracing::info!(request_id, admin = ctx.user.tg_id, "message relayed to buyer");
            ctx.say(
                "✅ Сообщение отправлено покупателю",
                Some(views::back_only(Action::OpenRequest(request_id))),
            )
            .await?;
        }
        Finished::Raffle {
            title,
            description,
            end_at,
        } => {
            let raffle = shop
                .raffles
                .create(&ctx.user, &title, &description, end_at)
                .await?;
            tracing::info!(raffle_id = raffle.id, admin = ctx.user.tg_id, "raffle created");
            let text = views::raffles_panel_text(Some((&raffle, 0)));
            ctx.say(&text, Some(views::raffles_panel_keyboard(Some(&raffle))))
                .await?;
        }
    }
    Ok(())
}
