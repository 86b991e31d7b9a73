use std::sync::Arc;

use teloxide::prelude::*;

use shopbot_core::{
    actions::Action,
    domain::{ChatId, MessageRef},
    security::is_admin,
    Result,
};

use super::{client, identity, log_failure, lots, raffles, requests, Answer, Ctx};
use crate::router::AppState;

pub async fn handle_callback(
    _bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let answer = route(&q, state.clone()).await;

    let res = match &answer {
        Answer::Silent => state.messenger.answer_callback(&cb_id, None, false).await,
        Answer::Toast(t) => state.messenger.answer_callback(&cb_id, Some(t.as_str()), false).await,
        Answer::Alert(t) => state.messenger.answer_callback(&cb_id, Some(t.as_str()), true).await,
    };
    if let Err(e) = res {
        tracing::debug!(error = %e, "answer_callback failed");
    }
    Ok(())
}

async fn route(q: &CallbackQuery, state: Arc<AppState>) -> Answer {
    let Some(message) = q.message.as_ref() else {
        return Answer::Silent;
    };
    let data = q.data.as_deref().unwrap_or_default();
    let Some(action) = Action::parse(data) else {
        tracing::debug!(data, "unknown callback data");
        return Answer::alert("⚠ Кнопка устарела");
    };

    let tg_id = q.from.id.0 as i64;
    if action.requires_admin() && !is_admin(Some(tg_id), &state.cfg.admins) {
        return Answer::alert("⛔ Доступ запрещён");
    }

    let chat_id = message.chat.id.0;
    let key = lock_key(chat_id, message.chat.is_private(), tg_id);
    let _guard = state.chat_locks.lock_chat(key).await;

    let user = match state.shop.users.resolve(&identity(&q.from)).await {
        Ok(u) => u,
        Err(e) => {
            log_failure("resolve user", &e);
            return Answer::alert(e.user_message());
        }
    };
    let ctx = Ctx {
        state: state.clone(),
        chat: ChatId(chat_id),
        msg: Some(MessageRef::new(chat_id, message.id.0)),
        user,
    };

    abandon_dialog(&ctx, &action).await;

    match dispatch(&ctx, action.clone()).await {
        Ok(answer) => answer,
        Err(e) => {
            log_failure(&action.encode(), &e);
            Answer::alert(e.user_message())
        }
    }
}

/// Private chats are serialized as a whole. In a group every user gets a
/// lane of their own so buy clicks under one post do not queue up.
fn lock_key(chat_id: i64, private: bool, user_tg_id: i64) -> i64 {
    if private {
        chat_id
    } else {
        user_tg_id
    }
}

/// Any button other than the dialog's own continuation ends a pending text
/// dialog in this chat.
async fn abandon_dialog(ctx: &Ctx, action: &Action) {
    if matches!(
        action,
        Action::PublishLot | Action::Noop | Action::NoopLot(_)
    ) {
        return;
    }
    if let Some(session) = ctx.state.dialogs.take(ctx.chat.0).await {
        tracing::debug!(chat = ctx.chat.0, dialog = ?session.dialog, "dialog abandoned");
        if session.prompt != ctx.msg {
            ctx.delete_quietly(session.prompt).await;
        }
    }
}

async fn dispatch(ctx: &Ctx, action: Action) -> Result<Answer> {
    match action {
        // Client
        Action::Catalog => client::catalog(ctx).await,
        Action::BuyLot(id) => client::buy(ctx, id, false).await,
        Action::BuyLotDelivery(id) => client::buy(ctx, id, true).await,
        Action::JoinRaffle => client::join_raffle(ctx).await,
        Action::BackToMain => client::back_to_main(ctx).await,

        // Admin navigation
        Action::OpenAdminPanel | Action::BackToAdmin => lots::admin_panel(ctx).await,

        // Requests
        Action::Requests => requests::root(ctx).await,
        Action::RequestsTab { status, page } => requests::tab(ctx, status, page).await,
        Action::OpenRequest(id) => requests::open(ctx, id).await,
        Action::TakeRequest(id) => requests::take(ctx, id).await,
        Action::CloseRequest(id) => requests::close(ctx, id).await,
        Action::HideRequest(id) => requests::hide(ctx, id).await,
        Action::ResendRequest(id) => requests::resend(ctx, id).await,
        Action::ToggleRequestLot(id) => requests::toggle_lot(ctx, id).await,
        Action::MessageBuyer(id) => requests::message_buyer(ctx, id).await,
        Action::CleanupPrompt => requests::cleanup_prompt(ctx).await,
        Action::CleanupDo(days) => requests::cleanup_do(ctx, days).await,

        // Lots
        Action::Lots => lots::menu(ctx).await,
        Action::CreateLot => lots::create(ctx).await,
        Action::PublishLot => lots::publish(ctx).await,
        Action::AdminLots => lots::list(ctx).await,
        Action::ToggleLot(id) => lots::toggle(ctx, id).await,
        Action::EditLot(id) => lots::edit(ctx, id).await,
        Action::DeleteLot(id) => lots::delete(ctx, id).await,

        // Raffles
        Action::AdminRaffles => raffles::panel(ctx).await,
        Action::CreateRaffle => raffles::create(ctx).await,
        Action::FinishRaffle(id) => raffles::finish(ctx, id).await,

        Action::NoopLot(_) | Action::Noop => Ok(Answer::Silent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::ChatLocks;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn buyers_in_one_group_do_not_wait_for_each_other() {
        let locks = ChatLocks::default();
        let group = -1001234567890;

        let first = locks.lock_chat(lock_key(group, false, 1)).await;
        let wait = Duration::from_millis(50);
        let second = timeout(wait, locks.lock_chat(lock_key(group, false, 2))).await;
        assert!(second.is_ok());

        // The same buyer clicking again still waits for the first click.
        let again = timeout(wait, locks.lock_chat(lock_key(group, false, 1))).await;
        assert!(again.is_err());
        drop(first);
    }

    #[test]
    fn private_chats_lock_on_the_chat() {
        assert_eq!(lock_key(42, true, 42), 42);
        assert_eq!(lock_key(-100500, false, 7), 7);
    }
}
