use shopbot_core::{domain::MessageRef, views, Result};

use super::{client, lots, Ctx};

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub(super) async fn handle_command(ctx: &Ctx, incoming: MessageRef, text: &str) -> Result<()> {
    let (cmd, _args) = parse_command(text);
    tracing::debug!(chat = ctx.chat.0, cmd = %cmd, "command");

    match cmd.as_str() {
        "start" | "help" => {
            // A fresh start drops whatever dialog was half done.
            if let Some(session) = ctx.state.dialogs.take(ctx.chat.0).await {
                ctx.delete_quietly(session.prompt).await;
            }
            ctx.delete_quietly(Some(incoming)).await;
            client::show_start(ctx).await
        }
        "cancel" => {
            let session = ctx.state.dialogs.take(ctx.chat.0).await;
            let Some(session) = session else {
                ctx.say("Нечего отменять.", None).await?;
                return Ok(());
            };
            ctx.delete_quietly(session.prompt).await;
            let back = session.dialog.back_action();
            ctx.say("❌ Отменено", Some(views::back_only(back))).await?;
            Ok(())
        }
        "admin" => {
            if !ctx.is_admin() {
                ctx.say("⛔ Доступ запрещён", None).await?;
                return Ok(());
            }
            ctx.delete_quietly(Some(incoming)).await;
            lots::admin_panel(ctx).await?;
            Ok(())
        }
        _ => {
            ctx.say("Неизвестная команда. Используйте /start", None)
                .await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bot_mention_and_lowercases() {
        assert_eq!(
            parse_command("/Start@shop_bot"),
            ("start".to_string(), String::new())
        );
    }

    #[test]
    fn keeps_arguments() {
        assert_eq!(
            parse_command("/cancel  now please "),
            ("cancel".to_string(), "now please".to_string())
        );
    }
}
