use shopbot_core::{domain::MessageRef, Result};

use super::{text, Ctx};
use crate::dialog::Input;

/// Photos only matter inside a dialog step that asks for one.
pub(super) async fn handle_photo(ctx: &Ctx, incoming: MessageRef, file_id: &str) -> Result<()> {
    if file_id.is_empty() {
        return Ok(());
    }
    let Some(session) = ctx.state.dialogs.take(ctx.chat.0).await else {
        tracing::debug!(chat = ctx.chat.0, "photo outside dialog ignored");
        return Ok(());
    };
    text::advance(ctx, incoming, session, Input::Photo(file_id)).await
}
