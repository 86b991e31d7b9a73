//! Per-chat multi-step input dialogs (lot creation, lot edit, buyer message,
//! raffle creation).
//!
//! `Dialog::feed` is a pure transition; handlers own the side effects.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::sync::Mutex;

use shopbot_core::{
    actions::Action,
    catalog::{LotDraft, LotEdit},
    domain::MessageRef,
    formatting::parse_price,
};

pub const END_DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Marker for "keep the current value" / "no end date".
const SKIP: &str = "-";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dialog {
    LotName,
    LotDescription { name: String },
    LotPrice { name: String, description: String },
    LotPhoto { name: String, description: String, price: i64 },
    /// Preview shown; waiting for the publish button.
    LotConfirm(LotDraft),

    EditLotName { lot_id: i64 },
    EditLotPrice { lot_id: i64, name: Option<String> },

    MessageBuyer { request_id: i64 },

    RaffleTitle,
    RaffleDescription { title: String },
    RaffleEnd { title: String, description: String },
}

#[derive(Clone, Copy, Debug)]
pub enum Input<'a> {
    Text(&'a str),
    /// Telegram file id of the largest photo size.
    Photo(&'a str),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finished {
    LotPreview(LotDraft),
    LotEdit { lot_id: i64, edit: LotEdit },
    BuyerMessage { request_id: i64, text: String },
    Raffle {
        title: String,
        description: String,
        end_at: Option<DateTime<Utc>>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Move on and show `prompt`.
    Ask(Dialog, &'static str),
    /// Input rejected; stay and show the reason.
    Invalid(Dialog, String),
    /// Input of the wrong kind; stay silently.
    Ignored(Dialog),
    Done(Finished),
}

impl Dialog {
    pub fn first_prompt(&self) -> &'static str {
        match self {
            Dialog::LotName => "🏷️ <b>Введите название лота:</b>",
            Dialog::LotDescription { .. } => "📝 <b>Введите описание лота:</b>",
            Dialog::LotPrice { .. } => "💰 <b>Введите цену (число):</b>",
            Dialog::LotPhoto { .. } => "📷 <b>Отправьте ОДНО фото лота</b>",
            Dialog::LotConfirm(_) => "Нажмите «Опубликовать» или «Назад».",
            Dialog::EditLotName { .. } => "✍ Введите новое название для лота (или «-», чтобы оставить)",
            Dialog::EditLotPrice { .. } => "💰 Введите новую цену (или «-», чтобы оставить)",
            Dialog::MessageBuyer { .. } => "✉ Введите сообщение для клиента:",
            Dialog::RaffleTitle => "🎁 Введите название розыгрыша:",
            Dialog::RaffleDescription { .. } => "📝 Введите описание розыгрыша (или «-»):",
            Dialog::RaffleEnd { .. } => {
                "🏁 Введите дату окончания в формате ДД.ММ.ГГГГ ЧЧ:ММ (UTC) или «-» без срока:"
            }
        }
    }

    /// Where the prompt's back button leads; pressing it drops the dialog.
    pub fn back_action(&self) -> Action {
        match self {
            Dialog::LotName
            | Dialog::LotDescription { .. }
            | Dialog::LotPrice { .. }
            | Dialog::LotPhoto { .. }
            | Dialog::LotConfirm(_) => Action::Lots,
            Dialog::EditLotName { .. } | Dialog::EditLotPrice { .. } => Action::AdminLots,
            Dialog::MessageBuyer { request_id } => Action::OpenRequest(*request_id),
            Dialog::RaffleTitle | Dialog::RaffleDescription { .. } | Dialog::RaffleEnd { .. } => {
                Action::AdminRaffles
            }
        }
    }

    /// Does this dialog expect a photo rather than text?
    pub fn wants_photo(&self) -> bool {
        matches!(self, Dialog::LotPhoto { .. })
    }

    pub fn feed(self, input: Input<'_>, now: DateTime<Utc>) -> Step {
        use Dialog::*;

        let text = match input {
            Input::Text(t) => Some(t.trim()),
            Input::Photo(_) => None,
        };

        match (self, input) {
            (LotPhoto { name, description, price }, Input::Photo(file_id)) => {
                Step::Done(Finished::LotPreview(LotDraft {
                    name,
                    description,
                    price,
                    photo: file_id.to_string(),
                }))
            }
            (d @ LotPhoto { .. }, Input::Text(_)) => Step::Ignored(d),
            (d, Input::Photo(_)) => Step::Ignored(d),
            (d @ LotConfirm(_), Input::Text(_)) => Step::Ignored(d),

            (d, Input::Text(_)) if text.map_or(true, str::is_empty) => {
                Step::Invalid(d, "❌ Пустой ввод, попробуйте ещё раз".to_string())
            }

            (LotName, Input::Text(_)) => {
                let next = LotDescription {
                    name: text.unwrap_or_default().to_string(),
                };
                let prompt = next.first_prompt();
                Step::Ask(next, prompt)
            }
            (LotDescription { name }, Input::Text(_)) => {
                let next = LotPrice {
                    name,
                    description: text.unwrap_or_default().to_string(),
                };
                let prompt = next.first_prompt();
                Step::Ask(next, prompt)
            }
            (LotPrice { name, description }, Input::Text(t)) => match parse_price(t) {
                Ok(price) => {
                    let next = LotPhoto {
                        name,
                        description,
                        price,
                    };
                    let prompt = next.first_prompt();
                    Step::Ask(next, prompt)
                }
                Err(_) => Step::Invalid(
                    LotPrice { name, description },
                    "❌ Некорректная цена. Введите число:".to_string(),
                ),
            },

            (EditLotName { lot_id }, Input::Text(_)) => {
                let t = text.unwrap_or_default();
                let next = EditLotPrice {
                    lot_id,
                    name: (t != SKIP).then(|| t.to_string()),
                };
                let prompt = next.first_prompt();
                Step::Ask(next, prompt)
            }
            (EditLotPrice { lot_id, name }, Input::Text(t)) => {
                let price = if t.trim() == SKIP {
                    None
                } else {
                    match parse_price(t) {
                        Ok(p) => Some(p),
                        Err(_) => {
                            return Step::Invalid(
                                EditLotPrice { lot_id, name },
                                "❌ Цена должна быть числом".to_string(),
                            )
                        }
                    }
                };
                Step::Done(Finished::LotEdit {
                    lot_id,
                    edit: LotEdit {
                        name,
                        description: None,
                        price,
                    },
                })
            }

            (MessageBuyer { request_id }, Input::Text(_)) => Step::Done(Finished::BuyerMessage {
                request_id,
                text: text.unwrap_or_default().to_string(),
            }),

            (RaffleTitle, Input::Text(_)) => {
                let next = RaffleDescription {
                    title: text.unwrap_or_default().to_string(),
                };
                let prompt = next.first_prompt();
                Step::Ask(next, prompt)
            }
            (RaffleDescription { title }, Input::Text(_)) => {
                let t = text.unwrap_or_default();
                let next = RaffleEnd {
                    title,
                    description: if t == SKIP { String::new() } else { t.to_string() },
                };
                let prompt = next.first_prompt();
                Step::Ask(next, prompt)
            }
            (RaffleEnd { title, description }, Input::Text(_)) => {
                match parse_end(text.unwrap_or_default(), now) {
                    Ok(end_at) => Step::Done(Finished::Raffle {
                        title,
                        description,
                        end_at,
                    }),
                    Err(why) => Step::Invalid(RaffleEnd { title, description }, why),
                }
            }
        }
    }
}

fn parse_end(s: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, String> {
    if s == SKIP {
        return Ok(None);
    }
    let at = NaiveDateTime::parse_from_str(s, END_DATE_FORMAT)
        .map_err(|_| "❌ Формат даты: ДД.ММ.ГГГГ ЧЧ:ММ".to_string())?
        .and_utc();
    if at <= now {
        return Err("❌ Дата окончания должна быть в будущем".to_string());
    }
    Ok(Some(at))
}

/// Dialog in progress plus the bot prompt to clean up on the next step.
#[derive(Clone, Debug)]
pub struct Session {
    pub dialog: Dialog,
    pub prompt: Option<MessageRef>,
}

/// Active dialogs keyed by chat id.
#[derive(Default)]
pub struct Dialogs {
    inner: Mutex<HashMap<i64, Session>>,
}

impl Dialogs {
    pub async fn get(&self, chat_id: i64) -> Option<Session> {
        self.inner.lock().await.get(&chat_id).cloned()
    }

    pub async fn set(&self, chat_id: i64, dialog: Dialog, prompt: Option<MessageRef>) {
        self.inner
            .lock()
            .await
            .insert(chat_id, Session { dialog, prompt });
    }

    pub async fn take(&self, chat_id: i64) -> Option<Session> {
        self.inner.lock().await.remove(&chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn text(d: Dialog, t: &str) -> Step {
        d.feed(Input::Text(t), now())
    }

    fn expect_ask(step: Step) -> Dialog {
        match step {
            Step::Ask(d, _) => d,
            other => panic!("expected Ask, got {other:?}"),
        }
    }

    #[test]
    fn lot_creation_walks_to_preview() {
        let d = expect_ask(text(Dialog::LotName, "  Кресло "));
        let d = expect_ask(text(d, "Почти новое"));
        let d = match text(d, "дорого") {
            Step::Invalid(d, _) => d,
            other => panic!("expected Invalid, got {other:?}"),
        };
        let d = expect_ask(text(d, "10 000 ₽"));
        assert!(d.wants_photo());

        assert!(matches!(text(d.clone(), "нет фото"), Step::Ignored(_)));
        let step = d.feed(Input::Photo("file-1"), now());
        assert_eq!(
            step,
            Step::Done(Finished::LotPreview(LotDraft {
                name: "Кресло".to_string(),
                description: "Почти новое".to_string(),
                price: 10000,
                photo: "file-1".to_string(),
            }))
        );
    }

    #[test]
    fn empty_text_is_rejected_and_photos_ignored_outside_photo_step() {
        assert!(matches!(text(Dialog::LotName, "   "), Step::Invalid(Dialog::LotName, _)));
        assert!(matches!(
            Dialog::RaffleTitle.feed(Input::Photo("f"), now()),
            Step::Ignored(Dialog::RaffleTitle)
        ));
    }

    #[test]
    fn lot_edit_supports_skipping_fields() {
        let d = expect_ask(text(Dialog::EditLotName { lot_id: 3 }, "-"));
        assert_eq!(
            text(d, "500"),
            Step::Done(Finished::LotEdit {
                lot_id: 3,
                edit: LotEdit {
                    name: None,
                    description: None,
                    price: Some(500),
                },
            })
        );

        let d = expect_ask(text(Dialog::EditLotName { lot_id: 3 }, "Стол"));
        assert_eq!(
            text(d, "-"),
            Step::Done(Finished::LotEdit {
                lot_id: 3,
                edit: LotEdit {
                    name: Some("Стол".to_string()),
                    description: None,
                    price: None,
                },
            })
        );
    }

    #[test]
    fn raffle_end_date_is_parsed_and_must_be_future() {
        let d = expect_ask(text(Dialog::RaffleTitle, "Приз"));
        let d = expect_ask(text(d, "-"));

        assert!(matches!(text(d.clone(), "завтра"), Step::Invalid(..)));
        assert!(matches!(text(d.clone(), "01.01.2020 10:00"), Step::Invalid(..)));

        let expected = now() + Duration::days(1);
        assert_eq!(
            text(d, "02.03.2026 12:00"),
            Step::Done(Finished::Raffle {
                title: "Приз".to_string(),
                description: String::new(),
                end_at: Some(expected),
            })
        );
    }

    #[test]
    fn back_buttons_return_to_the_owning_section() {
        assert_eq!(Dialog::LotName.back_action(), Action::Lots);
        assert_eq!(
            Dialog::MessageBuyer { request_id: 9 }.back_action(),
            Action::OpenRequest(9)
        );
        assert_eq!(Dialog::RaffleTitle.back_action(), Action::AdminRaffles);
    }

    #[tokio::test]
    async fn sessions_are_per_chat() {
        let dialogs = Dialogs::default();
        dialogs.set(1, Dialog::LotName, None).await;
        assert!(dialogs.get(2).await.is_none());
        assert_eq!(dialogs.get(1).await.unwrap().dialog, Dialog::LotName);
        assert!(dialogs.take(1).await.is_some());
        assert!(dialogs.get(1).await.is_none());
    }
}
