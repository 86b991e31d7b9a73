use std::path::PathBuf;

use crate::actions::Action;

/// Inline keyboard: rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub kind: ButtonKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonKind {
    /// Semantic action, encoded into callback data by the adapter.
    Action(Action),
    Url(String),
}

impl Button {
    pub fn action(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Action(action),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: ButtonKind::Url(url.into()),
        }
    }
}

impl Keyboard {
    pub fn new(rows: Vec<Vec<Button>>) -> Self {
        Self { rows }
    }

    /// Convenience for "one button per row" layouts.
    pub fn column(buttons: Vec<Button>) -> Self {
        Self {
            rows: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn push_row(mut self, row: Vec<Button>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn push(mut self, button: Button) -> Self {
        self.rows.push(vec![button]);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }

    /// All semantic actions on the keyboard, row-major.
    pub fn actions(&self) -> Vec<&Action> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                ButtonKind::Action(a) => Some(a),
                ButtonKind::Url(_) => None,
            })
            .collect()
    }
}

/// Photo source: an already uploaded Telegram file or a local file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhotoRef {
    FileId(String),
    Path(PathBuf),
}

impl PhotoRef {
    /// Local path when it exists on disk, otherwise treat as a Telegram file id.
    pub fn guess(s: &str) -> Self {
        let p = PathBuf::from(s);
        if p.exists() {
            PhotoRef::Path(p)
        } else {
            PhotoRef::FileId(s.to_string())
        }
    }
}

/// Length limits of a messenger, in characters.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub max_message_len: usize,
    pub max_caption_len: usize,
}
