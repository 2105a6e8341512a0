use serde::Deserialize;

pub const NEW_ITEM_ROUTE: &str = "/items/create";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyPress {
    pub key: String,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
}

impl KeyPress {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            meta: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    FocusSearch,
    NewItem,
    Reload,
    CloseModals,
}

impl Shortcut {
    /// Modifier shortcuts suppress the browser default; Escape does not.
    pub fn prevents_default(self) -> bool {
        !matches!(self, Shortcut::CloseModals)
    }
}

/// Ctrl or Cmd with k/n/r, or a bare Escape.
pub fn route(press: &KeyPress) -> Option<Shortcut> {
    if press.ctrl || press.meta {
        let hit = match press.key.as_str() {
            "k" => Some(Shortcut::FocusSearch),
            "n" => Some(Shortcut::NewItem),
            "r" => Some(Shortcut::Reload),
            _ => None,
        };
        if hit.is_some() {
            return hit;
        }
    }
    (press.key == "Escape").then_some(Shortcut::CloseModals)
}
