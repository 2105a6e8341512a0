//! In-memory model of the rendered page the runtime keeps interactive.
//!
//! The server renders everything; this model only carries the pieces the
//! runtime reads or mutates between page loads.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::notify::ToastContainer;
use crate::table::Table;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Checkbox {
    pub value: String,
    #[serde(default)]
    pub checked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    #[default]
    Text,
    Email,
    Number,
    Date,
    Search,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Field {
    pub name: String,
    pub label: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub value: String,
    pub placeholder: String,
    /// `data-currency` inputs are normalised to two decimals on blur.
    pub currency: bool,
    /// `data-default-today` date inputs are filled in at init when empty.
    pub default_today: bool,
}

impl Field {
    pub fn is_search_like(&self) -> bool {
        self.kind == FieldKind::Search || self.placeholder.contains("search")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitButton {
    pub label: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Form {
    pub id: String,
    pub fields: Vec<Field>,
    pub submit: Option<SubmitButton>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Modal {
    pub id: String,
    pub shown: bool,
}

/// Element reference used for focus and busy indicators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ElementRef {
    Field { form: String, name: String },
    Search { table: usize },
    Element(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Document {
    /// Current location path, e.g. `/dashboard`.
    pub path: String,
    pub hidden: bool,
    pub has_select_all: bool,
    pub select_all_checked: bool,
    pub row_checkboxes: Vec<Checkbox>,
    pub has_bulk_actions: bool,
    pub has_selected_count: bool,
    pub tables: Vec<Table>,
    pub forms: Vec<Form>,
    pub modals: Vec<Modal>,
    /// Element ids that carry an inline `.htmx-indicator`.
    pub indicator_hosts: Vec<String>,
    /// Element id -> rendered text, for KPI tiles and similar text slots.
    pub text: BTreeMap<String, String>,

    #[serde(skip)]
    pub bulk_actions_visible: bool,
    #[serde(skip)]
    pub selected_count_text: Option<String>,
    #[serde(skip)]
    pub busy: BTreeMap<String, bool>,
    #[serde(skip)]
    pub focused: Option<ElementRef>,
    #[serde(skip)]
    pub toasts: Option<ToastContainer>,
}

impl Document {
    pub fn from_toml(src: &str) -> Result<Self> {
        let doc: Document =
            toml::from_str(src).map_err(|e| Error::msg(format!("invalid page snapshot: {e}")))?;
        for t in &doc.tables {
            t.validate()?;
        }
        Ok(doc)
    }

    pub fn table(&self, idx: usize) -> Result<&Table> {
        self.tables
            .get(idx)
            .ok_or_else(|| Error::msg(format!("no table at index {idx}")))
    }

    pub fn table_mut(&mut self, idx: usize) -> Result<&mut Table> {
        self.tables
            .get_mut(idx)
            .ok_or_else(|| Error::msg(format!("no table at index {idx}")))
    }

    pub fn form(&self, id: &str) -> Option<&Form> {
        self.forms.iter().find(|f| f.id == id)
    }

    pub fn form_mut(&mut self, id: &str) -> Option<&mut Form> {
        self.forms.iter_mut().find(|f| f.id == id)
    }

    pub fn set_text(&mut self, id: &str, text: String) -> bool {
        match self.text.get_mut(id) {
            Some(slot) => {
                *slot = text;
                true
            }
            None => false,
        }
    }

    pub fn text_of(&self, id: &str) -> Option<&str> {
        self.text.get(id).map(String::as_str)
    }

    pub fn is_busy(&self, element: &str) -> bool {
        self.busy.get(element).copied().unwrap_or(false)
    }

    /// Shows or hides the indicator inside `element`; elements without one
    /// are left alone.
    pub fn set_busy(&mut self, element: &str, busy: bool) -> bool {
        if !self.indicator_hosts.iter().any(|h| h == element) {
            return false;
        }
        self.busy.insert(element.to_string(), busy);
        true
    }

    /// First search-like input: a table search box, else a form field.
    pub fn first_search_input(&self) -> Option<ElementRef> {
        if let Some(idx) = self.tables.iter().position(|t| t.has_search) {
            return Some(ElementRef::Search { table: idx });
        }
        self.forms.iter().find_map(|f| {
            f.fields
                .iter()
                .find(|fl| fl.is_search_like())
                .map(|fl| ElementRef::Field {
                    form: f.id.clone(),
                    name: fl.name.clone(),
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
path = "/items"
has_select_all = true
has_bulk_actions = true
has_selected_count = true
indicator_hosts = ["refresh-btn"]

[[row_checkboxes]]
value = "1"

[[row_checkboxes]]
value = "2"
checked = true

[text]
totalInvested = "$0"

[[forms]]
id = "filters"

[[forms.fields]]
name = "q"
placeholder = "search items"
"#;

    #[test]
    fn parses_page_snapshot() {
        let doc = Document::from_toml(PAGE).unwrap();
        assert_eq!(doc.path, "/items");
        assert_eq!(doc.row_checkboxes.len(), 2);
        assert!(doc.row_checkboxes[1].checked);
        assert_eq!(doc.text_of("totalInvested"), Some("$0"));
        assert!(!doc.bulk_actions_visible);
    }

    #[test]
    fn busy_only_applies_to_indicator_hosts() {
        let mut doc = Document::from_toml(PAGE).unwrap();
        assert!(doc.set_busy("refresh-btn", true));
        assert!(doc.is_busy("refresh-btn"));
        assert!(!doc.set_busy("other", true));
        assert!(!doc.is_busy("other"));
    }

    #[test]
    fn search_falls_back_to_placeholder_match() {
        let doc = Document::from_toml(PAGE).unwrap();
        assert_eq!(
            doc.first_search_input(),
            Some(ElementRef::Field {
                form: "filters".into(),
                name: "q".into()
            })
        );
    }

    #[test]
    fn set_text_ignores_missing_elements() {
        let mut doc = Document::from_toml(PAGE).unwrap();
        assert!(!doc.set_text("missing", "x".into()));
        assert!(doc.set_text("totalInvested", "$10".into()));
        assert_eq!(doc.text_of("totalInvested"), Some("$10"));
    }
}
