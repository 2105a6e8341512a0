use std::collections::HashSet;

use crate::dom::Checkbox;

/// Ids of rows checked since page load. Starts empty; rows the server
/// rendered as checked join only through a change event.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    selected: HashSet<String>,
}

impl SelectionStore {
    /// Returns whether membership changed. Callers refresh the bulk UI
    /// either way.
    pub fn toggle(&mut self, id: &str, selected: bool) -> bool {
        if selected {
            self.selected.insert(id.to_string())
        } else {
            self.selected.remove(id)
        }
    }

    /// Fans the master checkbox out to every rendered row. Rows toggled
    /// later do not feed back into the master state.
    pub fn select_all(&mut self, rows: &mut [Checkbox], selected: bool) {
        for cb in rows.iter_mut() {
            cb.checked = selected;
            self.toggle(&cb.value, selected);
        }
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }
}
