use std::fmt;

use crate::dom::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    Success,
    Error,
    Warning,
    #[default]
    Info,
}

impl Severity {
    /// Unknown names map to `Info`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "success" => Severity::Success,
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Severity::Success => "success",
            Severity::Error => "danger",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Severity::Success => "check-circle",
            Severity::Error => "exclamation-triangle",
            Severity::Warning => "exclamation-circle",
            Severity::Info => "info-circle",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

pub type ToastId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: ToastId,
    pub message: String,
    pub severity: Severity,
}

impl Toast {
    pub fn class_name(&self) -> String {
        format!(
            "toast align-items-center text-white bg-{} border-0",
            self.severity.color()
        )
    }

    pub fn icon_class(&self) -> String {
        format!("fas fa-{} me-2", self.severity.icon())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastContainer {
    pub id: String,
    pub class_name: String,
    pub z_index: u32,
    pub toasts: Vec<Toast>,
}

impl ToastContainer {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            class_name: "toast-container position-fixed top-0 end-0 p-3".into(),
            z_index: 9999,
            toasts: Vec::new(),
        }
    }
}

/// Owns toasts from creation until their hide lifecycle completes.
#[derive(Debug)]
pub struct NotificationCenter {
    container_id: String,
    next_id: ToastId,
}

impl NotificationCenter {
    pub fn new(container_id: &str) -> Self {
        Self {
            container_id: container_id.to_string(),
            next_id: 1,
        }
    }

    /// Appends a toast to the page container, creating the container on
    /// first use.
    pub fn notify(&mut self, doc: &mut Document, message: &str, severity: Severity) -> Toast {
        let toast = Toast {
            id: self.next_id,
            message: message.to_string(),
            severity,
        };
        self.next_id += 1;
        let container = doc
            .toasts
            .get_or_insert_with(|| ToastContainer::new(&self.container_id));
        container.toasts.push(toast.clone());
        toast
    }

    /// Hide-complete: drops the toast. Unknown ids are ignored.
    pub fn on_hidden(&mut self, doc: &mut Document, id: ToastId) -> bool {
        let Some(container) = doc.toasts.as_mut() else {
            return false;
        };
        let before = container.toasts.len();
        container.toasts.retain(|t| t.id != id);
        container.toasts.len() != before
    }

    pub fn visible<'a>(&self, doc: &'a Document) -> &'a [Toast] {
        doc.toasts.as_ref().map(|c| c.toasts.as_slice()).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping() {
        let cases = [
            ("success", "success", "check-circle"),
            ("error", "danger", "exclamation-triangle"),
            ("warning", "warning", "exclamation-circle"),
            ("info", "info", "info-circle"),
            ("bogus", "info", "info-circle"),
        ];
        for (raw, color, icon) in cases {
            let s = Severity::parse(raw);
            assert_eq!(s.color(), color, "color for {raw}");
            assert_eq!(s.icon(), icon, "icon for {raw}");
        }
    }

    #[test]
    fn container_is_created_once_and_reused() {
        let mut doc = Document::default();
        let mut center = NotificationCenter::new("toast-container");
        assert!(doc.toasts.is_none());

        let a = center.notify(&mut doc, "first", Severity::Success);
        let b = center.notify(&mut doc, "second", Severity::Error);
        assert_ne!(a.id, b.id);

        let container = doc.toasts.as_ref().unwrap();
        assert_eq!(container.id, "toast-container");
        assert_eq!(container.z_index, 9999);
        assert_eq!(container.toasts.len(), 2);
        assert_eq!(b.class_name(), "toast align-items-center text-white bg-danger border-0");
    }

    #[test]
    fn hidden_toasts_are_removed_once() {
        let mut doc = Document::default();
        let mut center = NotificationCenter::new("toast-container");
        let t = center.notify(&mut doc, "bye", Severity::Info);
        assert!(center.on_hidden(&mut doc, t.id));
        assert!(!center.on_hidden(&mut doc, t.id));
        assert!(center.visible(&doc).is_empty());
        assert!(doc.toasts.is_some());
    }
}
