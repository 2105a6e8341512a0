//! Client-side checks run before a form is allowed to submit.

use std::sync::LazyLock;

use regex::Regex;

use crate::dom::{ElementRef, FieldKind, Form};

pub const PROCESSING_LABEL: &str = "Processing...";
pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_RE.is_match(raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: ElementRef,
    pub message: String,
}

/// First failing check wins: every required field in order, then every
/// non-empty email field.
pub fn validate(form: &Form) -> Result<(), Violation> {
    let at = |name: &str| ElementRef::Field {
        form: form.id.clone(),
        name: name.to_string(),
    };

    if let Some(f) = form
        .fields
        .iter()
        .find(|f| f.required && f.value.trim().is_empty())
    {
        let label = f
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or("This field");
        return Err(Violation {
            field: at(&f.name),
            message: format!("{label} is required"),
        });
    }

    if let Some(f) = form
        .fields
        .iter()
        .find(|f| f.kind == FieldKind::Email && !f.value.is_empty() && !is_valid_email(&f.value))
    {
        return Err(Violation {
            field: at(&f.name),
            message: INVALID_EMAIL_MESSAGE.to_string(),
        });
    }
    Ok(())
}

/// Disables the submit button and swaps in the processing label. Returns
/// the label to restore, or `None` when there is no button or it is
/// already locked.
pub fn lock_submit(form: &mut Form) -> Option<String> {
    let btn = form.submit.as_mut()?;
    if btn.disabled {
        return None;
    }
    btn.disabled = true;
    Some(std::mem::replace(&mut btn.label, PROCESSING_LABEL.to_string()))
}

pub fn unlock_submit(form: &mut Form, label: String) {
    if let Some(btn) = form.submit.as_mut() {
        btn.disabled = false;
        btn.label = label;
    }
}
