//! Per-page runtime: owns the page model and every piece of client state,
//! and turns typed page events into state changes and host effects.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::bridge::{BridgeEffect, GENERIC_ERROR_MESSAGE, Gate, RequestBridge};
use crate::config::{AppConfig, RestoreOn};
use crate::dom::{Document, ElementRef, FieldKind};
use crate::error::{Error, Result};
use crate::export::{self, Record};
use crate::format::{self, normalize_currency_input, today_iso};
use crate::forms::{self, lock_submit, unlock_submit};
use crate::host::{Host, SERVICE_WORKER_SCRIPT};
use crate::keys::{self, KeyPress, NEW_ITEM_ROUTE, Shortcut};
use crate::notify::{NotificationCenter, Severity, Toast, ToastId};
use crate::refresh::{RefreshOutcome, RefreshScheduler};
use crate::sanitize;
use crate::selection::SelectionStore;
use crate::table::SortDirection;
use crate::timers::{TimerKind, TimerQueue};
use crate::transport::Transport;

fn ok_status() -> u16 {
    200
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    RowChecked {
        id: String,
        checked: bool,
    },
    SelectAll {
        checked: bool,
    },
    HeaderClicked {
        table: usize,
        column: usize,
    },
    SearchInput {
        table: usize,
        term: String,
    },
    VisibilityChanged {
        hidden: bool,
    },
    BeforeRequest {
        element: String,
        path: String,
    },
    AfterRequest {
        element: String,
        path: String,
        #[serde(default = "ok_status")]
        status: u16,
        #[serde(default)]
        body: String,
    },
    RequestError {
        element: String,
        path: String,
        #[serde(default)]
        detail: String,
    },
    Submit {
        form: String,
    },
    FieldBlur {
        form: String,
        field: String,
    },
    KeyDown(KeyPress),
    ToastHidden {
        id: ToastId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// The default action (submission, request, browser shortcut) is
    /// suppressed.
    PreventDefault,
}

pub fn log_performance(action: &str, started: Instant, slow: Duration) {
    let elapsed = started.elapsed();
    let ms = elapsed.as_secs_f64() * 1000.0;
    if elapsed > slow {
        tracing::warn!(action, elapsed_ms = ms, "slow action");
    } else {
        tracing::debug!(action, elapsed_ms = ms, "performance");
    }
}

pub struct Runtime<H: Host> {
    config: AppConfig,
    doc: Document,
    host: H,
    transport: Box<dyn Transport>,
    selection: SelectionStore,
    notifications: NotificationCenter,
    refresh: RefreshScheduler,
    bridge: RequestBridge,
    timers: TimerQueue,
    // form id -> label to put back on its submit button
    locked_submits: BTreeMap<String, String>,
}

impl<H: Host> Runtime<H> {
    /// Page-load entry point: component setup, the recurring refresh timer,
    /// and service-worker registration.
    pub fn init(
        config: AppConfig,
        doc: Document,
        host: H,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let cooldown = config
            .runtime
            .enforce_price_cooldown
            .then(|| config.runtime.price_update_cooldown());
        let mut rt = Self {
            selection: SelectionStore::default(),
            notifications: NotificationCenter::new(&config.dom.toast_container_id),
            refresh: RefreshScheduler::new(&config.runtime),
            bridge: RequestBridge::new(cooldown),
            timers: TimerQueue::default(),
            locked_submits: BTreeMap::new(),
            config,
            doc,
            host,
            transport,
        };
        rt.initialize_components();
        rt.timers
            .schedule(rt.config.runtime.refresh_interval(), TimerKind::RefreshTick);
        match rt.host.register_service_worker(SERVICE_WORKER_SCRIPT) {
            Ok(()) => tracing::debug!(script = SERVICE_WORKER_SCRIPT, "service worker registered"),
            Err(e) => tracing::info!(error = %e, "service worker registration failed"),
        }
        tracing::info!(path = %rt.doc.path, "Mitch Quick runtime initialized");
        Ok(rt)
    }

    fn initialize_components(&mut self) {
        for t in &self.doc.tables {
            let sortable = t.headers.iter().filter(|h| h.sortable).count();
            tracing::trace!(sortable, searchable = t.has_search, "table enhanced");
        }
        self.host.init_tooltips();
        self.host.init_popovers();

        let mut today: Option<String> = None;
        for form in &mut self.doc.forms {
            for f in &mut form.fields {
                if f.kind == FieldKind::Date && f.default_today && f.value.is_empty() {
                    f.value = today.get_or_insert_with(today_iso).clone();
                }
            }
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Direct page access for what the server re-renders or the user types.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn selection(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn refresh_state(&self) -> &RefreshScheduler {
        &self.refresh
    }

    pub fn toasts(&self) -> &[Toast] {
        self.notifications.visible(&self.doc)
    }

    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn dispatch(&mut self, event: Event) -> Result<Outcome> {
        match event {
            Event::RowChecked { id, checked } => self.on_row_checked(&id, checked),
            Event::SelectAll { checked } => self.on_select_all(checked),
            Event::HeaderClicked { table, column } => {
                self.on_header_clicked(table, column)?;
            }
            Event::SearchInput { table, term } => self.on_search_input(table, &term)?,
            Event::VisibilityChanged { hidden } => {
                self.on_visibility_changed(hidden);
            }
            Event::BeforeRequest { element, path } => {
                return Ok(self.on_before_request(&element, &path));
            }
            Event::AfterRequest {
                element,
                path,
                status,
                body,
            } => self.on_after_request(&element, &path, status, &body),
            Event::RequestError {
                element,
                path,
                detail,
            } => self.on_request_error(&element, &path, &detail),
            Event::Submit { form } => return self.on_submit(&form),
            Event::FieldBlur { form, field } => self.on_field_blur(&form, &field),
            Event::KeyDown(press) => return Ok(self.on_key_down(&press)),
            Event::ToastHidden { id } => {
                self.notifications.on_hidden(&mut self.doc, id);
            }
        }
        Ok(Outcome::Continue)
    }

    /// Moves the virtual clock forward, firing every timer that falls due.
    pub fn advance(&mut self, by: Duration) {
        let until = self.timers.now() + by;
        while let Some(kind) = self.timers.pop_due(until) {
            self.fire(kind);
        }
        self.timers.set_now(until);
    }

    fn fire(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::RefreshTick => {
                self.timers
                    .schedule(self.config.runtime.refresh_interval(), TimerKind::RefreshTick);
                if self.refresh.tick_allowed(self.doc.hidden) {
                    self.refresh_dashboard();
                }
            }
            TimerKind::ToastHide(id) => {
                self.host.hide_toast(id);
                self.notifications.on_hidden(&mut self.doc, id);
            }
            TimerKind::SubmitReset { form } => self.restore_submit(&form),
            TimerKind::Reload => self.host.reload(),
        }
    }

    // --- notifications -------------------------------------------------

    pub fn notify(&mut self, message: &str, severity: Severity) -> ToastId {
        let toast = self
            .notifications
            .notify(&mut self.doc, message, severity);
        tracing::info!(severity = %severity, text = message, "notification");
        self.host.show_toast(&toast);
        self.timers
            .schedule(self.config.runtime.toast_delay(), TimerKind::ToastHide(toast.id));
        toast.id
    }

    /// Severity given by name; unknown names show as info.
    pub fn show_notification(&mut self, message: &str, kind: &str) -> ToastId {
        self.notify(message, Severity::parse(kind))
    }

    // --- selection -----------------------------------------------------

    pub fn on_row_checked(&mut self, id: &str, checked: bool) {
        if let Some(cb) = self.doc.row_checkboxes.iter_mut().find(|cb| cb.value == id) {
            cb.checked = checked;
        }
        self.selection.toggle(id, checked);
        self.update_bulk_action_ui();
    }

    pub fn on_select_all(&mut self, checked: bool) {
        self.doc.select_all_checked = checked;
        self.selection
            .select_all(&mut self.doc.row_checkboxes, checked);
        self.update_bulk_action_ui();
    }

    fn update_bulk_action_ui(&mut self) {
        let count = self.selection.count();
        if self.doc.has_bulk_actions {
            self.doc.bulk_actions_visible = count > 0;
        }
        if self.doc.has_selected_count {
            self.doc.selected_count_text = Some(count.to_string());
        }
    }

    // --- tables --------------------------------------------------------

    pub fn on_header_clicked(&mut self, table: usize, column: usize) -> Result<SortDirection> {
        let started = Instant::now();
        let mode = self.config.table.comparator;
        let dir = self.doc.table_mut(table)?.sort(column, mode)?;
        log_performance("sort table", started, self.slow_threshold());
        Ok(dir)
    }

    pub fn on_search_input(&mut self, table: usize, term: &str) -> Result<()> {
        let started = Instant::now();
        self.doc.table_mut(table)?.filter(term);
        log_performance("filter table", started, self.slow_threshold());
        Ok(())
    }

    fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.config.runtime.slow_action_ms)
    }

    // --- refresh -------------------------------------------------------

    /// Returns the outcome of the immediate refresh when visibility returns.
    pub fn on_visibility_changed(&mut self, hidden: bool) -> Option<RefreshOutcome> {
        self.doc.hidden = hidden;
        self.refresh
            .on_visibility(hidden)
            .then(|| self.refresh_dashboard())
    }

    pub fn refresh_dashboard(&mut self) -> RefreshOutcome {
        self.refresh
            .refresh(&mut self.doc, &self.config.dom, self.transport.as_mut())
    }

    // --- partial-update requests ---------------------------------------

    pub fn on_before_request(&mut self, element: &str, path: &str) -> Outcome {
        if let Gate::Cooldown(left) = self.bridge.gate(path, self.timers.now()) {
            let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
            self.notify(
                &format!("Please wait {secs}s before requesting another price update"),
                Severity::Warning,
            );
            return Outcome::PreventDefault;
        }
        self.doc.set_busy(element, true);
        Outcome::Continue
    }

    pub fn on_after_request(&mut self, element: &str, path: &str, status: u16, body: &str) {
        self.doc.set_busy(element, false);

        let effects = self.bridge.route(path, status, body, self.timers.now());
        for fx in effects {
            match fx {
                BridgeEffect::Notify(message, severity) => {
                    self.notify(&message, severity);
                }
                BridgeEffect::ScheduleReload => {
                    self.timers
                        .schedule(self.config.runtime.reload_delay(), TimerKind::Reload);
                }
                BridgeEffect::PriceUpdated => {}
            }
        }

        if self.config.forms.restore_on == RestoreOn::Completion {
            self.restore_submit(element);
        }
        self.host.init_tooltips();
    }

    pub fn on_request_error(&mut self, element: &str, path: &str, detail: &str) {
        tracing::error!(
            element,
            path,
            detail = %sanitize::clean(detail),
            "partial update request failed"
        );
        self.notify(GENERIC_ERROR_MESSAGE, Severity::Error);
    }

    // --- forms ---------------------------------------------------------

    pub fn on_submit(&mut self, form_id: &str) -> Result<Outcome> {
        let form = self
            .doc
            .form(form_id)
            .ok_or_else(|| Error::msg(format!("no form with id '{form_id}'")))?;
        if let Err(v) = forms::validate(form) {
            self.doc.focused = Some(v.field.clone());
            self.host.focus(&v.field);
            self.notify(&v.message, Severity::Error);
            return Ok(Outcome::PreventDefault);
        }

        let reset = self.config.runtime.submit_reset();
        if let Some(form) = self.doc.form_mut(form_id)
            && let Some(label) = lock_submit(form)
        {
            self.locked_submits.insert(form_id.to_string(), label);
            self.timers.schedule(
                reset,
                TimerKind::SubmitReset {
                    form: form_id.to_string(),
                },
            );
        }
        Ok(Outcome::Continue)
    }

    fn restore_submit(&mut self, form_id: &str) {
        let Some(label) = self.locked_submits.remove(form_id) else {
            return;
        };
        if let Some(form) = self.doc.form_mut(form_id) {
            unlock_submit(form, label);
        }
    }

    pub fn on_field_blur(&mut self, form_id: &str, field: &str) {
        let Some(f) = self
            .doc
            .form_mut(form_id)
            .and_then(|form| form.fields.iter_mut().find(|f| f.name == field))
        else {
            return;
        };
        if !f.currency {
            return;
        }
        if let Some(v) = normalize_currency_input(&f.value) {
            f.value = v;
        }
    }

    // --- keyboard ------------------------------------------------------

    pub fn on_key_down(&mut self, press: &KeyPress) -> Outcome {
        let Some(shortcut) = keys::route(press) else {
            return Outcome::Continue;
        };
        match shortcut {
            Shortcut::FocusSearch => {
                if let Some(el) = self.doc.first_search_input() {
                    self.host.focus(&el);
                    self.doc.focused = Some(el);
                }
            }
            Shortcut::NewItem => self.host.navigate(NEW_ITEM_ROUTE),
            Shortcut::Reload => self.host.reload(),
            Shortcut::CloseModals => self.close_modals(),
        }
        if shortcut.prevents_default() {
            Outcome::PreventDefault
        } else {
            Outcome::Continue
        }
    }

    pub fn close_modals(&mut self) {
        for m in self.doc.modals.iter_mut().filter(|m| m.shown) {
            m.shown = false;
            self.host.hide_modal(&m.id);
        }
    }

    // --- helpers exposed to page templates ------------------------------

    pub fn format_currency(&self, amount: f64) -> String {
        format::format_currency(amount)
    }

    pub fn show_confirm_dialog(&mut self, title: &str, message: &str) -> bool {
        self.host
            .modals()
            .show_confirmation(title, message, "Confirm", "btn-danger")
    }

    pub fn show_roi_calculator(&mut self) {
        self.host.modals().show_roi_calculator();
    }

    pub fn export_to_csv(&mut self, records: &[Record], path: &Path) -> Result<usize> {
        let started = Instant::now();
        let n = export::export_to_file(records, path)?;
        log_performance("export csv", started, self.slow_threshold());
        Ok(n)
    }

    pub fn focused(&self) -> Option<&ElementRef> {
        self.doc.focused.as_ref()
    }
}
