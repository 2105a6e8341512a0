//! Capabilities the runtime needs from whatever is hosting the page.

use crate::dom::ElementRef;
use crate::error::Result;
use crate::notify::{Toast, ToastId};

pub const SERVICE_WORKER_SCRIPT: &str = "/static/sw.js";

/// Confirmation dialog and ROI calculator widgets. Hosts without them use
/// [`NoopModals`].
pub trait ModalHelpers {
    fn show_confirmation(
        &mut self,
        _title: &str,
        _message: &str,
        _confirm_label: &str,
        _confirm_class: &str,
    ) -> bool {
        false
    }

    fn show_roi_calculator(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NoopModals;

impl ModalHelpers for NoopModals {}

pub trait Host {
    fn reload(&mut self);
    fn navigate(&mut self, url: &str);
    /// Rebinds tooltip widgets; called after every partial update.
    fn init_tooltips(&mut self);
    fn init_popovers(&mut self);
    fn show_toast(&mut self, toast: &Toast);
    fn hide_toast(&mut self, id: ToastId);
    fn hide_modal(&mut self, id: &str);
    fn focus(&mut self, element: &ElementRef);
    fn register_service_worker(&mut self, script: &str) -> Result<()>;
    fn modals(&mut self) -> &mut dyn ModalHelpers;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEffect {
    Reload,
    Navigate(String),
    InitTooltips,
    InitPopovers,
    ShowToast(ToastId),
    HideToast(ToastId),
    HideModal(String),
    Focus(ElementRef),
    RegisterServiceWorker(String),
}

/// Records effects instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub effects: Vec<HostEffect>,
    modals: NoopModals,
}

impl RecordingHost {
    pub fn count(&self, effect: &HostEffect) -> usize {
        self.effects.iter().filter(|e| *e == effect).count()
    }

    pub fn reloads(&self) -> usize {
        self.count(&HostEffect::Reload)
    }

    pub fn take(&mut self) -> Vec<HostEffect> {
        std::mem::take(&mut self.effects)
    }
}

impl Host for RecordingHost {
    fn reload(&mut self) {
        self.effects.push(HostEffect::Reload);
    }

    fn navigate(&mut self, url: &str) {
        self.effects.push(HostEffect::Navigate(url.to_string()));
    }

    fn init_tooltips(&mut self) {
        self.effects.push(HostEffect::InitTooltips);
    }

    fn init_popovers(&mut self) {
        self.effects.push(HostEffect::InitPopovers);
    }

    fn show_toast(&mut self, toast: &Toast) {
        self.effects.push(HostEffect::ShowToast(toast.id));
    }

    fn hide_toast(&mut self, id: ToastId) {
        self.effects.push(HostEffect::HideToast(id));
    }

    fn hide_modal(&mut self, id: &str) {
        self.effects.push(HostEffect::HideModal(id.to_string()));
    }

    fn focus(&mut self, element: &ElementRef) {
        self.effects.push(HostEffect::Focus(element.clone()));
    }

    fn register_service_worker(&mut self, script: &str) -> Result<()> {
        self.effects
            .push(HostEffect::RegisterServiceWorker(script.to_string()));
        Ok(())
    }

    fn modals(&mut self) -> &mut dyn ModalHelpers {
        &mut self.modals
    }
}
