//! Periodic KPI polling gated on page visibility.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::{DomContract, RuntimeConfig};
use crate::dom::Document;
use crate::error::Result;
use crate::format::{format_roi, format_total, number_text};
use crate::transport::{Transport, fetch_json};

/// Latest `/dashboard/kpis` payload. Fields that are absent or not numbers
/// are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KpiSnapshot {
    pub total_invested: Option<f64>,
    pub total_net_profit: Option<f64>,
    pub average_roi: Option<f64>,
    pub items_sold: Option<f64>,
    pub items_in_inventory: Option<f64>,
    pub items_listed: Option<f64>,
    pub items_watchlist: Option<f64>,
}

impl KpiSnapshot {
    pub fn from_json(v: &Value) -> Self {
        let num = |k: &str| v.get(k).and_then(Value::as_f64);
        Self {
            total_invested: num("total_invested"),
            total_net_profit: num("total_net_profit"),
            average_roi: num("average_roi"),
            items_sold: num("items_sold"),
            items_in_inventory: num("items_in_inventory"),
            items_listed: num("items_listed"),
            items_watchlist: num("items_watchlist"),
        }
    }

    /// Display text per element id, for the fields that carry a number.
    pub fn rendered(&self, dom: &DomContract) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Some(v) = self.total_invested {
            out.push((dom.total_invested_id.clone(), format_total(v)));
        }
        if let Some(v) = self.total_net_profit {
            out.push((dom.total_net_profit_id.clone(), format_total(v)));
        }
        if let Some(v) = self.average_roi {
            out.push((dom.average_roi_id.clone(), format_roi(v)));
        }
        if let Some(v) = self.items_sold {
            out.push((dom.items_sold_id.clone(), number_text(v)));
        }
        out
    }

    /// Writes each formatted field into its element; returns how many
    /// elements changed hands.
    pub fn apply(&self, doc: &mut Document, dom: &DomContract) -> usize {
        self.rendered(dom)
            .into_iter()
            .filter(|(id, text)| doc.set_text(id, text.clone()))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Current route does not show KPIs.
    OffRoute,
    Updated { fields: usize },
    Failed(String),
}

#[derive(Debug)]
pub struct RefreshScheduler {
    enabled: bool,
    last_update: Option<DateTime<Utc>>,
    routes: Vec<String>,
    kpi_path: String,
    max_retries: u32,
    snapshot: Option<KpiSnapshot>,
}

impl RefreshScheduler {
    pub fn new(cfg: &RuntimeConfig) -> Self {
        Self {
            enabled: true,
            last_update: None,
            routes: cfg.refresh_routes.clone(),
            kpi_path: cfg.kpi_path.clone(),
            max_retries: cfg.max_retries,
            snapshot: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn snapshot(&self) -> Option<&KpiSnapshot> {
        self.snapshot.as_ref()
    }

    /// Visibility change. Returns true when a refresh is due right away.
    pub fn on_visibility(&mut self, hidden: bool) -> bool {
        self.enabled = !hidden;
        !hidden
    }

    /// Evaluated when the interval fires, not when it was scheduled.
    pub fn tick_allowed(&self, page_hidden: bool) -> bool {
        self.enabled && !page_hidden
    }

    pub fn route_allowed(&self, path: &str) -> bool {
        self.routes.iter().any(|r| r == path)
    }

    pub fn refresh(
        &mut self,
        doc: &mut Document,
        dom: &DomContract,
        transport: &mut dyn Transport,
    ) -> RefreshOutcome {
        if !self.route_allowed(&doc.path) {
            return RefreshOutcome::OffRoute;
        }
        match self.fetch(transport) {
            Ok(snapshot) => {
                let fields = snapshot.apply(doc, dom);
                self.snapshot = Some(snapshot);
                self.last_update = Some(Utc::now());
                tracing::debug!(fields, "dashboard KPIs refreshed");
                RefreshOutcome::Updated { fields }
            }
            Err(e) => {
                tracing::error!(error = %e, "error refreshing dashboard");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    fn fetch(&self, transport: &mut dyn Transport) -> Result<KpiSnapshot> {
        let v: Value = fetch_json(transport, &self.kpi_path, self.max_retries)?;
        Ok(KpiSnapshot::from_json(&v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;

    fn dashboard() -> Document {
        let mut doc = Document {
            path: "/dashboard".into(),
            ..Document::default()
        };
        for id in ["totalInvested", "totalNetProfit", "averageROI", "itemsSold"] {
            doc.text.insert(id.into(), "-".into());
        }
        doc
    }

    #[test]
    fn formats_and_applies_snapshot() {
        let mut doc = dashboard();
        let mut t = ScriptedTransport::default();
        t.push_ok(
            r#"{"total_invested": 1234.5, "total_net_profit": -20.2, "average_roi": 12.345, "items_sold": 7, "items_listed": 3}"#,
        );
        let mut s = RefreshScheduler::new(&RuntimeConfig::default());
        let out = s.refresh(&mut doc, &DomContract::default(), &mut t);
        assert_eq!(out, RefreshOutcome::Updated { fields: 4 });
        assert_eq!(doc.text_of("totalInvested"), Some("$1235"));
        assert_eq!(doc.text_of("totalNetProfit"), Some("$-20"));
        assert_eq!(doc.text_of("averageROI"), Some("12.3%"));
        assert_eq!(doc.text_of("itemsSold"), Some("7"));
        assert_eq!(s.snapshot().unwrap().items_listed, Some(3.0));
        assert!(s.last_update().is_some());
        assert_eq!(t.requested, vec!["/dashboard/kpis"]);
    }

    #[test]
    fn non_numeric_fields_leave_elements_alone() {
        let mut doc = dashboard();
        let mut t = ScriptedTransport::default();
        t.push_ok(r#"{"total_invested": "n/a", "average_roi": null, "items_sold": 2}"#);
        let mut s = RefreshScheduler::new(&RuntimeConfig::default());
        s.refresh(&mut doc, &DomContract::default(), &mut t);
        assert_eq!(doc.text_of("totalInvested"), Some("-"));
        assert_eq!(doc.text_of("averageROI"), Some("-"));
        assert_eq!(doc.text_of("itemsSold"), Some("2"));
    }

    #[test]
    fn off_route_does_not_fetch() {
        let mut doc = dashboard();
        doc.path = "/items".into();
        let mut t = ScriptedTransport::default();
        let mut s = RefreshScheduler::new(&RuntimeConfig::default());
        assert_eq!(
            s.refresh(&mut doc, &DomContract::default(), &mut t),
            RefreshOutcome::OffRoute
        );
        assert!(t.requested.is_empty());
    }

    #[test]
    fn failures_are_swallowed_and_keep_old_text() {
        let mut doc = dashboard();
        let mut t = ScriptedTransport::default();
        t.push_ok("<html>login</html>");
        let mut s = RefreshScheduler::new(&RuntimeConfig::default());
        let out = s.refresh(&mut doc, &DomContract::default(), &mut t);
        assert!(matches!(out, RefreshOutcome::Failed(_)));
        assert_eq!(doc.text_of("itemsSold"), Some("-"));
        assert!(s.last_update().is_none());
    }

    #[test]
    fn visibility_gates_ticks() {
        let mut s = RefreshScheduler::new(&RuntimeConfig::default());
        assert!(s.tick_allowed(false));
        assert!(!s.on_visibility(true));
        assert!(!s.tick_allowed(false));
        assert!(s.on_visibility(false));
        assert!(s.tick_allowed(false));
        assert!(!s.tick_allowed(true));
    }
}
