//! Partial-update request lifecycle: busy indicators, endpoint-specific
//! response handling, and the price-update cooldown.

use std::time::Duration;

use mitch_quick_macros::Endpoint;
use serde::Deserialize;
use serde_json::Value;

use crate::format::number_text;
use crate::notify::Severity;
use crate::sanitize;

pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred. Please try again.";

/// What a response handler wants done; applied by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEffect {
    Notify(String, Severity),
    ScheduleReload,
    PriceUpdated,
}

#[derive(Debug, Default)]
pub struct ResponseCtx {
    pub effects: Vec<BridgeEffect>,
}

impl ResponseCtx {
    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.effects
            .push(BridgeEffect::Notify(message.into(), severity));
    }

    pub fn schedule_reload(&mut self) {
        self.effects.push(BridgeEffect::ScheduleReload);
    }

    pub fn mark_price_updated(&mut self) {
        self.effects.push(BridgeEffect::PriceUpdated);
    }
}

pub trait EndpointHandler {
    /// Substring of the request path this handler claims.
    fn path(&self) -> &'static str;
    fn handle(&self, status: u16, body: &str, ctx: &mut ResponseCtx);
}

/// Renders a JSON scalar the way string interpolation would.
fn interpolated(v: Option<&Value>) -> String {
    match v {
        None => "undefined".into(),
        Some(Value::Null) => "null".into(),
        Some(Value::String(s)) => sanitize::clean(s),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(number_text).unwrap_or_else(|| n.to_string()),
        },
        Some(other) => sanitize::clean(&other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub suggested_price: Option<Value>,
}

#[Endpoint(
    path = "update-price",
    reply = PriceReply,
    parse_error = "Error processing price update"
)]
pub struct PriceUpdate;

impl PriceUpdate {
    fn on_reply(reply: &PriceReply, ctx: &mut ResponseCtx) {
        if reply.success {
            ctx.notify(
                format!("Price updated: ${}", interpolated(reply.suggested_price.as_ref())),
                Severity::Success,
            );
            ctx.mark_price_updated();
        } else {
            ctx.notify("Could not fetch price suggestion", Severity::Warning);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkPriceReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub updated_count: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[Endpoint(
    path = "update-watchlist-prices",
    reply = BulkPriceReply,
    parse_error = "Error processing bulk update"
)]
pub struct BulkPriceUpdate;

impl BulkPriceUpdate {
    fn on_reply(reply: &BulkPriceReply, ctx: &mut ResponseCtx) {
        if reply.success {
            ctx.notify(
                format!("Updated {} items", interpolated(reply.updated_count.as_ref())),
                Severity::Success,
            );
            ctx.schedule_reload();
        } else {
            ctx.notify(
                format!("Error: {}", interpolated(reply.error.as_ref())),
                Severity::Error,
            );
        }
    }
}

/// Handlers in match order; the first whose path is a substring wins.
pub fn builtin_handlers() -> Vec<Box<dyn EndpointHandler>> {
    vec![Box::new(PriceUpdate), Box::new(BulkPriceUpdate)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    /// Blocked by the price-update cooldown; carries the time left.
    Cooldown(Duration),
}

pub struct RequestBridge {
    handlers: Vec<Box<dyn EndpointHandler>>,
    cooldown: Option<Duration>,
    last_price_update: Option<Duration>,
}

impl RequestBridge {
    /// `cooldown` is `None` unless enforcement is switched on.
    pub fn new(cooldown: Option<Duration>) -> Self {
        Self {
            handlers: builtin_handlers(),
            cooldown,
            last_price_update: None,
        }
    }

    pub fn last_price_update(&self) -> Option<Duration> {
        self.last_price_update
    }

    pub fn handler_for(&self, request_path: &str) -> Option<&dyn EndpointHandler> {
        self.handlers
            .iter()
            .find(|h| request_path.contains(h.path()))
            .map(|h| h.as_ref())
    }

    /// Before-request gate. Only single-item price updates are rate limited.
    pub fn gate(&self, request_path: &str, now: Duration) -> Gate {
        let (Some(cooldown), Some(last)) = (self.cooldown, self.last_price_update) else {
            return Gate::Proceed;
        };
        let is_price = self
            .handler_for(request_path)
            .is_some_and(|h| h.path() == PriceUpdate::PATH);
        if !is_price {
            return Gate::Proceed;
        }
        let elapsed = now.saturating_sub(last);
        if elapsed < cooldown {
            Gate::Cooldown(cooldown - elapsed)
        } else {
            Gate::Proceed
        }
    }

    /// Routes a completed response. Paths no handler claims yield no effects.
    pub fn route(&mut self, request_path: &str, status: u16, body: &str, now: Duration) -> Vec<BridgeEffect> {
        let mut ctx = ResponseCtx::default();
        if let Some(h) = self.handler_for(request_path) {
            h.handle(status, body, &mut ctx);
        }
        if ctx.effects.contains(&BridgeEffect::PriceUpdated) {
            self.last_price_update = Some(now);
        }
        ctx.effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(path: &str, status: u16, body: &str) -> Vec<BridgeEffect> {
        RequestBridge::new(None).route(path, status, body, Duration::ZERO)
    }

    #[test]
    fn price_update_success() {
        let fx = route(
            "/items/7/update-price",
            200,
            r#"{"success":true,"suggested_price":42.5}"#,
        );
        assert_eq!(
            fx,
            vec![
                BridgeEffect::Notify("Price updated: $42.5".into(), Severity::Success),
                BridgeEffect::PriceUpdated,
            ]
        );
    }

    #[test]
    fn price_update_business_failure_warns() {
        let fx = route("/items/7/update-price", 200, r#"{"success":false}"#);
        assert_eq!(
            fx,
            vec![BridgeEffect::Notify(
                "Could not fetch price suggestion".into(),
                Severity::Warning
            )]
        );
    }

    #[test]
    fn unparsable_bodies_report_processing_errors() {
        let fx = route("/items/7/update-price", 200, "<html>");
        assert_eq!(
            fx,
            vec![BridgeEffect::Notify(
                "Error processing price update".into(),
                Severity::Error
            )]
        );
        let fx = route("/dashboard/update-watchlist-prices", 200, "null");
        assert_eq!(
            fx,
            vec![BridgeEffect::Notify(
                "Error processing bulk update".into(),
                Severity::Error
            )]
        );
    }

    #[test]
    fn bulk_update_success_schedules_reload() {
        let fx = route(
            "/dashboard/update-watchlist-prices",
            200,
            r#"{"success":true,"updated_count":5}"#,
        );
        assert_eq!(
            fx,
            vec![
                BridgeEffect::Notify("Updated 5 items".into(), Severity::Success),
                BridgeEffect::ScheduleReload,
            ]
        );
    }

    #[test]
    fn bulk_update_failure_carries_server_message() {
        let fx = route(
            "/dashboard/update-watchlist-prices",
            200,
            r#"{"success":false,"error":"rate limited"}"#,
        );
        assert_eq!(
            fx,
            vec![BridgeEffect::Notify("Error: rate limited".into(), Severity::Error)]
        );
    }

    #[test]
    fn non_200_and_unclaimed_paths_do_nothing() {
        assert!(route("/items/7/update-price", 500, "{}").is_empty());
        assert!(route("/items/7/edit", 200, r#"{"success":true}"#).is_empty());
    }

    #[test]
    fn cooldown_blocks_only_recent_price_updates() {
        let mut b = RequestBridge::new(Some(Duration::from_secs(60)));
        assert_eq!(b.gate("/items/1/update-price", Duration::ZERO), Gate::Proceed);

        b.route(
            "/items/1/update-price",
            200,
            r#"{"success":true,"suggested_price":10}"#,
            Duration::from_secs(10),
        );
        assert_eq!(
            b.gate("/items/2/update-price", Duration::from_secs(40)),
            Gate::Cooldown(Duration::from_secs(30))
        );
        assert_eq!(
            b.gate("/dashboard/update-watchlist-prices", Duration::from_secs(40)),
            Gate::Proceed
        );
        assert_eq!(b.gate("/items/2/update-price", Duration::from_secs(70)), Gate::Proceed);
    }

    #[test]
    fn cooldown_is_off_by_default() {
        let mut b = RequestBridge::new(None);
        b.route(
            "/items/1/update-price",
            200,
            r#"{"success":true,"suggested_price":10}"#,
            Duration::from_secs(10),
        );
        assert_eq!(b.last_price_update(), Some(Duration::from_secs(10)));
        assert_eq!(b.gate("/items/1/update-price", Duration::from_secs(11)), Gate::Proceed);
    }
}
