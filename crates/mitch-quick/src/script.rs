//! Scripted page sessions: a page snapshot, timed events, and canned
//! server responses, replayed against a [`Runtime`] on the virtual clock.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::config::AppConfig;
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::host::{HostEffect, RecordingHost};
use crate::notify::Toast;
use crate::runtime::{Event, Outcome, Runtime};
use crate::transport::{HttpResponse, ScriptedTransport};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptedResponse {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    /// Network-level failure instead of a response.
    #[serde(default)]
    pub error: Option<String>,
}

fn default_status() -> u16 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub at_ms: u64,
    pub event: Event,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub page: Document,
    #[serde(default)]
    pub responses: Vec<ScriptedResponse>,
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Keep the clock running this long after page load.
    #[serde(default)]
    pub run_until_ms: u64,
}

impl Script {
    pub fn from_toml(src: &str) -> Result<Self> {
        let script: Script = toml::from_str(src)?;
        for (i, t) in script.page.tables.iter().enumerate() {
            t.validate()
                .map_err(|e| Error::msg(format!("table {i}: {e}")))?;
        }
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)
            .map_err(|e| Error::msg(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&src)
    }
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub effects: Vec<HostEffect>,
    pub toasts: Vec<Toast>,
    pub selected: Vec<String>,
    pub bulk_actions_visible: bool,
    pub text: BTreeMap<String, String>,
    pub prevented: usize,
    pub errors: Vec<String>,
    pub elapsed: Duration,
}

pub fn replay(config: AppConfig, script: Script) -> Result<ReplayReport> {
    let mut transport = ScriptedTransport::default();
    for r in script.responses {
        match r.error {
            Some(e) => transport.push(Err(Error::msg(e))),
            None => transport.push(Ok(HttpResponse {
                status: r.status,
                body: r.body,
            })),
        }
    }

    let mut rt = Runtime::init(config, script.page, RecordingHost::default(), Box::new(transport))?;
    let mut report = ReplayReport::default();

    let mut steps = script.steps;
    steps.sort_by_key(|s| s.at_ms);
    for step in steps {
        let at = Duration::from_millis(step.at_ms);
        rt.advance(at.saturating_sub(rt.now()));
        match rt.dispatch(step.event) {
            Ok(Outcome::PreventDefault) => report.prevented += 1,
            Ok(Outcome::Continue) => {}
            Err(e) => {
                tracing::warn!(at_ms = step.at_ms, error = %e, "event rejected");
                report.errors.push(format!("{}ms: {e}", step.at_ms));
            }
        }
    }
    let until = Duration::from_millis(script.run_until_ms);
    if until > rt.now() {
        rt.advance(until - rt.now());
    }

    report.toasts = rt.toasts().to_vec();
    report.selected = rt.selection().ids();
    report.bulk_actions_visible = rt.document().bulk_actions_visible;
    report.text = rt.document().text.clone();
    report.elapsed = rt.now();
    report.effects = rt.host_mut().take();
    Ok(report)
}
