use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use toml::Value;

use crate::error::{Error, Result};

pub const BASE_URL_ENV: &str = "MITCH_QUICK_BASE_URL";

/// A resolved configuration file: `extends` and `imports` have already been
/// folded into `value`.
#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn empty() -> Self {
        Self {
            path: PathBuf::from("<default>"),
            value: Value::Table(Default::default()),
        }
    }

    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }
        path.split('.')
            .try_fold(&self.value, |cur, seg| cur.as_table()?.get(seg))
    }

    pub fn section<T: DeserializeOwned + Default>(&self, path: &str) -> Result<T> {
        let Some(v) = self.value_path(path) else {
            return Ok(T::default());
        };
        v.clone()
            .try_into()
            .map_err(|e| Error::msg(format!("invalid [{path}] section in {}: {e}", self.path.display())))
    }
}

fn default_refresh_routes() -> Vec<String> {
    vec!["/".into(), "/dashboard".into()]
}

fn default_kpi_path() -> String {
    "/dashboard/kpis".into()
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub refresh_interval_ms: u64,
    pub price_update_cooldown_ms: u64,
    pub enforce_price_cooldown: bool,
    pub max_retries: u32,
    pub reload_delay_ms: u64,
    pub submit_reset_ms: u64,
    pub toast_delay_ms: u64,
    #[serde(default = "default_refresh_routes")]
    pub refresh_routes: Vec<String>,
    #[serde(default = "default_kpi_path")]
    pub kpi_path: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub slow_action_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 300_000,
            price_update_cooldown_ms: 60_000,
            enforce_price_cooldown: false,
            max_retries: 0,
            reload_delay_ms: 1_500,
            submit_reset_ms: 5_000,
            toast_delay_ms: 5_000,
            refresh_routes: default_refresh_routes(),
            kpi_path: default_kpi_path(),
            base_url: default_base_url(),
            request_timeout_ms: 10_000,
            slow_action_ms: 1_000,
        }
    }
}

impl RuntimeConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn price_update_cooldown(&self) -> Duration {
        Duration::from_millis(self.price_update_cooldown_ms)
    }

    pub fn reload_delay(&self) -> Duration {
        Duration::from_millis(self.reload_delay_ms)
    }

    pub fn submit_reset(&self) -> Duration {
        Duration::from_millis(self.submit_reset_ms)
    }

    pub fn toast_delay(&self) -> Duration {
        Duration::from_millis(self.toast_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparatorMode {
    /// Numeric-vs-text decided for every compared pair.
    #[default]
    Pairwise,
    /// Column is numeric only when every cell parses.
    Column,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub comparator: ComparatorMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreOn {
    #[default]
    Timeout,
    Completion,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    pub restore_on: RestoreOn,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DomContract {
    pub select_all_id: String,
    pub row_checkbox_class: String,
    pub bulk_actions_class: String,
    pub selected_count_id: String,
    pub toast_container_id: String,
    pub table_class: String,
    pub sortable_attr: String,
    pub search_class: String,
    pub total_invested_id: String,
    pub total_net_profit_id: String,
    pub average_roi_id: String,
    pub items_sold_id: String,
}

impl Default for DomContract {
    fn default() -> Self {
        Self {
            select_all_id: "selectAllCheckbox".into(),
            row_checkbox_class: "item-checkbox".into(),
            bulk_actions_class: "bulk-actions".into(),
            selected_count_id: "selectedCount".into(),
            toast_container_id: "toast-container".into(),
            table_class: "data-table".into(),
            sortable_attr: "data-sortable".into(),
            search_class: "table-search".into(),
            total_invested_id: "totalInvested".into(),
            total_net_profit_id: "totalNetProfit".into(),
            average_roi_id: "averageROI".into(),
            items_sold_id: "itemsSold".into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub runtime: RuntimeConfig,
    pub table: TableConfig,
    pub forms: FormsConfig,
    pub dom: DomContract,
}

impl AppConfig {
    pub fn from_doc(doc: &ConfigDoc) -> Result<Self> {
        let mut runtime: RuntimeConfig = doc.section("runtime")?;
        runtime.base_url = runtime.base_url.trim_end_matches('/').to_string();
        let cfg = Self {
            runtime,
            table: doc.section("table")?,
            forms: doc.section("forms")?,
            dom: doc.section("dom")?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// A zero interval would reschedule the refresh tick at the same instant
    /// forever.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.refresh_interval_ms == 0 {
            return Err(Error::msg("runtime.refresh_interval_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Applies `MITCH_QUICK_BASE_URL` when it is set and non-empty.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.runtime.base_url = url.trim_end_matches('/').to_string();
            }
        }
    }
}

pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_tbl), Value::Table(over_tbl)) => {
            for (k, v) in over_tbl {
                match base_tbl.get_mut(&k) {
                    Some(slot) => merge(slot, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn sibling_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        return p;
    }
    from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
}

fn take_imports(path: &Path, value: &mut Value) -> Result<Vec<String>> {
    let Some(tbl) = value.as_table_mut() else {
        return Ok(Vec::new());
    };
    let Some(raw) = tbl.remove("imports") else {
        return Ok(Vec::new());
    };
    let Value::Array(items) = raw else {
        return Err(Error::msg(format!(
            "'imports' in {} must be an array of paths",
            path.display()
        )));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(s) = item else {
            return Err(Error::msg(format!(
                "invalid imports entry in {} (expected string)",
                path.display()
            )));
        };
        let s = s.trim();
        if !s.is_empty() {
            out.push(s.to_string());
        }
    }
    Ok(out)
}

fn load_layer(path: &Path, chain: &mut HashSet<PathBuf>) -> Result<Value> {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !chain.insert(key.clone()) {
        return Err(Error::msg(format!(
            "config import cycle detected at {}",
            key.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read config {}: {e}", path.display())))?;
    let mut value: Value = toml::from_str(&data)
        .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))?;

    let mut out = Value::Table(Default::default());
    let parent = value
        .as_table_mut()
        .and_then(|t| t.remove("extends"))
        .and_then(|v| v.as_str().map(str::to_string));
    if let Some(parent) = parent {
        out = load_layer(&sibling_path(path, &parent), chain)?;
    }

    for imp in take_imports(path, &mut value)? {
        let layer = load_layer(&sibling_path(path, &imp), chain)?;
        merge(&mut out, layer);
    }
    merge(&mut out, value);

    chain.remove(&key);
    Ok(out)
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut chain = HashSet::new();
    let value = load_layer(path, &mut chain)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}

/// Loads `path` when given, otherwise the built-in defaults, then applies
/// environment overrides.
pub fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    let doc = match path {
        Some(p) => load(p)?,
        None => ConfigDoc::empty(),
    };
    let mut cfg = AppConfig::from_doc(&doc)?;
    cfg.apply_env();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(src: &str) -> ConfigDoc {
        ConfigDoc {
            path: PathBuf::from("<mem>"),
            value: toml::from_str(src).unwrap(),
        }
    }

    #[test]
    fn defaults_match_dashboard_constants() {
        let cfg = AppConfig::from_doc(&ConfigDoc::empty()).unwrap();
        assert_eq!(cfg.runtime.refresh_interval(), Duration::from_secs(300));
        assert_eq!(cfg.runtime.price_update_cooldown(), Duration::from_secs(60));
        assert_eq!(cfg.runtime.reload_delay(), Duration::from_millis(1500));
        assert_eq!(cfg.runtime.submit_reset(), Duration::from_secs(5));
        assert_eq!(cfg.runtime.refresh_routes, vec!["/", "/dashboard"]);
        assert_eq!(cfg.table.comparator, ComparatorMode::Pairwise);
        assert_eq!(cfg.forms.restore_on, RestoreOn::Timeout);
        assert_eq!(cfg.dom.select_all_id, "selectAllCheckbox");
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = AppConfig::from_doc(&doc(
            r#"
[runtime]
refresh_interval_ms = 1000
base_url = "http://example.test/"

[table]
comparator = "column"

[forms]
restore_on = "completion"
"#,
        ))
        .unwrap();
        assert_eq!(cfg.runtime.refresh_interval_ms, 1000);
        assert_eq!(cfg.runtime.base_url, "http://example.test");
        assert_eq!(cfg.runtime.kpi_path, "/dashboard/kpis");
        assert_eq!(cfg.table.comparator, ComparatorMode::Column);
        assert_eq!(cfg.forms.restore_on, RestoreOn::Completion);
    }

    #[test]
    fn rejects_zero_interval() {
        let err = AppConfig::from_doc(&doc("[runtime]\nrefresh_interval_ms = 0\n"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("refresh_interval_ms"), "unexpected err: {err}");
    }

    #[test]
    fn merge_overlays_nested_tables() {
        let mut base: Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        merge(&mut base, toml::from_str("[a]\ny = 3\nz = 4\n").unwrap());
        let a = base.get("a").unwrap();
        assert_eq!(a.get("x").and_then(Value::as_integer), Some(1));
        assert_eq!(a.get("y").and_then(Value::as_integer), Some(3));
        assert_eq!(a.get("z").and_then(Value::as_integer), Some(4));
    }
}
