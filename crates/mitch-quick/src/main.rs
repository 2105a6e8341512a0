use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use mitch_quick::Result;
use mitch_quick::config::{self, AppConfig};
use mitch_quick::transport::{HttpTransport, fetch_json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Runtime config TOML (supports `extends` and `imports`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch dashboard KPIs once and print them as the tiles would show them
    Kpis,
    /// Write a JSON array of records out as CSV
    ExportCsv {
        /// JSON file holding an array of objects
        records: PathBuf,
        /// Destination CSV file
        out: PathBuf,
    },
    /// Replay a scripted page session and print what happened
    Replay {
        /// Script TOML (page snapshot, responses, timed events)
        script: PathBuf,
    },
    /// Print the fully-resolved config TOML (after imports/extends)
    Resolve,
    /// Live terminal dashboard
    Watch,
}

fn init_logging(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mitch_quick=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    // The TUI owns the terminal; keep log lines off it.
    if !matches!(args.cmd, Command::Watch) {
        init_logging(args.log_json);
    }
    let cfg = config::load_app_config(args.config.as_deref())?;
    match args.cmd {
        Command::Kpis => cmd_kpis(&cfg),
        Command::ExportCsv { records, out } => cmd_export_csv(&records, &out),
        Command::Replay { script } => cmd_replay(cfg, &script),
        Command::Resolve => cmd_resolve(args.config.as_deref()),
        Command::Watch => mitch_quick::ui::run_watch(cfg),
    }
}

fn cmd_kpis(cfg: &AppConfig) -> Result<()> {
    let rt = &cfg.runtime;
    let mut transport = HttpTransport::new(&rt.base_url, rt.request_timeout())?;
    let v: serde_json::Value = fetch_json(&mut transport, &rt.kpi_path, rt.max_retries)?;
    let snapshot = mitch_quick::refresh::KpiSnapshot::from_json(&v);
    for (id, text) in snapshot.rendered(&cfg.dom) {
        println!("{id:<16} {text}");
    }
    Ok(())
}

fn cmd_export_csv(records: &Path, out: &Path) -> Result<()> {
    let src = std::fs::read_to_string(records).map_err(|e| {
        mitch_quick::Error::msg(format!("failed to read {}: {e}", records.display()))
    })?;
    let recs = mitch_quick::export::records_from_json(&src)?;
    let n = mitch_quick::export::export_to_file(&recs, out)?;
    tracing::info!(records = n, out = %out.display(), "csv exported");
    Ok(())
}

fn cmd_replay(cfg: AppConfig, path: &Path) -> Result<()> {
    let script = mitch_quick::script::Script::load(path)?;
    let report = mitch_quick::script::replay(cfg, script)?;

    println!("elapsed: {}ms", report.elapsed.as_millis());
    println!(
        "selected: {} [{}]  bulk actions: {}",
        report.selected.len(),
        report.selected.join(", "),
        if report.bulk_actions_visible { "shown" } else { "hidden" }
    );
    println!("prevented defaults: {}", report.prevented);
    for e in &report.effects {
        println!("effect  {e:?}");
    }
    for t in &report.toasts {
        println!("toast   [{}] {}", t.severity, t.message);
    }
    for (id, text) in &report.text {
        println!("text    {id} = {text}");
    }
    for e in &report.errors {
        println!("error   {e}");
    }
    Ok(())
}

fn cmd_resolve(path: Option<&Path>) -> Result<()> {
    let doc = match path {
        Some(p) => config::load(p)?,
        None => config::ConfigDoc::empty(),
    };
    let s = toml::to_string_pretty(&doc.value).unwrap_or_else(|_| format!("{:?}", doc.value));
    print!("{s}");
    Ok(())
}
