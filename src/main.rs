use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use rsyslox_client::{HttpLogApi, LogApi, SessionStore};
use rsyslox_logs::{
    EngineEvent, EngineOptions, FetchTrigger, FilterState, LogQueryEngine, QueryChange,
    RelativeDuration, TimeWindow, export_csv, export_json,
};

mod config;
mod output;
mod tail;

use config::{Config, FontSize, TimeFormat};
use tail::TailCursor;

/// rsyslox - Query and follow a centralized syslog store
#[derive(Parser, Debug)]
#[command(name = "rsyslox")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server URL (overrides config and RSYSLOX_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// API key sent as X-API-Key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Session token sent as X-Session-Token
    #[arg(long, global = true)]
    token: Option<String>,

    /// Config file (default ~/.rsyslox/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of logs
    Query(QueryArgs),
    /// Follow new logs with auto-refresh
    Tail(TailArgs),
    /// List the distinct values of a column
    Meta {
        /// Column name, e.g. FromHost or Severity
        column: String,
    },
    /// Check server health
    Health,
    /// Show or change preferences
    Prefs(PrefsArgs),
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    /// Severity (0-7), repeatable
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=7))]
    severity: Vec<u8>,

    /// Facility (0-23), repeatable
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=23))]
    facility: Vec<u8>,

    /// Host, repeatable
    #[arg(long)]
    host: Vec<String>,

    /// Syslog tag, repeatable
    #[arg(long)]
    tag: Vec<String>,

    /// Message substring
    #[arg(long)]
    message: Option<String>,

    /// Relative window: 15m, 1h, 6h, 24h, 7d or 30d (anything else means 1h)
    #[arg(long, conflicts_with_all = ["start", "end"], value_parser = parse_since)]
    since: Option<RelativeDuration>,

    /// Absolute start, e.g. 2025-02-15T10:00
    #[arg(long)]
    start: Option<String>,

    /// Absolute end
    #[arg(long)]
    end: Option<String>,
}

fn parse_since(value: &str) -> Result<RelativeDuration, Infallible> {
    Ok(RelativeDuration::from_label(value))
}

impl FilterArgs {
    fn filters(&self) -> FilterState {
        FilterState {
            severities: self.severity.iter().copied().collect(),
            facilities: self.facility.iter().copied().collect(),
            hosts: self.host.iter().cloned().collect::<BTreeSet<_>>(),
            tags: self.tag.iter().cloned().collect::<BTreeSet<_>>(),
            message: self.message.clone().unwrap_or_default(),
        }
    }

    fn time_window(&self) -> TimeWindow {
        if self.start.is_some() || self.end.is_some() {
            TimeWindow::absolute(
                self.start.clone().unwrap_or_default(),
                self.end.clone().unwrap_or_default(),
            )
        } else {
            TimeWindow::relative(self.since.unwrap_or_default())
        }
    }
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    page: u32,

    /// Rows per page (default from config)
    #[arg(long)]
    page_size: Option<u32>,

    /// Fetch every matching row in one request
    #[arg(long)]
    all: bool,

    /// Write the rows to a file instead of printing them
    #[arg(long, value_enum)]
    export: Option<ExportFormat>,

    /// Export destination (default rsyslox-logs.csv / .json)
    #[arg(long, requires = "export")]
    output: Option<PathBuf>,

    /// Show every column of the loaded entry with this ID
    #[arg(long, conflicts_with = "export")]
    id: Option<i64>,
}

#[derive(clap::Args, Debug)]
struct TailArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Seconds between polls (default from config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    interval: Option<u32>,
}

#[derive(clap::Args, Debug)]
struct PrefsArgs {
    #[arg(long)]
    language: Option<String>,

    #[arg(long, value_enum)]
    time_format: Option<TimeFormat>,

    #[arg(long, value_enum)]
    font_size: Option<FontSize>,

    /// Auto-refresh interval in seconds
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    interval: Option<u32>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing for debugging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .or_else(Config::default_path)
        .context("cannot determine home directory for config file")?;

    let mut config = Config::load_from(&config_path)?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(url) = &args.url {
        config.server.url = url.clone();
    }
    if let Some(key) = &args.api_key {
        config.server.api_key = Some(key.clone());
    }
    if let Some(token) = &args.token {
        config.server.session_token = Some(token.clone());
    }

    let session = Arc::new(SessionStore::new(config.credential()));
    let api = HttpLogApi::new(config.server.url.clone(), session);

    match args.command {
        Command::Query(query) => run_query(api, &config, query).await,
        Command::Tail(tail) => run_tail(api, &config, tail).await,
        Command::Meta { column } => {
            let values = api.column_values(&column).await?;
            for line in output::format_meta(values) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Health => {
            let health = api.health().await?;
            print!("{}", output::format_health(&health));
            Ok(())
        }
        Command::Prefs(prefs) => update_prefs(config, &config_path, prefs),
    }
}

fn new_engine(
    api: HttpLogApi,
    config: &Config,
    page_size: Option<u32>,
) -> (LogQueryEngine<HttpLogApi>, mpsc::UnboundedReceiver<EngineEvent>) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let options = EngineOptions {
        page_size: page_size.unwrap_or(config.query.page_size),
        refresh_interval_secs: config.preferences.auto_refresh_interval,
        ..EngineOptions::default()
    };
    (LogQueryEngine::new(api, options, event_tx), event_rx)
}

fn apply_filter_args(engine: &mut LogQueryEngine<HttpLogApi>, filter: &FilterArgs) {
    // Nothing is loaded yet, the first fetch is explicit
    let _ = engine.apply(QueryChange::Filters(filter.filters()));
    let _ = engine.apply(QueryChange::TimeWindow(filter.time_window()));
}

async fn run_query(api: HttpLogApi, config: &Config, args: QueryArgs) -> Result<()> {
    let (mut engine, _events) = new_engine(api, config, args.page_size);
    apply_filter_args(&mut engine, &args.filter);
    let _ = engine.set_show_all(args.all);

    engine.fetch(FetchTrigger::User).await;
    if !args.all && args.page > 1 {
        let transition = engine.set_page(args.page);
        engine.commit(transition).await;
    }
    if let Some(error) = engine.error() {
        bail!("{error}");
    }

    if let Some(format) = args.export {
        let artifact = match format {
            ExportFormat::Csv => export_csv(engine.rows())?,
            ExportFormat::Json => export_json(engine.rows())?,
        };
        let Some(artifact) = artifact else {
            eprintln!("No rows to export");
            return Ok(());
        };
        let path = args
            .output
            .unwrap_or_else(|| PathBuf::from(artifact.file_name));
        fs::write(&path, &artifact.contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        eprintln!("Wrote {} rows to {}", engine.rows().len(), path.display());
        return Ok(());
    }

    if let Some(id) = args.id {
        let Some(entry) = engine.rows().iter().find(|r| r.id().0 == id).cloned() else {
            bail!("entry {id} is not on page {}", engine.page());
        };
        engine.open_detail(entry);
        if let Some(entry) = engine.detail() {
            print!("{}", output::format_detail(entry));
        }
        engine.close_detail();
        return Ok(());
    }

    let time_format = config.preferences.time_format;
    for row in engine.rows() {
        println!("{}", output::format_row(row, time_format));
    }
    println!(
        "{}",
        output::format_footer(engine.page(), engine.total_pages(), engine.total())
    );
    Ok(())
}

async fn run_tail(api: HttpLogApi, config: &Config, args: TailArgs) -> Result<()> {
    let (mut engine, mut events) = new_engine(api, config, None);
    apply_filter_args(&mut engine, &args.filter);

    engine.fetch(FetchTrigger::User).await;
    if let Some(error) = engine.error() {
        bail!("{error}");
    }

    let time_format = config.preferences.time_format;
    let mut cursor = TailCursor::default();
    for row in cursor.advance(engine.rows()) {
        println!("{}", output::format_row(row, time_format));
    }

    let interval = args
        .interval
        .unwrap_or(config.preferences.auto_refresh_interval);
    engine.start_auto_refresh(interval);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            Some(event) = events.recv() => {
                let completed = matches!(event, EngineEvent::FetchCompleted(_));
                engine.handle_event(event);
                if !completed {
                    continue;
                }

                if let Some(error) = engine.error() {
                    eprintln!("Error: {error}");
                }
                if engine.session_expired() {
                    break;
                }
                for row in cursor.advance(engine.rows()) {
                    println!("{}", output::format_row(row, time_format));
                }
            }

            else => break,
        }
    }

    engine.shutdown();
    if engine.session_expired() {
        bail!("session expired, log in again or update the API key");
    }
    Ok(())
}

fn update_prefs(mut config: Config, path: &std::path::Path, args: PrefsArgs) -> Result<()> {
    let changed = args.language.is_some()
        || args.time_format.is_some()
        || args.font_size.is_some()
        || args.interval.is_some();

    if let Some(language) = args.language {
        config.preferences.language = language;
    }
    if let Some(time_format) = args.time_format {
        config.preferences.time_format = time_format;
    }
    if let Some(font_size) = args.font_size {
        config.preferences.font_size = font_size;
    }
    if let Some(interval) = args.interval {
        config.preferences.auto_refresh_interval = interval;
    }

    if changed {
        // Reload the file so env and flag overrides are not persisted
        let mut stored = Config::load_from(path)?;
        stored.preferences = config.preferences.clone();
        stored.save_to(path)?;
    }

    print!("{}", toml::to_string_pretty(&config.preferences)?);
    Ok(())
}
