use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use clap::Parser;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod client;
mod controller;
mod credentials;
mod domain;
mod filter;
mod inputter;
mod model;
mod record;
mod render;
mod ui;

use client::{HistoryLoader, HttpHistorySource};
use controller::Controller;
use credentials::CredentialStore;
use domain::{AppError, Effect, HistoryConfig, Message};
use model::Model;
use record::DisplayZone;
use ui::TableUI;

/// Browse the project history of the tyre testing service.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Base URL of the backend
    #[arg(long, env = "HISTORY_VIEW_BASE_URL", default_value = "http://localhost:3000")]
    base_url: String,

    /// JSON file holding the stored credentials [default: <config dir>/history-view/storage.json]
    #[arg(long)]
    token_store: Option<String>,

    /// Bearer token, takes precedence over the credential store
    #[arg(long, env = "HISTORY_VIEW_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// strftime format of the date columns
    #[arg(long, default_value = "%Y-%m-%d")]
    date_format: String,

    /// Show dates in UTC instead of the local time zone
    #[arg(long)]
    utc: bool,

    /// Initial search text
    #[arg(long, default_value = "")]
    search: String,

    /// Initial date created filter (YYYY-MM-DD)
    #[arg(long)]
    created: Option<String>,

    /// Initial date completed filter (YYYY-MM-DD)
    #[arg(long)]
    completed: Option<String>,

    /// Write the rendered table as HTML to this file ("-" for stdout) instead of starting the viewer
    #[arg(long)]
    html: Option<PathBuf>,

    /// Log file, the terminal belongs to the viewer
    #[arg(long, default_value = "history-view.log")]
    log_file: String,

    /// Milliseconds to wait for terminal events
    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<PathBuf, AppError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.into_owned()))
        .map_err(|e| AppError::InvalidOption(format!("{path}: {e}")))
}

fn init_logging(path: &Path) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| AppError::Logging(e.to_string()))
}

fn config_from_args(args: &Args) -> Result<HistoryConfig, AppError> {
    if StrftimeItems::new(&args.date_format).any(|item| matches!(item, Item::Error)) {
        return Err(AppError::InvalidOption(format!(
            "bad date format {:?}",
            args.date_format
        )));
    }
    let token_store = match &args.token_store {
        Some(path) => expand(path)?,
        None => CredentialStore::default_path(),
    };
    let display_zone = if args.utc {
        DisplayZone::Utc
    } else {
        DisplayZone::Local
    };

    Ok(HistoryConfig::default()
        .base_url(args.base_url.clone())
        .token_store(token_store)
        .token(args.token.clone())
        .request_timeout(Duration::from_secs(args.timeout))
        .date_format(args.date_format.clone())
        .display_zone(display_zone)
        .event_poll_time(args.event_poll_time))
}

fn date_arg(value: &Option<String>) -> Result<Option<chrono::NaiveDate>, AppError> {
    match value {
        Some(v) => filter::parse_date_input(v)
            .map_err(|e| AppError::InvalidOption(format!("date {v:?}: {e}"))),
        None => Ok(None),
    }
}

fn run(args: Args) -> Result<(), AppError> {
    init_logging(&expand(&args.log_file)?)?;
    let cfg = config_from_args(&args)?;
    info!("Starting history-view against {}", cfg.base_url);

    let runtime = tokio::runtime::Runtime::new()?;
    let loader = HistoryLoader::new(HttpHistorySource::new(&cfg)?);
    let mut controller = Controller::new(&cfg, loader, runtime.handle().clone());

    let mut model = Model::init(&cfg);
    model.set_search(&args.search);
    model.set_date_filters(date_arg(&args.created)?, date_arg(&args.completed)?);

    if let Some(effect) = model.update(Some(Message::Load)) {
        controller.perform(effect);
    }

    match &args.html {
        Some(target) => render_html(&mut model, &mut controller, target),
        None => run_viewer(&mut model, &mut controller),
    }
}

fn render_html(
    model: &mut Model,
    controller: &mut Controller<HttpHistorySource>,
    target: &Path,
) -> Result<(), AppError> {
    // A missing token is reported without starting a fetch.
    if model.is_loading() {
        let loaded = controller.wait_for_load();
        model.update(loaded);
    }
    let page = render::render_page(model);

    if target == Path::new("-") {
        std::io::stdout().write_all(page.as_bytes())?;
    } else {
        fs::write(target, page)?;
        info!("Wrote {}", target.display());
    }
    Ok(())
}

fn run_viewer(
    model: &mut Model,
    controller: &mut Controller<HttpHistorySource>,
) -> Result<(), AppError> {
    let mut terminal = ratatui::init();
    let mut ui = TableUI::new();

    let mut navigate_to = None;
    let result = (|| -> Result<(), AppError> {
        let size = terminal.size()?;
        model.update(Some(Message::Resize(size.width as usize, size.height as usize)));

        while model.is_running() {
            terminal.draw(|f| ui.draw(model, f))?;

            let message = controller.handle_event(model)?;
            match model.update(message) {
                Some(Effect::Navigate(url)) => navigate_to = Some(url),
                Some(effect) => controller.perform(effect),
                None => {}
            }
        }
        Ok(())
    })();

    controller.abort();
    ratatui::restore();

    if let Some(url) = navigate_to {
        println!("New request: {url}");
    }
    result
}
