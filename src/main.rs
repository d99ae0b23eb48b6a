use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use parley::{Config, CsvExporter, Exchange, HttpChatClient};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "parley")]
#[command(version, about = "Chat with a remote endpoint from the terminal, logging every message to CSV")]
struct Cli {
    /// Chat endpoint URL (overrides config file and PARLEY_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory for chat_log.csv
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Don't write chat_log.csv
    #[arg(long)]
    no_export: bool,

    /// Request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Config file (default: <config dir>/parley/config.json)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut config = loaded
        .with_env()
        .with_overrides(cli.endpoint, None);
    if cli.export_dir.is_some() {
        config.export_dir = cli.export_dir;
    }
    if cli.timeout_secs.is_some() {
        config.timeout_secs = cli.timeout_secs;
    }

    if let Some(log_path) = Config::log_path() {
        init_logging(&log_path);
    }
    info!(config = %config_path.display(), "starting parley");

    let exporter = match config.export_dir() {
        Some(dir) if !cli.no_export => CsvExporter::new(dir),
        _ => CsvExporter::disabled(),
    };
    if let Some(path) = exporter.path() {
        info!(path = %path.display(), "logging messages to csv");
    }

    let client = HttpChatClient::new(config.timeout())?;
    let exchange = Exchange::new(config, Arc::new(client), exporter);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, App::new(exchange)).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut tui::Tui, mut app: App) -> Result<()> {
    let mut events = EventHandler::new();

    loop {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        tokio::select! {
            event = events.next() => match event {
                Some(event) => handler::handle_event(&mut app, event),
                None => break,
            },
            result = app.wait_reply(), if app.reply_task.is_some() => {
                app.apply_reply(result);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Log to a file; the terminal belongs to the UI.
/// Filter with PARLEY_LOG, e.g. `PARLEY_LOG=parley=debug`.
fn init_logging(log_path: &Path) {
    if let Some(dir) = log_path.parent() {
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(log_path) else {
        return;
    };

    let filter = EnvFilter::try_from_env("PARLEY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
