use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use saab_core::{ChatClient, Config};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod markup;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser)]
#[command(name = "doctor-saab")]
#[command(about = "Terminal chat client for the Doctor Saab diagnosis assistant")]
#[command(version)]
struct Cli {
    /// Base URL of the chat server
    #[arg(long, env = "DOCTOR_SAAB_URL")]
    url: Option<String>,

    /// Path to the JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// File that receives log output
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn default_log_path() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir().context("Could not determine cache directory")?;
    Ok(cache_dir.join("doctor-saab").join("doctor-saab.log"))
}

/// Send tracing output to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_ansi(false).with_writer(Mutex::new(file)))
        .with(filter)
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "using default configuration");
        Config::new()
    })
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event),
            None => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = match cli.log_file {
        Some(path) => path,
        None => default_log_path()?,
    };
    init_logging(&log_path)?;

    let config = load_config(cli.config.as_deref());
    let client = ChatClient::from_config(&config, cli.url.as_deref())?;
    tracing::info!(base_url = %client.base_url(), "starting doctor-saab");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(&config, client, events.sender());

    let result = run(&mut terminal, &mut app, &mut events).await;

    // Restore the terminal even if the loop failed
    tui::restore()?;
    result
}
