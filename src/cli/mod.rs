use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::App;
use crate::config::{ConfigLoader, BASE_URL_ENV, COMPANY_ID_ENV, CONFIG_ENV};
use crate::gateway::HttpGateway;

pub mod commands;

use self::commands::{DeleteArgs, EditArgs, NewArgs};

const LOG_FILE: &str = "notes.log";

#[derive(Parser, Debug)]
#[command(
    name = "notes",
    version,
    about = "Terminal client for your company's shared notes"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over NOTES_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Company whose notes are shown (takes precedence over NOTES_COMPANY_ID)
    #[arg(long, global = true)]
    pub company_id: Option<String>,

    /// API origin (takes precedence over NOTES_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive TUI (default)
    Tui,
    /// Print every note of the company
    List,
    /// Create a new note from the command line
    New(NewArgs),
    /// Change the title or description of a note
    Edit(EditArgs),
    /// Delete a note (requires --yes)
    Delete(DeleteArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(company_id) = &cli.company_id {
        env::set_var(COMPANY_ID_ENV, company_id);
    }
    if let Some(base_url) = &cli.base_url {
        env::set_var(BASE_URL_ENV, base_url);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    let command = cli.command.unwrap_or(Commands::Tui);

    let target = match command {
        Commands::Tui => LogTarget::File(paths.log_dir.join(LOG_FILE)),
        _ => LogTarget::Stderr,
    };
    init_tracing(&cli.log_level, &target)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;

    let config = loader.load_or_init()?;
    config.validate(&paths)?;
    let gateway = HttpGateway::new(&config.api)?;
    tracing::debug!(
        company_id = gateway.company_id(),
        base_url = %config.api.base_url,
        "configuration loaded"
    );

    let config = Arc::new(config);
    match command {
        Commands::Tui => {
            let mut app = App::new(config, gateway);
            commands::run_tui(&mut app)
        }
        Commands::List => commands::list_notes(&gateway),
        Commands::New(args) => commands::new_note(&gateway, args),
        Commands::Edit(args) => commands::edit_note(&gateway, args),
        Commands::Delete(args) => commands::delete_note(&gateway, args),
    }
}

enum LogTarget {
    Stderr,
    File(PathBuf),
}

fn init_tracing(level: &str, target: &LogTarget) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        match target {
            LogTarget::Stderr => fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init(),
            LogTarget::File(path) => fmt()
                .with_env_filter(env_filter)
                .with_ansi(false)
                .with_writer(Mutex::new(open_log_file(path)?))
                .init(),
        }
        Ok::<(), anyhow::Error>(())
    })
    .map(|_| ())
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))
}
