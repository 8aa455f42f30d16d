use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::app::{App, OwnerMode};
use crate::config::ConfigLoader;
use crate::storage;

pub mod commands;

use self::commands::{
    DeleteArgs, EditArgs, ListArgs, NewArgs, OwnerArgs, SearchArgs, ShowArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "til",
    version,
    about = "Today-I-Learned notes with ordered content blocks"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over TIL_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over TIL_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List posts, newest first (default)
    List(ListArgs),
    /// Print one post with its content blocks
    Show(ShowArgs),
    /// Compose and publish a new post
    New(NewArgs),
    /// Edit an existing post and its content blocks
    Edit(EditArgs),
    /// Delete a post
    Delete(DeleteArgs),
    /// Search posts (supports tag:, #tag, category:, date: ranges)
    Search(SearchArgs),
    /// Toggle owner mode, which unlocks new/edit/delete
    Owner(OwnerArgs),
    /// Serve the JSON REST API
    Serve,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("TIL_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("TIL_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = Arc::new(loader.load_or_init()?);
    let repo = storage::init(&paths, &config.storage)?;

    let command = cli
        .command
        .unwrap_or(Commands::List(ListArgs::default()));
    if let Commands::Serve = command {
        return commands::serve(&config, repo);
    }

    let owner = OwnerMode::load(&paths.owner_file).context("loading owner mode flag")?;
    let mut app = App::new(config, repo, owner);
    let output = commands::dispatch(&mut app, command)?;
    print!("{output}");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
