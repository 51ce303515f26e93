use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use xclipring::clipboard::{ProtocolSession, request_rotate};
use xclipring::logging;
use xclipring::models::RingStore;
use xclipring::storage::{self, Config, ConfigStorage, TomlConfigStorage};

#[derive(Parser)]
#[command(name = "xclipring", version)]
#[command(about = "Clipboard history ring for X11", long_about = None)]
struct Cli {
    /// Selection to track (default: CLIPBOARD)
    #[arg(short, long)]
    selection: Option<String>,

    /// Ring storage directory (default: ~/.cache/xclipring/<selection>)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Number of clippings to keep (default: 1000)
    #[arg(short = 'c', long = "count", value_name = "COUNT",
          value_parser = clap::value_parser!(u32).range(1..))]
    count: Option<u32>,

    /// Tell the running daemon to rotate its ring by DELTA, then exit
    #[arg(short, long, value_name = "DELTA", allow_negative_numbers = true)]
    rotate: Option<i32>,

    /// Configuration file (default: ~/.config/xclipring/xclipring.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.rotate {
        Some(delta) => cmd_rotate(&cli, delta),
        None => cmd_serve(&cli),
    }
}

/// Load the config file and apply command-line overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => storage::default_config_path()?,
    };
    let mut config = TomlConfigStorage::new(path).load()?;

    if let Some(selection) = &cli.selection {
        config.general.selection = selection.clone();
    }
    if let Some(count) = cli.count {
        config.general.capacity = count as usize;
    }
    if let Some(directory) = &cli.directory {
        config.general.storage_dir = Some(directory.clone());
    }
    if cli.verbose {
        config.general.log_level = "debug".to_string();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Send a rotate command to the running daemon
fn cmd_rotate(cli: &Cli, delta: i32) -> Result<()> {
    env_logger::init();

    let config = load_config(cli)?;
    let selection = &config.general.selection;

    request_rotate(selection, delta)
        .with_context(|| format!("Failed to rotate the {} ring", selection))?;

    Ok(())
}

/// Run the daemon until the X connection goes away
fn cmd_serve(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let general = &config.general;

    logging::init_logger(general.log_file.clone(), &general.log_level)?;

    let storage_dir = match &general.storage_dir {
        Some(dir) => dir.clone(),
        None => storage::default_storage_dir(&general.selection)?,
    };

    log::info!(
        "Starting xclipring for {} (capacity {}, storage {:?})",
        general.selection,
        general.capacity,
        storage_dir
    );

    let mut ring = RingStore::open(&storage_dir, general.capacity)
        .with_context(|| format!("Failed to open clipboard ring at {:?}", storage_dir))?;

    let session =
        ProtocolSession::connect(&general.selection).context("Failed to set up X connection")?;
    session
        .listen()
        .context("Failed to listen for selection changes")?;

    let mut engine = session.engine(general.promote_on_paste);
    session
        .run(&mut engine, &mut ring)
        .context("X event loop ended")?;

    Ok(())
}
