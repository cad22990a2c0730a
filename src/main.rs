use chatgpt_md_export::{ConfigStore, export};
use clap::Parser;
use eyre::{Result, eyre};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Convert a ChatGPT conversation export to Markdown files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Unpacked export folder containing conversations.json.
    /// Defaults to ./chatgptexport if not set in config.
    #[arg(value_name = "INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Directory to write markdown files to.
    /// Defaults to ./output if not set in config.
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/chatgpt-md-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Comma-separated tags to add to frontmatter (e.g. "chatgpt,archive").
    #[arg(long, value_name = "TAGS", value_delimiter = ',')]
    tags: Option<Vec<String>>,

    /// Rewrite files even if they are up to date.
    #[arg(short, long)]
    force: bool,

    /// Print each file written or skipped. Repeat for debug logging.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress standard output (progress bars).
    #[arg(short, long)]
    quiet: bool,

    /// Store the effective settings (after CLI overrides) in the config file.
    #[arg(long)]
    save_config: bool,

    /// Delete the config file, restoring the defaults, and exit.
    #[arg(long, conflicts_with = "save_config")]
    reset_config: bool,

    /// Open the settings window instead of converting right away.
    #[cfg(feature = "gui")]
    #[arg(long)]
    gui: bool,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // 1. Locate the config file (CLI path > default path)
    let store = match &cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::at_default_location()?,
    };

    if cli.reset_config {
        store.reset()?;
        eprintln!("Settings reset to defaults ({}).", store.path().display());
        return Ok(());
    }

    #[cfg(feature = "gui")]
    if cli.gui {
        return chatgpt_md_export::gui::launch(store);
    }

    if cli.config.is_some() && !store.exists() && !cli.save_config {
        return Err(eyre!("Config file not found: {}", store.path().display()));
    }

    // 2. Load settings, then apply CLI overrides (CLI > Config > Default)
    let mut config = store.load()?;
    if let Some(input) = cli.input_dir {
        config.input_directory = input;
    }
    if let Some(output) = cli.output_dir {
        config.output_directory = output;
    }
    if let Some(tags) = cli.tags {
        config.tags = tags;
    }

    if cli.save_config {
        store.save(&config)?;
        eprintln!("Settings saved to {}.", store.path().display());
    }

    // 3. Runtime-only flags
    config.force = cli.force;
    config.verbose = cli.verbose > 0;
    config.quiet = cli.quiet;

    // 4. Run the Business Logic
    export::execute(&config)?;
    Ok(())
}
