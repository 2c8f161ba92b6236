use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "xrip")]
#[command(about = "Live-process game asset extractor")]
struct Cli {
    /// Configuration file; defaults are used when it does not exist.
    #[arg(short, long, default_value = "xrip.json")]
    config: PathBuf,

    /// Directory holding the loader stub's published state.
    #[arg(long, default_value = ".", env = "XRIP_STATE_DIR")]
    state_dir: PathBuf,

    /// Executable name of the target process.
    #[arg(long, default_value = "xloader.exe")]
    exe: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach and list the assets the hooked build exposes.
    Discover {
        /// Keep only assets whose name contains this substring.
        #[arg(short, long)]
        filter: Option<String>,

        /// Write the descriptor list to a JSON file.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Discover, then decode matching assets into an output directory.
    Rip {
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    // Directives must name the actual crate targets; a bare "xrip"
    // prefix would match neither.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("xrip_core=info".parse()?)
                .add_directive("xrip_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match xrip_core::Config::load(&cli.config) {
        Ok(c) => {
            info!("Loaded config from {:?}", cli.config);
            c
        }
        Err(e) => {
            info!("No config ({e}), using defaults");
            xrip_core::Config::default()
        }
    };

    // Ctrl-C flips the cooperative cancel flag; sessions stop between
    // assets rather than mid-read.
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        handler_flag.store(true, Ordering::SeqCst);
    })?;

    match cli.command {
        Command::Discover { filter, json } => commands::discover::run(
            &cli.state_dir,
            &cli.exe,
            &config,
            filter.as_deref(),
            json.as_deref(),
            cancel,
        ),
        Command::Rip { output, filter } => commands::rip::run(
            &cli.state_dir,
            &cli.exe,
            config,
            &output,
            filter.as_deref(),
            cancel,
        ),
    }
}
