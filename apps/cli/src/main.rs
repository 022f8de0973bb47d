//! bootdev CLI - resolve and enumerate boot devices from the command line.
//!
//! Disks come from `lsblk` (or a saved copy of its JSON output), so the
//! same names and partition numbering a boot environment would use can be
//! inspected on a running system.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// bootdev CLI tool.
#[derive(Parser)]
#[command(name = "bootdev")]
#[command(about = "Resolve and enumerate boot devices", long_about = None)]
struct Cli {
    /// Read disks from saved `lsblk --json --bytes` output instead of running lsblk.
    #[arg(long, global = true, value_name = "FILE")]
    lsblk_json: Option<PathBuf>,

    /// Load manager settings from a JSON file.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Set an environment variable, e.g. `--env root=sda,gpt2`.
    #[arg(long = "env", global = true, value_name = "KEY=VALUE", value_parser = parse_env_var)]
    env: Vec<(String, String)>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every disk, followed by the partitions found on it.
    List {
        /// Skip this disk, as if it were the device being resolved.
        #[arg(long, value_name = "NAME")]
        skip: Option<String>,

        /// Stop once this name has been listed.
        #[arg(long, value_name = "NAME")]
        stop_at: Option<String>,
    },

    /// Open a device and describe it.
    ///
    /// Without a name, the device in the `root` variable is opened.
    Open {
        /// Device name, e.g. `sda` or `sda,gpt2`.
        name: Option<String>,

        /// Print the description as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn parse_env_var(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = commands::Options {
        lsblk_json: cli.lsblk_json,
        config: cli.config,
        env: cli.env,
    };

    let result = match cli.command {
        Commands::List { skip, stop_at } => {
            commands::list(&options, skip.as_deref(), stop_at.as_deref())
        }
        Commands::Open { name, json } => commands::open(&options, name.as_deref(), json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}
