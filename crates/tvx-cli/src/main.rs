//! 🚀 tvx-cli: the front door of tvx.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! Parses args, installs logging, loads config, and hands off to the library.
//! Like a bus driver: knows the route, doesn't build the bus. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use tvx::Mode;

/// 🚌 Transit ingestion: trips every few seconds, stations every month.
#[derive(Debug, Parser)]
#[command(name = "tvx", version, about)]
struct Cli {
    /// 📋 TOML config file, merged over TVX_* environment variables
    #[arg(short, long, env = "TVX_CONFIG")]
    config: Option<PathBuf>,

    /// 🧪 keep everything in memory: nothing is written to Postgres or Redis
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// ⏰ run both flows on their schedules until Ctrl-C / SIGTERM
    Run,
    /// 🚏 refresh the station roster once and exit
    Stations,
    /// 🚌 refresh live trips once and exit
    Trips,
}

impl From<&Command> for Mode {
    fn from(command: &Command) -> Self {
        match command {
            Command::Run => Mode::Schedule,
            Command::Stations => Mode::StationsOnce,
            Command::Trips => Mode::TripsOnce,
        }
    }
}

async fn start(cli: &Cli) -> Result<()> {
    // 🔒 check the file before figment quietly treats a typo as "no file"
    if let Some(path) = &cli.config {
        let exists = path.try_exists().with_context(|| {
            format!("💀 Couldn't check whether '{}' exists", path.display())
        })?;
        if !exists {
            anyhow::bail!(
                "💀 Configuration file '{}' does not exist. Relative paths are relative to the cwd, for better or worse.",
                path.display()
            );
        }
    }

    let app_config = tvx::app_config::load_config(cli.config.as_deref())
        .context("💀 Couldn't load the configuration")?;
    let app_config = if cli.dry_run {
        app_config.into_dry_run()
    } else {
        app_config
    };

    if let Some(report) = tvx::run(app_config, Mode::from(&cli.command)).await? {
        println!("{}", report.render_table());
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(err) = start(&cli).await {
        error!("💀 error: {}", err);
        // 🧅 peel the onion, one layer at a time
        let mut looks_like_connectivity = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("Connection refused")
                || cause_str.contains("connection refused")
                || cause_str.contains("timed out")
                || cause_str.contains("dns error")
            {
                looks_like_connectivity = true;
            }
        }

        if looks_like_connectivity {
            error!(
                "🔧 hint: a store isn't reachable. Check that Postgres and Redis are up \
                 (`docker compose ps`), or try again with --dry-run to keep everything in memory."
            );
        }

        std::process::exit(1);
    }
}
