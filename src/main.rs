mod actions;
mod api;
mod app;
mod config;
mod grid;
mod host;
mod input;
mod model;
mod progression;
mod render;

use std::fs::File;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "farmstead")]
#[command(about = "Terminal farm client (server-authoritative)")]
struct Cli {
    /// Game server base URL
    #[arg(long)]
    server: Option<String>,

    /// Player id on the server
    #[arg(long)]
    player_id: Option<u64>,

    /// Seconds between automatic state refreshes
    #[arg(long)]
    refresh_secs: Option<u64>,

    /// Force monochrome (no colors)
    #[arg(long, default_value_t = false)]
    mono: bool,

    /// Enable the Ctrl-X debug XP key
    #[arg(long, default_value_t = false)]
    debug_xp: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = config::project_paths()?;
    let mut settings = config::load_settings(&paths.settings_path);

    // Logs go to a file; stdout belongs to the TUI.
    let log_file = File::create(&paths.log_path)
        .with_context(|| format!("cannot open log file {}", paths.log_path.display()))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(log_file)))
        .with(EnvFilter::from_default_env().add_directive("farmstead=info".parse()?))
        .init();

    if let Some(server) = cli.server {
        settings.server_url = server;
    }
    if let Some(id) = cli.player_id {
        settings.player_id = id;
    }
    if let Some(secs) = cli.refresh_secs {
        settings.refresh_secs = secs.max(1);
    }
    settings.mono |= cli.mono;
    config::save_settings_atomic(&paths.settings_path, &settings)?;

    let host = host::HostContext::detect();
    info!(
        server = %settings.server_url,
        player = settings.player_id,
        embedded = host.embedded,
        "starting"
    );

    app::run(app::RunConfig {
        settings,
        host,
        debug: cli.debug_xp,
    })
    .await
}
