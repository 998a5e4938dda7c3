mod api;
mod app;
mod cache;
mod commands;
mod config;
mod context;
mod event;
mod mutation;
mod query;
mod session;
mod ui;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "conflux")]
#[command(about = "A terminal client for Conflux research-project administration")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./conflux.yaml, then $XDG_CONFIG_HOME/conflux/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Open this project directly
  #[arg(short, long)]
  project: Option<String>,

  /// Directory for log files (default: the data directory)
  #[arg(long)]
  log_dir: Option<PathBuf>,
}

/// Log to a daily file; the terminal belongs to the UI.
fn init_logging(dir: &std::path::Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, "conflux.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::registry()
    .with(
      EnvFilter::try_from_env("CONFLUX_LOG").unwrap_or_else(|_| EnvFilter::new("conflux=info")),
    )
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false),
    )
    .init();

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let data_dir = config::Config::data_dir()?;
  let _log_guard = init_logging(args.log_dir.as_deref().unwrap_or(&data_dir))?;

  let config = config::Config::load(args.config.as_deref())?;
  tracing::info!(base_url = %config.api.base_url, "starting");

  let client: Arc<dyn api::ApiClient> = Arc::new(api::HttpApiClient::new(&config)?);
  let sessions = session::SessionStore::new(&data_dir, config.session.ttl_minutes);
  let ctx = context::AppContext::init(client, sessions, config).await;

  let mut app = app::App::new(ctx, args.project);
  app.run().await?;

  Ok(())
}
