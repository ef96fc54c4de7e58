mod circle;
mod config;
mod db;
mod error;
mod logging;
mod server;
mod sync;

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::circle::CircleClient;
use crate::db::{Ledger, Store};
use crate::sync::{RefreshOutcome, Refresher};

#[derive(Parser, Debug)]
#[command(name = "shortcuts")]
#[command(about = "Caches CircleCI artifacts and links pull requests to their coverage reports")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./shortcuts.yaml or $XDG_CONFIG_HOME/shortcuts/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// SQLite database path
  #[arg(short, long)]
  database: Option<PathBuf>,

  /// Address to serve HTTP on
  #[arg(short, long)]
  listen: Option<SocketAddr>,

  /// Allow walking the provider's full retention window when the ledger is empty
  #[arg(long)]
  bootstrap: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line wins over the config file
  if let Some(database) = args.database {
    config.database = Some(database);
  }
  if let Some(listen) = args.listen {
    config.listen = listen;
  }

  let _log_guard = logging::init(config.log_file.as_deref())?;

  let db_path = config.database_path()?;
  info!(path = %db_path.display(), "Opening build ledger");
  let store = Arc::new(Store::open(&db_path)?);
  let client = Arc::new(CircleClient::new(&config.circleci)?);

  // Bootstrap, if any, happens here and never in the refresher loop
  let refresher = Refresher::new(client.clone(), store.clone(), &config.sync);
  match refresher
    .refresh(args.bootstrap)
    .await
    .wrap_err("Failed to bring the build ledger up to date")?
  {
    RefreshOutcome::Bootstrapped { ingested } => info!(ingested, "Build ledger bootstrapped"),
    RefreshOutcome::Refreshed { after, ingested } => {
      info!(after, ingested, "Build ledger refreshed")
    }
  }

  let pending = store.unarchived_builds()?.len();
  info!(pending, "Builds awaiting artifact archival");

  let (wake_tx, wake_rx) = sync::archive_signal();
  tokio::spawn(sync::run_archiver(client.clone(), store.clone(), wake_rx));
  tokio::spawn(sync::run_refresher(
    refresher,
    config.sync.refresh_interval(),
    wake_tx,
  ));

  let app = server::router(server::AppState::new(&config, store, client));
  let listener = tokio::net::TcpListener::bind(config.listen)
    .await
    .wrap_err_with(|| format!("Failed to bind {}", config.listen))?;
  info!(addr = %config.listen, "Serving coverage links");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  Ok(())
}

async fn shutdown_signal() {
  if tokio::signal::ctrl_c().await.is_ok() {
    info!("Shutting down");
  }
}
