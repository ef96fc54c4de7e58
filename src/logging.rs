use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber: stderr always, plus a daily rolling file
/// when `log_file` is set. `RUST_LOG` overrides the default `info` filter.
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the life of the process.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  let (file_layer, guard) = match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::daily(dir, name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      (
        Some(fmt::layer().with_ansi(false).with_writer(writer)),
        Some(guard),
      )
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
