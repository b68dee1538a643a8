mod commands;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

use propcat::api::{Catalogue, HttpTransport};
use propcat::config::Config;
use propcat::query::QueryClient;
use propcat::session::{AuthContext, Session};

#[derive(Parser, Debug)]
#[command(name = "propcat")]
#[command(about = "Query and edit a personal property catalogue from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/propcat/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long)]
  api_url: Option<String>,

  #[command(subcommand)]
  command: commands::Command,
}

/// Log to a daily file under the data directory, filtered by PROPCAT_LOG.
///
/// Stdout carries the command output, so nothing is logged there.
fn init_logging() -> Option<WorkerGuard> {
  let dir = dirs::data_dir()?.join("propcat");
  let appender = RollingFileAppender::builder()
    .rotation(Rotation::DAILY)
    .filename_prefix("propcat")
    .filename_suffix("log")
    .build(dir)
    .ok()?;
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter =
    EnvFilter::try_from_env("PROPCAT_LOG").unwrap_or_else(|_| EnvFilter::new("propcat=info"));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .ok()?;
  Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_logging();

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref(), args.api_url.as_deref())?;
  let token = Config::get_api_token()?;

  let session = Session::default();
  let transport = HttpTransport::new(&config.api.url, session.clone(), config.api.timeout())?;
  let client = QueryClient::with_session(config.cache.options(), session);
  client.set_auth(AuthContext::authenticated(token));
  info!(api = %transport.base_url(), "session started");

  let catalogue = Catalogue::new(client, Arc::new(transport));
  commands::run(args.command, &catalogue).await
}
