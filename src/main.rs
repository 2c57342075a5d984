mod app;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use studyhub::config::Config;
use studyhub::logging;

#[derive(Parser, Debug)]
#[command(name = "studyhub")]
#[command(about = "Browse and manage a study-group social network from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/studyhub/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Keep the session and request cache in memory only
  #[arg(long)]
  no_persist: bool,

  #[command(subcommand)]
  command: app::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Hold the guard so buffered log lines are flushed on exit
  let _log_guard = logging::init()?;

  let config = Config::load(args.config.as_deref())?;

  let mut app = app::App::new(config, !args.no_persist)?;
  app.run(args.command).await?;

  Ok(())
}
