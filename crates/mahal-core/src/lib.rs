pub mod aggregate;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod grid;
pub mod hijri;
pub mod loader;
pub mod observances;
pub mod remote;
pub mod render;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use aggregate::{
  AnnotationSource,
  EventAnnotation,
  ImportantDateAggregator,
  MonthAnnotations
};
pub use error::{
  InvalidDateError,
  RemoteFetchError
};
pub use grid::{
  CalendarViewState,
  Direction,
  MonthGrid,
  MonthGridBuilder
};
pub use hijri::{
  GregorianDate,
  HijriDate,
  Locale
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting mahal"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli.locale.as_deref(),
    cli.offline
  );
  debug!(
    locale = cfg.locale().tag(),
    remote = cfg.remote.enabled,
    files = ?cfg.loaded_files,
    "effective config"
  );

  let renderer =
    render::Renderer::from_config(&cfg)?;
  let command = cli.command();

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  runtime.block_on(commands::dispatch(
    &cfg, &renderer, command
  ))?;

  info!("done");
  Ok(())
}
