pub mod auth;
pub mod cancel;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod controller;
pub mod criteria;
pub mod datetime;
pub mod error;
pub mod render;
pub mod selection;
pub mod sort;
pub mod source;
pub mod status_filter;
pub mod task;
pub mod validation;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
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
    "starting tasklab"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .iter()
      .map(|kv| {
        (kv.key.clone(), kv.value.clone())
      })
  );
  debug!(files = ?cfg.loaded_files, "configuration loaded");

  let settings =
    config::Settings::from_config(&cfg)
      .context(
        "invalid configuration"
      )?;

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(commands::dispatch(
    cli, &cfg, &settings
  ))?;

  info!("done");
  Ok(())
}
