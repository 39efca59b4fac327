pub mod aggregate;
pub mod builder;
pub mod cli;
pub mod commands;
pub mod config;
pub mod contact;
pub mod datetime;
pub mod event;
pub mod filter;
pub mod nameday;
pub mod order;
pub mod render;
pub mod settings;
pub mod source;

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
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting datebook"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.datebookrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let settings =
    settings::ListSettings::from_config(
      &cfg
    )
    .context(
      "failed to read list settings"
    )?;

  let today = match cli.today.as_deref() {
    | Some(expr) => {
      datetime::parse_day_expr(
        expr,
        datetime::today(
          None,
          settings.timezone
        )
      )
      .context("invalid --today")?
    }
    | None => {
      datetime::today(
        None,
        settings.timezone
      )
    }
  };
  let anchor = settings.anchor(today);

  let resolver =
    match settings.calendar_dir.as_deref() {
      | Some(dir) => {
        nameday::NamedayResolver::from_calendar_dir(
          dir,
          settings.calendar.as_deref(),
          settings.date_format.clone(),
          anchor
        )
      }
      | None => nameday::NamedayResolver::new(
        None,
        settings.date_format.clone(),
        anchor
      )
    };

  let contacts_path =
    config::resolve_contacts_path(
      &cfg,
      cli.contacts.as_deref()
    )
    .context(
      "failed to resolve contact \
       file"
    )?;
  let contacts =
    source::FileContactSource::new(
      &contacts_path
    );

  let renderer =
    render::Renderer::new(
      &cfg, &settings
    )?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let session = commands::Session {
    cfg:      &cfg,
    settings: &settings,
    resolver: &resolver,
    contacts: &contacts,
    today
  };
  commands::dispatch(
    &session, &renderer, inv
  )?;

  info!("done");
  Ok(())
}
