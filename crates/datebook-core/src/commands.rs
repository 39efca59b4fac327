use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use crate::builder::EventListBuilder;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::parse_day_expr;
use crate::event::AnnualEvent;
use crate::nameday::{NamedayResolver, available_calendars};
use crate::order::visible;
use crate::render::Renderer;
use crate::settings::ListSettings;
use crate::source::ContactSource;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list",
        "all",
        "info",
        "nameday",
        "calendars",
        "export",
        "_commands",
        "_show",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Everything a command needs for one run, resolved once at startup.
pub struct Session<'a> {
    pub cfg: &'a Config,
    pub settings: &'a ListSettings,
    pub resolver: &'a NamedayResolver,
    pub contacts: &'a dyn ContactSource,
    pub today: NaiveDate,
}

impl Session<'_> {
    /// Rebuilds the full, sorted event list from the contact source.
    pub fn events(&self) -> anyhow::Result<Vec<AnnualEvent>> {
        let facts = self.contacts.contacts()?;
        Ok(EventListBuilder::new(self.settings, self.resolver, self.today).build(&facts))
    }
}

#[instrument(skip(session, renderer, inv))]
pub fn dispatch(session: &Session<'_>, renderer: &Renderer, inv: Invocation) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, today = %session.today, "dispatching command");

    match command {
        "list" => cmd_list(session, renderer),
        "all" => cmd_all(session, renderer),
        "info" => cmd_info(session, renderer, &inv.command_args),
        "nameday" => cmd_nameday(session, &inv.command_args),
        "calendars" => cmd_calendars(session),
        "export" => cmd_export(session),
        "_commands" => cmd_commands(),
        "_show" => cmd_show(session.cfg),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(session, renderer))]
fn cmd_list(session: &Session<'_>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command list");
    let events = session.events()?;
    let shown: Vec<&AnnualEvent> = visible(&events, session.settings.window()).collect();

    if shown.is_empty() {
        println!(
            "No events in the next {} days.",
            session.settings.event_threshold
        );
        return Ok(());
    }
    renderer.print_event_table(&shown)
}

#[instrument(skip(session, renderer))]
fn cmd_all(session: &Session<'_>, renderer: &Renderer) -> anyhow::Result<()> {
    info!("command all");
    let events = session.events()?;
    let shown: Vec<&AnnualEvent> = events.iter().collect();
    renderer.print_event_table(&shown)
}

#[instrument(skip(session, renderer, args))]
fn cmd_info(session: &Session<'_>, renderer: &Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command info");
    let needle = args.join(" ");
    if needle.trim().is_empty() {
        return Err(anyhow!("info needs a name to look for"));
    }

    let events = session.events()?;
    let found = matching_events(&events, &needle);
    if found.is_empty() {
        return Err(anyhow!("no events match: {needle}"));
    }

    for (idx, event) in found.into_iter().enumerate() {
        if idx > 0 {
            println!();
        }
        renderer.print_event_info(event)?;
    }
    Ok(())
}

/// Events whose name, or any aggregated entry's name, contains `needle`
/// ignoring case.
pub fn matching_events<'a>(events: &'a [AnnualEvent], needle: &str) -> Vec<&'a AnnualEvent> {
    let needle = needle.trim().to_lowercase();
    let hit = |name: &str| name.to_lowercase().contains(&needle);
    events
        .iter()
        .filter(|event| hit(&event.name) || event.constituents().iter().any(|c| hit(&c.name)))
        .collect()
}

#[instrument(skip(session, args))]
fn cmd_nameday(session: &Session<'_>, args: &[String]) -> anyhow::Result<()> {
    info!("command nameday");
    println!("{}", describe_nameday(session.resolver, session.today, args)?);
    Ok(())
}

/// Names for a day expression (today when empty), or the day a given name
/// is celebrated.
pub fn describe_nameday(
    resolver: &NamedayResolver,
    today: NaiveDate,
    args: &[String],
) -> anyhow::Result<String> {
    let query = args.join(" ");
    let query = query.trim();
    let format = resolver.date_format();

    if query.is_empty() {
        return Ok(format!(
            "{}: {}",
            format.format(today),
            resolver.name_for_day(today)
        ));
    }

    // Names win over weekday words such as "Sun".
    if let Some(date) = resolver.nameday_by_given_name(query) {
        return Ok(format!("{query}: {}", format.format(date)));
    }

    if let Ok(date) = parse_day_expr(query, today) {
        return Ok(format!(
            "{}: {}",
            format.format(date),
            resolver.name_for_day(date)
        ));
    }

    if resolver.table().is_none() {
        return Err(anyhow!(
            "no nameday calendar loaded; set nameday.calendar to look up {query}"
        ));
    }
    Err(anyhow!("no nameday found for {query}"))
}

#[instrument(skip(session))]
fn cmd_calendars(session: &Session<'_>) -> anyhow::Result<()> {
    info!("command calendars");
    let Some(dir) = session.settings.calendar_dir.as_deref() else {
        return Err(anyhow!("nameday.calendars is not set"));
    };

    let active = session.settings.calendar.as_deref();
    for calendar in available_calendars(dir)? {
        let marker = if Some(calendar.code.as_str()) == active {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<6} {}", calendar.code, calendar.language);
    }
    Ok(())
}

#[instrument(skip(session))]
fn cmd_export(session: &Session<'_>) -> anyhow::Result<()> {
    info!("command export");
    let events = session.events()?;
    let shown: Vec<&AnnualEvent> = visible(&events, session.settings.window()).collect();
    let out = serde_json::to_string_pretty(&shown)?;
    println!("{out}");
    Ok(())
}

fn cmd_commands() -> anyhow::Result<()> {
    for command in known_command_names() {
        println!("{command}");
    }
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "Commands: list (default), all, info <name>, nameday [day|given name], calendars, export, _show, _commands, help, version"
    );
    Ok(())
}
