use std::path::PathBuf;

use anyhow::{
  Context,
  anyhow
};
use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::debug;

use crate::config::Config;
use crate::datetime::{
  DateFormat,
  parse_timezone
};
use crate::event::Anchor;
use crate::filter::{
  ContactFilter,
  FilterKind
};
use crate::order::Window;

const FIELD_PLACEHOLDER: &str =
  "{field}";

/// Where a contact's nameday comes
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedayPolicy {
  DateField,
  GivenName,
  Both
}

impl NamedayPolicy {
  pub fn parse(
    token: &str
  ) -> Option<Self> {
    match token
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "field" | "datefield" => {
        Some(Self::DateField)
      }
      | "name" | "givenname" => {
        Some(Self::GivenName)
      }
      | "both" => Some(Self::Both),
      | _ => None
    }
  }

  #[must_use]
  pub fn uses_field(&self) -> bool {
    matches!(
      self,
      Self::DateField | Self::Both
    )
  }

  #[must_use]
  pub fn uses_given_name(
    &self
  ) -> bool {
    matches!(
      self,
      Self::GivenName | Self::Both
    )
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedayDisplayMode {
  Aggregate,
  Individual,
  AllCalendarNames
}

impl NamedayDisplayMode {
  pub fn parse(
    token: &str
  ) -> Option<Self> {
    match token
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "aggregate" | "aggregated" => {
        Some(Self::Aggregate)
      }
      | "individual" => {
        Some(Self::Individual)
      }
      | "all" | "allcalendarnames"
      | "calendar" => {
        Some(Self::AllCalendarNames)
      }
      | _ => None
    }
  }
}

/// Alternative keys under which
/// address-book backends store a
/// custom field. `{field}` is replaced
/// by the configured field name; the
/// bare name is always tried first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAliases {
  templates: Vec<String>
}

impl Default for FieldAliases {
  fn default() -> Self {
    Self::new([
      "KADDRESSBOOK-{field}",
      "Custom_KADDRESSBOOK-{field}"
    ])
  }
}

impl FieldAliases {
  pub fn new<I, S>(templates: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>
  {
    Self {
      templates: templates
        .into_iter()
        .map(Into::into)
        .collect()
    }
  }

  pub fn parse(raw: &str) -> Self {
    Self::new(
      raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
    )
  }

  /// Candidate keys for `field`, in
  /// lookup order, without duplicates.
  #[must_use]
  pub fn candidates(
    &self,
    field: &str
  ) -> Vec<String> {
    let mut out =
      vec![field.to_string()];
    for template in &self.templates {
      let key = template
        .replace(FIELD_PLACEHOLDER, field);
      if !out.contains(&key) {
        out.push(key);
      }
    }
    out
  }
}

/// Whether rows without any contact
/// behind them still get highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightPolicy {
  pub today_without_events: bool,
  pub soon_without_events:  bool,
  pub past_without_events:  bool
}

impl Default for HighlightPolicy {
  fn default() -> Self {
    Self {
      today_without_events: true,
      soon_without_events:  false,
      past_without_events:  true
    }
  }
}

/// Everything one rebuild of the event
/// list reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSettings {
  pub show_nicknames:      bool,
  pub show_namedays:       bool,
  pub show_anniversaries:  bool,
  pub nameday_policy:      NamedayPolicy,
  pub nameday_field:       String,
  pub anniversary_field:   String,
  pub nameday_mode:        NamedayDisplayMode,
  pub filter:              ContactFilter,
  pub event_threshold:     u32,
  pub past_threshold:      u32,
  pub highlight_threshold: u32,
  pub date_format:         DateFormat,
  pub field_aliases:       FieldAliases,
  pub calendar_dir:        Option<PathBuf>,
  pub calendar:            Option<String>,
  pub highlight:           HighlightPolicy,
  pub timezone:            Option<Tz>
}

impl Default for ListSettings {
  fn default() -> Self {
    Self {
      show_nicknames:      true,
      show_namedays:       true,
      show_anniversaries:  true,
      nameday_policy:      NamedayPolicy::Both,
      nameday_field:       "X-Nameday"
        .to_string(),
      anniversary_field:   "X-Anniversary"
        .to_string(),
      nameday_mode:
        NamedayDisplayMode::Aggregate,
      filter:              ContactFilter::Off,
      event_threshold:     30,
      past_threshold:      2,
      highlight_threshold: 2,
      date_format:         DateFormat::default(),
      field_aliases:       FieldAliases::default(),
      calendar_dir:        None,
      calendar:            None,
      highlight:           HighlightPolicy::default(),
      timezone:            None
    }
  }
}

impl ListSettings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let mut s = Self::default();

    if let Some(v) =
      cfg.get_bool("show.nicknames")?
    {
      s.show_nicknames = v;
    }
    if let Some(v) =
      cfg.get_bool("show.namedays")?
    {
      s.show_namedays = v;
    }
    if let Some(v) = cfg
      .get_bool("show.anniversaries")?
    {
      s.show_anniversaries = v;
    }

    if let Some(raw) =
      cfg.get("nameday.policy")
    {
      s.nameday_policy =
        NamedayPolicy::parse(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid nameday.policy: \
               {raw} (expected field, \
               name or both)"
            )
          })?;
    }
    if let Some(raw) =
      cfg.get("nameday.mode")
    {
      s.nameday_mode =
        NamedayDisplayMode::parse(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid nameday.mode: \
               {raw} (expected \
               aggregate, individual or \
               all)"
            )
          })?;
    }
    if let Some(raw) =
      cfg.get("nameday.field")
    {
      s.nameday_field = raw;
    }
    if let Some(raw) =
      cfg.get("anniversary.field")
    {
      s.anniversary_field = raw;
    }
    if let Some(raw) =
      cfg.get("field.aliases")
    {
      s.field_aliases =
        FieldAliases::parse(&raw);
    }

    let filter_kind = match cfg
      .get("filter.type")
    {
      | Some(raw) => {
        FilterKind::parse(&raw)
          .ok_or_else(|| {
            anyhow!(
              "invalid filter.type: \
               {raw} (expected off, \
               category, field or \
               prefix)"
            )
          })?
      }
      | None => FilterKind::Off
    };
    s.filter = ContactFilter::new(
      filter_kind,
      cfg
        .get("filter.field")
        .unwrap_or_default()
        .as_str(),
      cfg
        .get("filter.value")
        .unwrap_or_default()
        .as_str()
    );

    if let Some(v) =
      cfg.get_u32("threshold.event")?
    {
      s.event_threshold = v;
    }
    if let Some(v) =
      cfg.get_u32("threshold.past")?
    {
      s.past_threshold = v;
    }
    if let Some(v) = cfg
      .get_u32("threshold.highlight")?
    {
      s.highlight_threshold = v;
    }

    if let Some(raw) =
      cfg.get("date.format")
    {
      s.date_format =
        DateFormat::from_setting(&raw)?;
    }

    s.calendar_dir =
      cfg.get_path("nameday.calendars");
    s.calendar = cfg
      .get("nameday.calendar")
      .map(|c| c.trim().to_string())
      .filter(|c| !c.is_empty());

    if let Some(v) = cfg.get_bool(
      "highlight.today.noevents"
    )? {
      s.highlight.today_without_events =
        v;
    }
    if let Some(v) = cfg.get_bool(
      "highlight.soon.noevents"
    )? {
      s.highlight.soon_without_events = v;
    }
    if let Some(v) = cfg.get_bool(
      "highlight.past.noevents"
    )? {
      s.highlight.past_without_events = v;
    }

    if let Some(raw) = cfg
      .get("timezone")
      .filter(|tz| !tz.trim().is_empty())
    {
      s.timezone = Some(
        parse_timezone(&raw)
          .context("invalid timezone")?
      );
    }

    debug!(settings = ?s, "resolved list settings");
    Ok(s)
  }

  #[must_use]
  pub fn anchor(
    &self,
    today: NaiveDate
  ) -> Anchor {
    Anchor::new(
      today,
      self.past_threshold
    )
  }

  #[must_use]
  pub fn window(&self) -> Window {
    Window {
      event_threshold: self
        .event_threshold,
      past_threshold:  self
        .past_threshold
    }
  }
}
