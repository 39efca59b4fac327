use chrono::{
  Datelike,
  NaiveDate
};
use tracing::{
  debug,
  info,
  trace
};

use crate::aggregate::aggregate_namedays;
use crate::contact::EventFact;
use crate::datetime::date_in_year;
use crate::event::{
  Anchor,
  AnnualEvent,
  EventKind
};
use crate::nameday::NamedayResolver;
use crate::order::sort_events;
use crate::settings::ListSettings;

/// Events produced by one contact.
/// Namedays are held back for
/// aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classified {
  pub direct:   Vec<AnnualEvent>,
  pub namedays: Vec<AnnualEvent>
}

/// Turns contacts into the sorted event
/// list for one rebuild.
#[derive(Debug)]
pub struct EventListBuilder<'a> {
  settings:         &'a ListSettings,
  resolver:         &'a NamedayResolver,
  anchor:           Anchor,
  anniversary_keys: Vec<String>,
  nameday_keys:     Vec<String>
}

impl<'a> EventListBuilder<'a> {
  #[must_use]
  pub fn new(
    settings: &'a ListSettings,
    resolver: &'a NamedayResolver,
    today: NaiveDate
  ) -> Self {
    let aliases = &settings.field_aliases;
    Self {
      settings,
      resolver,
      anchor: settings.anchor(today),
      anniversary_keys: aliases
        .candidates(&settings.anniversary_field),
      nameday_keys: aliases
        .candidates(&settings.nameday_field)
    }
  }

  pub fn classify(
    &self,
    fact: &EventFact
  ) -> Classified {
    let mut out = Classified::default();
    if !self.settings.filter.matches(fact) {
      trace!(contact = %fact.name, "excluded by filter");
      return out;
    }

    let name = fact.display_name(
      self.settings.show_nicknames
    );
    let event = |kind, source, year_known| {
      AnnualEvent::new(
        kind,
        name,
        self.anchor.occurrence(source, year_known)
      )
      .with_links(
        non_empty(fact.email.as_deref()),
        non_empty(fact.homepage.as_deref())
      )
    };

    if let Some(birthday) = fact.birthday {
      out.direct.push(event(
        EventKind::Birthday,
        birthday,
        true
      ));
    }

    if self.settings.show_anniversaries
      && let Some(date) =
        fact.date_field(&self.anniversary_keys)
    {
      out.direct.push(event(
        EventKind::Anniversary,
        date,
        true
      ));
    }

    if self.settings.show_namedays
      && let Some((date, origin)) =
        self.nameday_date(fact)
    {
      // Calendar lookups carry a
      // placeholder year.
      let (source, year_known) =
        match fact.birthday {
          | Some(birthday) => {
            (anchor_after(date, birthday), true)
          }
          | None => (
            date,
            origin == NamedayOrigin::Field
          )
        };
      out.namedays.push(event(
        EventKind::Nameday {
          aggregated: false
        },
        source,
        year_known
      ));
    }

    trace!(
      contact = %fact.name,
      direct = out.direct.len(),
      namedays = out.namedays.len(),
      "classified contact"
    );
    out
  }

  /// Filters, classifies, aggregates
  /// and sorts. Windowing is left to the
  /// caller.
  #[tracing::instrument(skip(self, facts), fields(contacts = facts.len()))]
  pub fn build(
    &self,
    facts: &[EventFact]
  ) -> Vec<AnnualEvent> {
    let mut events = Vec::new();
    let mut namedays = Vec::new();
    for fact in facts {
      let classified = self.classify(fact);
      events.extend(classified.direct);
      namedays.extend(classified.namedays);
    }
    debug!(
      direct = events.len(),
      namedays = namedays.len(),
      "collected events"
    );

    events.extend(aggregate_namedays(
      namedays,
      self.settings.nameday_mode,
      self.resolver
    ));
    sort_events(&mut events);

    info!(events = events.len(), "built event list");
    events
  }

  fn nameday_date(
    &self,
    fact: &EventFact
  ) -> Option<(NaiveDate, NamedayOrigin)> {
    let policy = self.settings.nameday_policy;
    let from_field = if policy.uses_field() {
      fact.date_field(&self.nameday_keys)
    } else {
      None
    };
    if let Some(date) = from_field {
      return Some((date, NamedayOrigin::Field));
    }
    if !policy.uses_given_name() {
      return None;
    }
    fact
      .given_name
      .as_deref()
      .map(str::trim)
      .and_then(|given| {
        self
          .resolver
          .nameday_by_given_name(given)
      })
      .map(|date| (date, NamedayOrigin::Calendar))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NamedayOrigin {
  Field,
  Calendar
}

/// Moves a nameday into the birth year,
/// or the year after when it would land
/// before the birthday.
fn anchor_after(
  nameday: NaiveDate,
  birthday: NaiveDate
) -> NaiveDate {
  let moved = date_in_year(
    birthday.year(),
    nameday.month(),
    nameday.day()
  );
  if moved < birthday {
    date_in_year(
      birthday.year() + 1,
      nameday.month(),
      nameday.day()
    )
  } else {
    moved
  }
}

fn non_empty(
  value: Option<&str>
) -> Option<String> {
  value
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(ToString::to_string)
}
