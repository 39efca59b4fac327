use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::debug;

use crate::datetime::shift_days;
use crate::event::{
  AnnualEvent,
  Occurrence
};
use crate::nameday::NamedayResolver;
use crate::settings::NamedayDisplayMode;

/// Days covered when every calendar
/// day gets a row.
const CALENDAR_SPAN_DAYS: i64 = 365;

struct DayGroup {
  label:      String,
  occurrence: Occurrence,
  entries:    Vec<AnnualEvent>
}

impl DayGroup {
  fn new(
    resolver: &NamedayResolver,
    occurrence: Occurrence
  ) -> Self {
    Self {
      label: resolver
        .name_for_day(occurrence.current),
      occurrence,
      entries: vec![]
    }
  }

  fn into_event(self) -> AnnualEvent {
    AnnualEvent::aggregate(
      self.label,
      self.occurrence,
      self.entries
    )
  }
}

/// Groups namedays falling on the same
/// calendar day into one row. The year
/// never takes part in the grouping.
///
/// `Individual` returns the entries
/// untouched. `AllCalendarNames` also
/// emits empty rows for every day of
/// the window starting at
/// `today - past_threshold`.
#[tracing::instrument(skip(
  entries, resolver
), fields(entries = entries.len()))]
pub fn aggregate_namedays(
  mut entries: Vec<AnnualEvent>,
  mode: NamedayDisplayMode,
  resolver: &NamedayResolver
) -> Vec<AnnualEvent> {
  if mode == NamedayDisplayMode::Individual
  {
    return entries;
  }

  entries.sort_by(AnnualEvent::cmp_display);

  let mut groups: BTreeMap<
    (u32, u32),
    DayGroup
  > = BTreeMap::new();

  if mode
    == NamedayDisplayMode::AllCalendarNames
  {
    let start = resolver.window_start();
    let anchor = resolver.anchor();
    for offset in 0..CALENDAR_SPAN_DAYS {
      let date = shift_days(start, offset);
      groups
        .entry((date.month(), date.day()))
        .or_insert_with(|| {
          DayGroup::new(
            resolver,
            anchor.occurrence(date, false)
          )
        });
    }
  }

  for entry in entries {
    let current = entry.current();
    groups
      .entry((current.month(), current.day()))
      .or_insert_with(|| {
        DayGroup::new(
          resolver,
          entry.occurrence
        )
      })
      .entries
      .push(entry);
  }

  debug!(
    days = groups.len(),
    ?mode,
    "aggregated namedays"
  );
  groups
    .into_values()
    .map(DayGroup::into_event)
    .collect()
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::aggregate_namedays;
  use crate::datetime::DateFormat;
  use crate::event::{
    Anchor,
    AnnualEvent,
    EventKind
  };
  use crate::nameday::{
    NamedayResolver,
    NamedayTable
  };
  use crate::settings::NamedayDisplayMode;

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn resolver(
    anchor: Anchor
  ) -> NamedayResolver {
    NamedayResolver::new(
      Some(
        NamedayTable::parse(
          "Slovensky\n06-24 Ján\n07-12 Mária, Nina\n"
        )
        .expect("table"),
      ),
      DateFormat::new("MM-dd"),
      anchor
    )
  }

  fn nameday(
    anchor: Anchor,
    name: &str,
    source: NaiveDate,
    year_known: bool
  ) -> AnnualEvent {
    AnnualEvent::new(
      EventKind::Nameday {
        aggregated: false
      },
      name,
      anchor.occurrence(source, year_known)
    )
  }

  #[test]
  fn same_day_namedays_share_one_row() {
    let anchor =
      Anchor::new(day(2024, 6, 1), 2);
    let entries = vec![
      nameday(
        anchor,
        "Jan Novak",
        day(1980, 6, 24),
        true
      ),
      nameday(
        anchor,
        "Janko",
        day(2025, 6, 24),
        false
      ),
      nameday(
        anchor,
        "Nina",
        day(2025, 7, 12),
        false
      ),
    ];

    let out = aggregate_namedays(
      entries,
      NamedayDisplayMode::Aggregate,
      &resolver(anchor)
    );

    assert_eq!(out.len(), 2);
    let june = &out[0];
    assert_eq!(june.name, "Ján");
    assert_eq!(june.current(), day(2024, 6, 24));
    assert_eq!(june.age(), None);
    let names: Vec<_> = june
      .constituents()
      .iter()
      .map(|e| e.name.as_str())
      .collect();
    assert_eq!(names, ["Janko", "Jan Novak"]);
    assert!(
      june
        .constituents()
        .iter()
        .all(AnnualEvent::is_aggregated)
    );
    assert_eq!(out[1].name, "Mária, Nina");
  }

  #[test]
  fn individual_mode_passes_through() {
    let anchor =
      Anchor::new(day(2024, 6, 1), 2);
    let entries = vec![nameday(
      anchor,
      "Jan Novak",
      day(1980, 6, 24),
      true
    )];

    let out = aggregate_namedays(
      entries.clone(),
      NamedayDisplayMode::Individual,
      &resolver(anchor)
    );

    assert_eq!(out, entries);
    assert!(!out[0].is_aggregated());
  }

  #[test]
  fn calendar_mode_fills_every_day() {
    let anchor =
      Anchor::new(day(2024, 6, 1), 2);
    let entries = vec![nameday(
      anchor,
      "Jan Novak",
      day(1980, 6, 24),
      true
    )];

    let out = aggregate_namedays(
      entries,
      NamedayDisplayMode::AllCalendarNames,
      &resolver(anchor)
    );

    assert_eq!(out.len(), 365);
    let populated: Vec<_> = out
      .iter()
      .filter(|e| e.has_event())
      .collect();
    assert_eq!(populated.len(), 1);
    assert_eq!(populated[0].name, "Ján");

    let empty = out
      .iter()
      .find(|e| e.current() == day(2024, 7, 12))
      .expect("july 12 row");
    assert!(!empty.has_event());
    assert_eq!(empty.name, "Mária, Nina");

    let unnamed = out
      .iter()
      .find(|e| e.current() == day(2024, 8, 1))
      .expect("aug 1 row");
    assert_eq!(unnamed.name, "08-01");
  }

  #[test]
  fn grouping_ignores_source_year() {
    let anchor =
      Anchor::new(day(2024, 12, 30), 2);
    let entries: Vec<_> = [1950, 1999, 2025]
      .into_iter()
      .map(|year| {
        nameday(
          anchor,
          &format!("born {year}"),
          day(year, 1, 3),
          year < 2025
        )
      })
      .collect();

    let out = aggregate_namedays(
      entries,
      NamedayDisplayMode::Aggregate,
      &resolver(anchor)
    );

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].constituents().len(), 3);
    assert_eq!(out[0].current(), day(2025, 1, 3));
  }
}
