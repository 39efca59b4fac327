use std::cmp::Ordering;

use chrono::{
  Datelike,
  NaiveDate
};
use serde::Serialize;

use crate::datetime::{
  days_between,
  days_in_year,
  with_year
};

/// Reference point for one rebuild:
/// the day treated as "today" and how
/// many days an event stays current
/// after it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
  pub today:          NaiveDate,
  pub past_threshold: u32
}

impl Anchor {
  #[must_use]
  pub fn new(
    today: NaiveDate,
    past_threshold: u32
  ) -> Self {
    Self {
      today,
      past_threshold
    }
  }

  #[must_use]
  pub fn occurrence(
    &self,
    source: NaiveDate,
    year_known: bool
  ) -> Occurrence {
    Occurrence::compute(
      source,
      year_known,
      self.today,
      self.past_threshold
    )
  }
}

/// Where a yearly date falls relative
/// to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
  pub source:         NaiveDate,
  pub current:        NaiveDate,
  pub remaining_days: i64,
  pub age:            Option<i32>
}

impl Occurrence {
  /// Picks this year's instance of
  /// `source`, moved one year forward
  /// once it is more than
  /// `past_threshold` days old, or one
  /// year back when it is further
  /// ahead than a year minus the
  /// threshold.
  #[must_use]
  pub fn compute(
    source: NaiveDate,
    year_known: bool,
    today: NaiveDate,
    past_threshold: u32
  ) -> Self {
    let past = i64::from(past_threshold);
    let year = today.year();

    let mut current =
      with_year(source, year);
    let delta =
      days_between(today, current);
    if delta < -past {
      current =
        with_year(source, year + 1);
    } else if delta
      > days_in_year(today) - past
    {
      current =
        with_year(source, year - 1);
    }

    let remaining_days =
      days_between(today, current);
    let age = year_known.then(|| {
      current.year() - source.year()
    });

    Self {
      source,
      current,
      remaining_days,
      age
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
  Birthday,
  Anniversary,
  Nameday {
    aggregated: bool
  },
  AggregatedNameday {
    entries: Vec<AnnualEvent>
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnualEvent {
  pub name:       String,
  #[serde(flatten)]
  pub occurrence: Occurrence,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email:      Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub homepage:   Option<String>,
  #[serde(flatten)]
  pub kind:       EventKind
}

/// Display order key: remaining days,
/// then age, then name. An unknown age
/// sorts before any known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey<'a> {
  pub remaining_days: i64,
  pub age:            Option<i32>,
  pub name:           &'a str
}

impl AnnualEvent {
  #[must_use]
  pub fn new(
    kind: EventKind,
    name: impl Into<String>,
    occurrence: Occurrence
  ) -> Self {
    Self {
      name: name.into(),
      occurrence,
      email: None,
      homepage: None,
      kind
    }
  }

  #[must_use]
  pub fn with_links(
    mut self,
    email: Option<String>,
    homepage: Option<String>
  ) -> Self {
    self.email = email;
    self.homepage = homepage;
    self
  }

  /// One row per calendar day holding
  /// every nameday that falls on it.
  /// Constituents are marked
  /// aggregated.
  #[must_use]
  pub fn aggregate(
    label: impl Into<String>,
    occurrence: Occurrence,
    mut entries: Vec<AnnualEvent>
  ) -> Self {
    for entry in &mut entries {
      if let EventKind::Nameday {
        aggregated
      } = &mut entry.kind
      {
        *aggregated = true;
      }
    }
    Self::new(
      EventKind::AggregatedNameday {
        entries
      },
      label,
      Occurrence {
        age: None,
        ..occurrence
      }
    )
  }

  #[must_use]
  pub fn remaining_days(&self) -> i64 {
    self.occurrence.remaining_days
  }

  #[must_use]
  pub fn age(&self) -> Option<i32> {
    self.occurrence.age
  }

  #[must_use]
  pub fn current(&self) -> NaiveDate {
    self.occurrence.current
  }

  /// False only for a calendar day
  /// nobody celebrates.
  #[must_use]
  pub fn has_event(&self) -> bool {
    match &self.kind {
      | EventKind::AggregatedNameday {
        entries
      } => !entries.is_empty(),
      | _ => true
    }
  }

  #[must_use]
  pub fn is_aggregated(&self) -> bool {
    matches!(
      self.kind,
      EventKind::Nameday {
        aggregated: true
      }
    )
  }

  #[must_use]
  pub fn constituents(
    &self
  ) -> &[AnnualEvent] {
    match &self.kind {
      | EventKind::AggregatedNameday {
        entries
      } => entries,
      | _ => &[]
    }
  }

  #[must_use]
  pub fn sort_key(&self) -> SortKey<'_> {
    SortKey {
      remaining_days: self
        .occurrence
        .remaining_days,
      age: self.occurrence.age,
      name: &self.name
    }
  }

  #[must_use]
  pub fn cmp_display(
    &self,
    other: &Self
  ) -> Ordering {
    self.sort_key().cmp(&other.sort_key())
  }
}

/// Human phrase for a signed day
/// offset.
#[must_use]
pub fn remaining_days_phrase(
  remaining_days: i64
) -> String {
  match remaining_days {
    | n if n < -2 => {
      plural_days(-n, "{} day ago", "{} days ago")
    }
    | -2 => "2 days ago".to_string(),
    | -1 => "yesterday".to_string(),
    | 0 => "today".to_string(),
    | 1 => "tomorrow".to_string(),
    | 2 => "in 2 days".to_string(),
    | n => {
      plural_days(n, "in {} day", "in {} days")
    }
  }
}

fn plural_days(
  count: i64,
  singular: &str,
  plural: &str
) -> String {
  let template = if count == 1 {
    singular
  } else {
    plural
  };
  template.replace("{}", &count.to_string())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    AnnualEvent,
    EventKind,
    Occurrence,
    remaining_days_phrase
  };

  fn day(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  #[test]
  fn upcoming_birthday_this_year() {
    let occ = Occurrence::compute(
      day(1990, 3, 15),
      true,
      day(2024, 3, 10),
      2
    );
    assert_eq!(occ.remaining_days, 5);
    assert_eq!(occ.age, Some(34));
  }

  #[test]
  fn recent_birthday_within_past_threshold()
  {
    let occ = Occurrence::compute(
      day(1990, 3, 15),
      true,
      day(2024, 3, 17),
      2
    );
    assert_eq!(occ.remaining_days, -2);
    assert_eq!(occ.age, Some(34));
    assert_eq!(
      occ.current,
      day(2024, 3, 15)
    );
  }

  #[test]
  fn old_birthday_rolls_to_next_year() {
    let occ = Occurrence::compute(
      day(1990, 3, 15),
      true,
      day(2024, 3, 18),
      2
    );
    assert_eq!(occ.remaining_days, 362);
    assert_eq!(occ.age, Some(35));
    assert_eq!(
      occ.current,
      day(2025, 3, 15)
    );
  }

  #[test]
  fn early_january_event_seen_from_late_december()
   {
    // Jan 1 is 365 days ahead in this
    // year's instance but only 1 day
    // past for last year's.
    let occ = Occurrence::compute(
      day(2000, 12, 31),
      true,
      day(2025, 1, 1),
      2
    );
    assert_eq!(occ.remaining_days, -1);
    assert_eq!(
      occ.current,
      day(2024, 12, 31)
    );
    assert_eq!(occ.age, Some(24));
  }

  #[test]
  fn unknown_year_has_no_age() {
    let occ = Occurrence::compute(
      day(2025, 6, 24),
      false,
      day(2024, 6, 1),
      2
    );
    assert_eq!(occ.age, None);
    assert_eq!(occ.remaining_days, 23);
  }

  #[test]
  fn leap_day_birthday_in_common_year() {
    let occ = Occurrence::compute(
      day(2000, 2, 29),
      true,
      day(2025, 2, 20),
      2
    );
    assert_eq!(
      occ.current,
      day(2025, 2, 28)
    );
    assert_eq!(occ.remaining_days, 8);
  }

  #[test]
  fn remaining_days_stay_within_a_year() {
    let source = day(1980, 1, 1);
    let mut today = day(2023, 1, 1);
    for _ in 0..800 {
      for past in [0, 2, 7, 30] {
        let occ = Occurrence::compute(
          source, true, today, past
        );
        let span =
          crate::datetime::days_in_year(
            today
          );
        assert!(
          occ.remaining_days > -span
            && occ.remaining_days < span,
          "{today} past={past}: {}",
          occ.remaining_days
        );
      }
      today = today
        .succ_opt()
        .expect("next day");
    }
  }

  #[test]
  fn phrases_cover_every_offset() {
    assert_eq!(
      remaining_days_phrase(-5),
      "5 days ago"
    );
    assert_eq!(
      remaining_days_phrase(-2),
      "2 days ago"
    );
    assert_eq!(
      remaining_days_phrase(-1),
      "yesterday"
    );
    assert_eq!(
      remaining_days_phrase(0),
      "today"
    );
    assert_eq!(
      remaining_days_phrase(1),
      "tomorrow"
    );
    assert_eq!(
      remaining_days_phrase(2),
      "in 2 days"
    );
    assert_eq!(
      remaining_days_phrase(40),
      "in 40 days"
    );
    for n in -365..366 {
      assert!(
        !remaining_days_phrase(n)
          .is_empty()
      );
    }
  }

  #[test]
  fn ordering_uses_days_then_age_then_name()
  {
    let today = day(2024, 5, 1);
    let occ = |y, m, d| {
      Occurrence::compute(
        day(y, m, d),
        true,
        today,
        2
      )
    };
    let older = AnnualEvent::new(
      EventKind::Anniversary,
      "Zed",
      occ(1970, 5, 3)
    );
    let younger = AnnualEvent::new(
      EventKind::Birthday,
      "Amy",
      occ(2001, 5, 3)
    );
    let sooner = AnnualEvent::new(
      EventKind::Birthday,
      "Bob",
      occ(2010, 5, 2)
    );

    let mut list =
      vec![older.clone(), younger.clone(), sooner.clone()];
    list.sort_by(AnnualEvent::cmp_display);
    let names: Vec<_> = list
      .iter()
      .map(|e| e.name.as_str())
      .collect();
    assert_eq!(
      names,
      ["Bob", "Amy", "Zed"]
    );
  }

  #[test]
  fn aggregate_marks_entries() {
    let today = day(2024, 6, 20);
    let occ = Occurrence::compute(
      day(2024, 6, 24),
      false,
      today,
      2
    );
    let empty = AnnualEvent::aggregate(
      "Jan",
      occ,
      vec![]
    );
    assert!(!empty.has_event());

    let entry = AnnualEvent::new(
      EventKind::Nameday {
        aggregated: false
      },
      "Jan Novak",
      occ
    );
    assert!(!entry.is_aggregated());
    let agg = AnnualEvent::aggregate(
      "Jan",
      occ,
      vec![entry]
    );

    assert!(agg.has_event());
    assert_eq!(agg.age(), None);
    assert!(
      agg.constituents()[0]
        .is_aggregated()
    );
  }
}
