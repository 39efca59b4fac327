use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  Days,
  Local,
  NaiveDate,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const DEFAULT_DATE_FORMAT: &str =
  "ddd M/d";

/// Display patterns offered by index
/// in `date.format`.
pub const DATE_FORMAT_PRESETS: [&str;
  10] = [
  "d. M.", "dd. MM.", "d-M", "dd-MM",
  "M-d", "MM-dd", "d/M", "dd/MM", "M/d",
  "MM/dd"
];

/// The current calendar day, unless
/// the caller pins one. `timezone`
/// decides where the day is counted;
/// `None` means the system local zone.
#[must_use]
pub fn today(
  pinned: Option<NaiveDate>,
  timezone: Option<Tz>
) -> NaiveDate {
  if let Some(day) = pinned {
    return day;
  }
  match timezone {
    | Some(tz) => {
      Utc::now()
        .with_timezone(&tz)
        .date_naive()
    }
    | None => Local::now().date_naive()
  }
}

/// IANA zone name such as
/// `Europe/Bratislava`.
pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  trimmed.parse::<Tz>().map_err(|e| {
    anyhow!(
      "invalid timezone {trimmed}: {e}"
    )
  })
}

/// Moves a month/day into `year`.
/// Feb 29 lands on Feb 28 when `year`
/// is not a leap year.
#[must_use]
pub fn date_in_year(
  year: i32,
  month: u32,
  day: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .or_else(|| {
    NaiveDate::from_ymd_opt(
      year,
      month,
      day.saturating_sub(1)
    )
  })
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn with_year(
  date: NaiveDate,
  year: i32
) -> NaiveDate {
  date_in_year(
    year,
    date.month(),
    date.day()
  )
}

#[must_use]
pub fn days_in_year(
  date: NaiveDate
) -> i64 {
  if date.leap_year() {
    366
  } else {
    365
  }
}

#[must_use]
pub fn days_between(
  from: NaiveDate,
  to: NaiveDate
) -> i64 {
  to.signed_duration_since(from)
    .num_days()
}

#[must_use]
pub fn shift_days(
  date: NaiveDate,
  delta: i64
) -> NaiveDate {
  let magnitude = Days::new(
    delta.unsigned_abs()
  );
  let shifted = if delta >= 0 {
    date.checked_add_days(magnitude)
  } else {
    date.checked_sub_days(magnitude)
  };
  shifted.unwrap_or(date)
}

/// `MM-DD` key used by nameday
/// calendars.
#[must_use]
pub fn month_day_key(
  date: NaiveDate
) -> String {
  format!(
    "{:02}-{:02}",
    date.month(),
    date.day()
  )
}

#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(shift_days(today, 1));
    }
    | "yesterday" => {
      return Ok(shift_days(today, -1));
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)d$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");
    return Ok(shift_days(
      today,
      if negative { -num } else { num }
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Some((month, day)) =
    parse_month_day(token)
  {
    return NaiveDate::from_ymd_opt(
      today.year(),
      month,
      day
    )
    .ok_or_else(|| {
      anyhow!(
        "{token} is not a day of {}",
        today.year()
      )
    });
  }

  Err(anyhow!(
    "unrecognized day expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, weekday \
     names (e.g. monday), +Nd/-Nd, \
     YYYY-MM-DD, MM-DD"
  })
}

fn parse_month_day(
  token: &str
) -> Option<(u32, u32)> {
  let (month, day) =
    token.split_once('-')?;
  if month.len() != 2 || day.len() != 2
  {
    return None;
  }
  Some((
    month.parse().ok()?,
    day.parse().ok()?
  ))
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  shift_days(from, delta)
}

/// Display pattern in the `d`/`M`/`y`
/// letter-run notation, e.g.
/// `ddd M/d`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
  pattern:  String,
  strftime: String
}

impl Default for DateFormat {
  fn default() -> Self {
    Self::new(DEFAULT_DATE_FORMAT)
  }
}

impl DateFormat {
  #[must_use]
  pub fn new(pattern: &str) -> Self {
    Self {
      pattern:  pattern.to_string(),
      strftime: to_strftime(pattern)
    }
  }

  /// Accepts either a pattern or the
  /// index of a preset.
  pub fn from_setting(
    raw: &str
  ) -> anyhow::Result<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Ok(Self::default());
    }
    if trimmed
      .chars()
      .all(|c| c.is_ascii_digit())
    {
      let idx: usize = trimmed
        .parse()
        .context("invalid preset index")?;
      let preset = DATE_FORMAT_PRESETS
        .get(idx)
        .ok_or_else(|| {
          anyhow!(
            "date format preset {idx} \
             out of range (0-{})",
            DATE_FORMAT_PRESETS.len() - 1
          )
        })?;
      return Ok(Self::new(preset));
    }
    Ok(Self::new(trimmed))
  }

  #[must_use]
  pub fn pattern(&self) -> &str {
    &self.pattern
  }

  #[must_use]
  pub fn format(
    &self,
    date: NaiveDate
  ) -> String {
    date
      .format(&self.strftime)
      .to_string()
  }
}

fn to_strftime(pattern: &str) -> String {
  let chars: Vec<char> =
    pattern.chars().collect();
  let mut out = String::with_capacity(
    pattern.len() * 2
  );
  let mut idx = 0;

  while idx < chars.len() {
    let ch = chars[idx];

    if ch == '\'' {
      idx += 1;
      while idx < chars.len()
        && chars[idx] != '\''
      {
        push_literal(&mut out, chars[idx]);
        idx += 1;
      }
      idx += 1;
      continue;
    }

    let mut run = 1;
    while idx + run < chars.len()
      && chars[idx + run] == ch
    {
      run += 1;
    }

    match (ch, run) {
      | ('d', 1) => out.push_str("%-d"),
      | ('d', 2) => out.push_str("%d"),
      | ('d', 3) => out.push_str("%a"),
      | ('d', _) => out.push_str("%A"),
      | ('M', 1) => out.push_str("%-m"),
      | ('M', 2) => out.push_str("%m"),
      | ('M', 3) => out.push_str("%b"),
      | ('M', _) => out.push_str("%B"),
      | ('y', 2) => out.push_str("%y"),
      | ('y', n) if n >= 4 => {
        out.push_str("%Y")
      }
      | (other, n) => {
        for _ in 0..n {
          push_literal(&mut out, other);
        }
      }
    }
    idx += run;
  }

  out
}

fn push_literal(
  out: &mut String,
  ch: char
) {
  if ch == '%' {
    out.push_str("%%");
  } else {
    out.push(ch);
  }
}

/// Serde helpers for dates in contact
/// files. Anything unparsable becomes
/// `None` instead of failing the load.
pub mod lenient_date {
  use chrono::{
    DateTime,
    NaiveDate
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  #[must_use]
  pub fn parse(
    raw: &str
  ) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return None;
    }
    for fmt in ["%Y-%m-%d", "%Y%m%d"] {
      if let Ok(date) =
        NaiveDate::parse_from_str(
          trimmed, fmt
        )
      {
        return Some(date);
      }
    }
    DateTime::parse_from_rfc3339(
      trimmed
    )
    .ok()
    .map(|dt| dt.date_naive())
  }

  pub mod option {
    use super::*;

    pub fn serialize<S>(
      date: &Option<NaiveDate>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match date {
        | Some(value) => {
          serializer.serialize_str(
            &value
              .format("%Y-%m-%d")
              .to_string()
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<Option<NaiveDate>, D::Error>
    where
      D: Deserializer<'de>
    {
      let raw =
        Option::<String>::deserialize(
          deserializer
        )?;
      Ok(raw.and_then(|value| {
        let parsed = parse(&value);
        if parsed.is_none() {
          tracing::warn!(
            value = %value,
            "ignoring unparsable date"
          );
        }
        parsed
      }))
    }
  }

  pub mod map {
    use std::collections::BTreeMap;

    use super::*;

    pub fn serialize<S>(
      dates: &BTreeMap<String, NaiveDate>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      serializer.collect_map(
        dates.iter().map(|(k, v)| {
          (
            k,
            v.format("%Y-%m-%d")
              .to_string()
          )
        })
      )
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      BTreeMap<String, NaiveDate>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let raw =
        BTreeMap::<String, String>::deserialize(
          deserializer
        )?;
      let mut out = BTreeMap::new();
      for (key, value) in raw {
        match parse(&value) {
          | Some(date) => {
            out.insert(key, date);
          }
          | None => {
            tracing::warn!(
              field = %key,
              value = %value,
              "ignoring unparsable custom date"
            );
          }
        }
      }
      Ok(out)
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::{
    DateFormat,
    date_in_year,
    days_in_year,
    parse_day_expr,
    parse_timezone,
    today
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
  fn leap_day_clamps_to_feb_28() {
    assert_eq!(
      date_in_year(2023, 2, 29),
      day(2023, 2, 28)
    );
    assert_eq!(
      date_in_year(2024, 2, 29),
      day(2024, 2, 29)
    );
  }

  #[test]
  fn counts_days_in_year() {
    assert_eq!(
      days_in_year(day(2024, 7, 1)),
      366
    );
    assert_eq!(
      days_in_year(day(2025, 7, 1)),
      365
    );
  }

  #[test]
  fn parses_relative_and_named_days() {
    let today = day(2026, 2, 17);
    assert_eq!(
      parse_day_expr("tomorrow", today)
        .expect("tomorrow"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_day_expr("-3d", today)
        .expect("relative"),
      day(2026, 2, 14)
    );
    assert_eq!(
      parse_day_expr("wednesday", today)
        .expect("weekday"),
      day(2026, 2, 18)
    );
    assert_eq!(
      parse_day_expr("06-24", today)
        .expect("month-day"),
      day(2026, 6, 24)
    );
    assert!(
      parse_day_expr("soonish", today)
        .is_err()
    );
  }

  #[test]
  fn formats_qt_style_patterns() {
    let date = day(2024, 3, 5);
    assert_eq!(
      DateFormat::new("ddd M/d")
        .format(date),
      "Tue 3/5"
    );
    assert_eq!(
      DateFormat::new("dd. MM.")
        .format(date),
      "05. 03."
    );
    assert_eq!(
      DateFormat::new("yyyy-MM-dd")
        .format(date),
      "2024-03-05"
    );
    assert_eq!(
      DateFormat::new("d 'of' MMMM")
        .format(date),
      "5 of March"
    );
  }

  #[test]
  fn resolves_preset_index() {
    let fmt =
      DateFormat::from_setting("5")
        .expect("preset");
    assert_eq!(fmt.pattern(), "MM-dd");
    assert!(
      DateFormat::from_setting("42")
        .is_err()
    );
  }

  #[test]
  fn pinned_day_wins_and_zones_parse() {
    let pinned = day(2024, 3, 10);
    let tz = parse_timezone(
      " Europe/Bratislava "
    )
    .expect("zone");
    assert_eq!(
      today(Some(pinned), Some(tz)),
      pinned
    );
    assert!(
      parse_timezone("Mars/Olympus")
        .is_err()
    );
  }
}
