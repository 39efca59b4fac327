use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  NaiveDate
};
use regex::Regex;
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  DateFormat,
  date_in_year,
  month_day_key,
  shift_days
};
use crate::event::Anchor;

const CALENDAR_FILE_PREFIX: &str =
  "namedays_";
const CALENDAR_FILE_SUFFIX: &str =
  ".txt";

/// Names celebrated on each calendar
/// day, keyed by `MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedayTable {
  pub language: String,
  names:        HashMap<String, String>
}

impl NamedayTable {
  /// First line is the language label;
  /// any later line holding an `NN-NN`
  /// token maps it to the rest of the
  /// line.
  pub fn parse(
    text: &str
  ) -> anyhow::Result<Self> {
    let date_re =
      Regex::new(r"[0-9]{2}-[0-9]{2}")
        .map_err(|e| {
          anyhow!(
            "internal regex compile \
             failure: {e}"
          )
        })?;

    let mut lines = text.lines();
    let language = lines
      .next()
      .map(|l| l.trim().to_string())
      .unwrap_or_default();

    let mut names = HashMap::new();
    let mut skipped = 0usize;
    for line in lines {
      match date_re.find(line) {
        | Some(found) => {
          names.insert(
            found.as_str().to_string(),
            line[found.end()..]
              .trim()
              .to_string()
          );
        }
        | None => skipped += 1
      }
    }

    debug!(
      language = %language,
      read = names.len(),
      skipped,
      "parsed nameday calendar"
    );
    Ok(Self {
      language,
      names
    })
  }

  #[tracing::instrument]
  pub fn load(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    Self::parse(&text).with_context(
      || {
        format!(
          "failed to parse {}",
          path.display()
        )
      }
    )
  }

  #[must_use]
  pub fn get(
    &self,
    key: &str
  ) -> Option<&str> {
    self
      .names
      .get(key)
      .map(String::as_str)
      .filter(|s| !s.is_empty())
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.names.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

/// A calendar file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarInfo {
  pub code:     String,
  pub language: String,
  pub path:     PathBuf
}

/// Lists `namedays_<code>.txt` files in
/// `dir`, sorted by code. Unreadable
/// files are skipped.
#[tracing::instrument]
pub fn available_calendars(
  dir: &Path
) -> anyhow::Result<Vec<CalendarInfo>> {
  if !dir.exists() {
    warn!(dir = %dir.display(), "nameday calendar directory does not exist");
    return Ok(vec![]);
  }

  let mut out = Vec::new();
  for entry in fs::read_dir(dir)
    .with_context(|| {
      format!(
        "failed to list {}",
        dir.display()
      )
    })?
  {
    let path = entry?.path();
    let Some(file_name) = path
      .file_name()
      .and_then(|n| n.to_str())
    else {
      continue;
    };
    let Some(code) = file_name
      .strip_prefix(
        CALENDAR_FILE_PREFIX
      )
      .and_then(|rest| {
        rest.strip_suffix(
          CALENDAR_FILE_SUFFIX
        )
      })
    else {
      continue;
    };

    let language =
      match fs::read_to_string(&path) {
        | Ok(text) => text
          .lines()
          .next()
          .unwrap_or_default()
          .trim()
          .to_string(),
        | Err(err) => {
          warn!(
            file = %path.display(),
            error = %err,
            "cannot read nameday calendar language"
          );
          continue;
        }
      };

    debug!(file = %path.display(), code, language = %language, "registering nameday calendar");
    out.push(CalendarInfo {
      code: code.to_string(),
      language,
      path: path.clone()
    });
  }

  out.sort_by(|a, b| a.code.cmp(&b.code));
  Ok(out)
}

#[must_use]
pub fn calendar_path(
  dir: &Path,
  code: &str
) -> PathBuf {
  dir.join(format!(
    "{CALENDAR_FILE_PREFIX}{code}{CALENDAR_FILE_SUFFIX}"
  ))
}

/// Labels calendar days and finds the
/// day a given name is celebrated.
#[derive(Debug, Clone)]
pub struct NamedayResolver {
  table:       Option<NamedayTable>,
  date_format: DateFormat,
  anchor:      Anchor
}

impl NamedayResolver {
  #[must_use]
  pub fn new(
    table: Option<NamedayTable>,
    date_format: DateFormat,
    anchor: Anchor
  ) -> Self {
    Self {
      table,
      date_format,
      anchor
    }
  }

  /// Loads the calendar for `code`
  /// from `dir`. A calendar that cannot
  /// be read leaves the resolver
  /// without names.
  #[tracing::instrument(skip(date_format, anchor))]
  pub fn from_calendar_dir(
    dir: &Path,
    code: Option<&str>,
    date_format: DateFormat,
    anchor: Anchor
  ) -> Self {
    let table = code
      .filter(|c| !c.trim().is_empty())
      .and_then(|code| {
        let path =
          calendar_path(dir, code.trim());
        match NamedayTable::load(&path) {
          | Ok(table) => {
            info!(
              file = %path.display(),
              language = %table.language,
              entries = table.len(),
              "loaded nameday calendar"
            );
            Some(table)
          }
          | Err(err) => {
            warn!(
              error = %format!("{err:#}"),
              "nameday calendar unavailable; falling back to dates"
            );
            None
          }
        }
      });
    Self::new(table, date_format, anchor)
  }

  #[must_use]
  pub fn table(
    &self
  ) -> Option<&NamedayTable> {
    self.table.as_ref()
  }

  #[must_use]
  pub fn date_format(
    &self
  ) -> &DateFormat {
    &self.date_format
  }

  #[must_use]
  pub fn anchor(&self) -> Anchor {
    self.anchor
  }

  /// Calendar names for `date`, or the
  /// formatted date when the day has
  /// none.
  #[must_use]
  pub fn name_for_day(
    &self,
    date: NaiveDate
  ) -> String {
    self
      .table
      .as_ref()
      .and_then(|t| {
        t.get(&month_day_key(date))
      })
      .map(ToString::to_string)
      .unwrap_or_else(|| {
        self.date_format.format(date)
      })
  }

  /// First day of the display window
  /// (`today - past_threshold`).
  #[must_use]
  pub fn window_start(
    &self
  ) -> NaiveDate {
    shift_days(
      self.anchor.today,
      -i64::from(
        self.anchor.past_threshold
      )
    )
  }

  /// Finds the day whose names contain
  /// `given_name` as a whole word and
  /// returns it one year later, so a
  /// contact's first nameday after
  /// birth can be anchored to it.
  #[must_use]
  pub fn nameday_by_given_name(
    &self,
    given_name: &str
  ) -> Option<NaiveDate> {
    if given_name.is_empty() {
      return None;
    }

    let start = self.window_start();
    (0..=365)
      .map(|offset| {
        shift_days(start, offset)
      })
      .find(|date| {
        name_tokens(
          &self.name_for_day(*date)
        )
        .any(|token| token == given_name)
      })
      .map(|date| {
        date_in_year(
          date.year() + 1,
          date.month(),
          date.day()
        )
      })
  }
}

/// Splits on runs of non-word
/// characters.
fn name_tokens(
  names: &str
) -> impl Iterator<Item = &str> {
  names
    .split(|c: char| {
      !(c.is_alphanumeric() || c == '_')
    })
    .filter(|t| !t.is_empty())
}
