use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::DateFormat;
use crate::event::{AnnualEvent, EventKind, remaining_days_phrase};
use crate::settings::{HighlightPolicy, ListSettings};

const CHILD_INDENT: &str = "  ";

/// Display cells for one event, plus sub-rows for an aggregated day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub age: String,
    pub date: String,
    pub when: String,
    pub email: String,
    pub homepage: String,
    pub children: Vec<Row>,
}

impl Row {
    pub fn from_event(event: &AnnualEvent, date_format: &DateFormat) -> Self {
        let age = event.age().map(|a| a.to_string()).unwrap_or_default();
        let (date, when) = if event.is_aggregated() {
            (String::new(), String::new())
        } else {
            (
                date_format.format(event.current()),
                remaining_days_phrase(event.remaining_days()),
            )
        };

        let name = match &event.kind {
            EventKind::AggregatedNameday { entries } if !entries.is_empty() => {
                format!("{} ({})", event.name, entries.len())
            }
            _ => event.name.clone(),
        };

        Self {
            name,
            age,
            date,
            when,
            email: event.email.clone().unwrap_or_default(),
            homepage: event.homepage.clone().unwrap_or_default(),
            children: event
                .constituents()
                .iter()
                .map(|child| Row::from_event(child, date_format))
                .collect(),
        }
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.age.clone(),
            self.date.clone(),
            self.when.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Today,
    Soon,
    Past,
}

impl Highlight {
    /// Colour class for a row. Rows nobody celebrates only get one when the
    /// policy asks for it.
    pub fn classify(event: &AnnualEvent, threshold: u32, policy: &HighlightPolicy) -> Option<Self> {
        let days = event.remaining_days();
        let (class, without_events) = if days == 0 {
            (Self::Today, policy.today_without_events)
        } else if days < 0 {
            (Self::Past, policy.past_without_events)
        } else if days <= i64::from(threshold) {
            (Self::Soon, policy.soon_without_events)
        } else {
            return None;
        };

        (event.has_event() || without_events).then_some(class)
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    today_code: String,
    soon_code: String,
    past_code: String,
    date_format: DateFormat,
    highlight_threshold: u32,
    highlight: HighlightPolicy,
}

impl Renderer {
    pub fn new(cfg: &Config, settings: &ListSettings) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        let code = |key: &str, default: &str| cfg.get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            color,
            today_code: code("color.today", "1;37;41"),
            soon_code: code("color.soon", "33"),
            past_code: code("color.past", "90"),
            date_format: settings.date_format.clone(),
            highlight_threshold: settings.highlight_threshold,
            highlight: settings.highlight,
        })
    }

    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub fn print_event_table(&self, events: &[&AnnualEvent]) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_event_table(out, events)
    }

    pub fn write_event_table<W: Write>(&self, writer: W, events: &[&AnnualEvent]) -> anyhow::Result<()> {
        let headers = vec![
            "Name".to_string(),
            "Age".to_string(),
            "Date".to_string(),
            "When".to_string(),
        ];

        let mut table = Vec::new();
        for event in events {
            let row = Row::from_event(event, &self.date_format);
            let class = Highlight::classify(event, self.highlight_threshold, &self.highlight);

            table.push(self.paint_row(row.cells(), class));
            for child in &row.children {
                let mut cells = child.cells();
                cells[0] = format!("{CHILD_INDENT}{}", cells[0]);
                table.push(self.paint_row(cells, class));
            }
        }

        write_table(writer, headers, table)
    }

    #[tracing::instrument(skip(self, event))]
    pub fn print_event_info(&self, event: &AnnualEvent) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_event_info(out, event)
    }

    pub fn write_event_info<W: Write>(&self, mut out: W, event: &AnnualEvent) -> anyhow::Result<()> {
        let row = Row::from_event(event, &self.date_format);

        writeln!(out, "name      {}", row.name)?;
        writeln!(out, "kind      {}", kind_label(&event.kind))?;
        writeln!(out, "date      {}", self.date_format.format(event.current()))?;
        writeln!(out, "when      {}", remaining_days_phrase(event.remaining_days()))?;
        writeln!(out, "source    {}", event.occurrence.source.format("%Y-%m-%d"))?;
        if !row.age.is_empty() {
            writeln!(out, "age       {}", row.age)?;
        }
        if !row.email.is_empty() {
            writeln!(out, "email     {}", row.email)?;
        }
        if !row.homepage.is_empty() {
            writeln!(out, "homepage  {}", row.homepage)?;
        }
        for child in &row.children {
            let age = if child.age.is_empty() {
                String::new()
            } else {
                format!(" ({})", child.age)
            };
            writeln!(out, "          - {}{}", child.name, age)?;
        }

        Ok(())
    }

    fn paint_row(&self, cells: Vec<String>, class: Option<Highlight>) -> Vec<String> {
        let Some(class) = class else {
            return cells;
        };
        let code = match class {
            Highlight::Today => &self.today_code,
            Highlight::Soon => &self.soon_code,
            Highlight::Past => &self.past_code,
        };
        cells.iter().map(|cell| self.paint(cell, code)).collect()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || text.is_empty() || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn kind_label(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Birthday => "birthday",
        EventKind::Anniversary => "anniversary",
        EventKind::Nameday { .. } => "nameday",
        EventKind::AggregatedNameday { .. } => "namedays",
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Highlight, Renderer, Row, strip_ansi};
    use crate::config::Config;
    use crate::datetime::DateFormat;
    use crate::event::{Anchor, AnnualEvent, EventKind};
    use crate::settings::{HighlightPolicy, ListSettings};

    fn anchor() -> Anchor {
        Anchor::new(NaiveDate::from_ymd_opt(2024, 6, 20).expect("today"), 2)
    }

    fn event(kind: EventKind, name: &str, m: u32, d: u32, year_known: bool) -> AnnualEvent {
        let source = NaiveDate::from_ymd_opt(1990, m, d).expect("date");
        AnnualEvent::new(kind, name, anchor().occurrence(source, year_known))
    }

    fn nameday(name: &str) -> AnnualEvent {
        event(EventKind::Nameday { aggregated: false }, name, 6, 24, false)
    }

    #[test]
    fn birthday_row_has_all_cells() {
        let row = Row::from_event(
            &event(EventKind::Birthday, "Jana", 6, 21, true),
            &DateFormat::new("dd.MM."),
        );
        assert_eq!(row.name, "Jana");
        assert_eq!(row.age, "34");
        assert_eq!(row.date, "21.06.");
        assert_eq!(row.when, "tomorrow");
        assert!(row.children.is_empty());
    }

    #[test]
    fn aggregate_row_counts_and_blanks_children() {
        let day = nameday("x");
        let populated =
            AnnualEvent::aggregate("Ján", day.occurrence, vec![nameday("Jan"), nameday("Janko")]);
        let row = Row::from_event(&populated, &DateFormat::new("MM-dd"));

        assert_eq!(row.name, "Ján (2)");
        assert_eq!(row.age, "");
        assert_eq!(row.date, "06-24");
        assert_eq!(row.when, "in 4 days");
        assert_eq!(row.children.len(), 2);
        assert_eq!(row.children[0].date, "");
        assert_eq!(row.children[0].when, "");

        let empty = AnnualEvent::aggregate("Ján", day.occurrence, vec![]);
        assert_eq!(Row::from_event(&empty, &DateFormat::new("MM-dd")).name, "Ján");
    }

    #[test]
    fn highlight_classes_follow_policy() {
        let policy = HighlightPolicy::default();
        let today = event(EventKind::Birthday, "a", 6, 20, true);
        let soon = event(EventKind::Birthday, "b", 6, 22, true);
        let later = event(EventKind::Birthday, "c", 6, 23, true);
        let past = event(EventKind::Birthday, "d", 6, 19, true);

        assert_eq!(Highlight::classify(&today, 2, &policy), Some(Highlight::Today));
        assert_eq!(Highlight::classify(&soon, 2, &policy), Some(Highlight::Soon));
        assert_eq!(Highlight::classify(&later, 2, &policy), None);
        assert_eq!(Highlight::classify(&past, 2, &policy), Some(Highlight::Past));

        let empty_soon = AnnualEvent::aggregate("x", soon.occurrence, vec![]);
        let empty_today = AnnualEvent::aggregate("x", today.occurrence, vec![]);
        assert_eq!(Highlight::classify(&empty_soon, 2, &policy), None);
        assert_eq!(Highlight::classify(&empty_today, 2, &policy), Some(Highlight::Today));
    }

    #[test]
    fn table_aligns_wide_names() {
        let mut cfg = Config::default();
        cfg.set("color", "off");
        let settings = ListSettings {
            date_format: DateFormat::new("MM-dd"),
            ..ListSettings::default()
        };
        let renderer = Renderer::new(&cfg, &settings).expect("renderer");

        let agg = AnnualEvent::aggregate("Ján", nameday("x").occurrence, vec![nameday("Žofia")]);
        let bday = event(EventKind::Birthday, "Al", 6, 21, true);
        let mut out = Vec::new();
        renderer
            .write_event_table(&mut out, &[&bday, &agg])
            .expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("Name "));
        assert!(lines[3].starts_with("Ján (1) "));
        assert!(lines[4].starts_with("  Žofia "));
        let width = |s: &str| unicode_width::UnicodeWidthStr::width(s.trim_end());
        assert!(width(lines[2]) <= width(lines[1]));
    }

    #[test]
    fn rejects_unknown_color_setting() {
        let mut cfg = Config::default();
        cfg.set("color", "sometimes");
        assert!(Renderer::new(&cfg, &ListSettings::default()).is_err());
    }

    #[test]
    fn strips_escape_sequences() {
        assert_eq!(strip_ansi("\x1b[1;31mhi\x1b[0m"), "hi");
    }
}
