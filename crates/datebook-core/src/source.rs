use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::contact::EventFact;

/// Anything that can hand over the current set of contacts.
pub trait ContactSource {
    fn contacts(&self) -> anyhow::Result<Vec<EventFact>>;
}

/// Contacts stored as a JSON array or as JSON lines.
#[derive(Debug, Clone)]
pub struct FileContactSource {
    pub path: PathBuf,
}

impl FileContactSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl ContactSource for FileContactSource {
    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    fn contacts(&self) -> anyhow::Result<Vec<EventFact>> {
        if !self.path.exists() {
            warn!(file = %self.path.display(), "contact file does not exist; no contacts");
            return Ok(vec![]);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        let facts = parse_contacts(&raw)
            .with_context(|| format!("failed loading contacts from {}", self.path.display()))?;

        info!(count = facts.len(), "loaded contacts");
        Ok(facts)
    }
}

impl ContactSource for Vec<EventFact> {
    fn contacts(&self) -> anyhow::Result<Vec<EventFact>> {
        Ok(self.clone())
    }
}

pub fn parse_contacts(raw: &str) -> anyhow::Result<Vec<EventFact>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(vec![]);
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed parsing JSON array");
    }

    let mut out = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() {
            continue;
        }
        let fact: EventFact = serde_json::from_str(token)
            .with_context(|| format!("failed parsing contact line {}", idx + 1))?;
        out.push(fact);
    }

    debug!(count = out.len(), "parsed contact lines");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::{ContactSource, FileContactSource, parse_contacts};

    #[test]
    fn reads_json_lines_and_skips_blanks() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"name": "Anna", "birthday": "1990-03-15"}}"#).expect("write");
        writeln!(file).expect("write");
        writeln!(file, r#"{{"name": "Boris"}}"#).expect("write");

        let facts = FileContactSource::new(file.path())
            .contacts()
            .expect("load contacts");
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[1].name, "Boris");
    }

    #[test]
    fn reads_json_array() {
        let facts = parse_contacts(r#"[{"name": "A"}, {"name": "B"}]"#).expect("parse");
        assert_eq!(facts.len(), 2);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FileContactSource::new(&dir.path().join("nope.jsonl"));
        assert!(source.contacts().expect("load").is_empty());
    }

    #[test]
    fn malformed_line_reports_position() {
        let err = parse_contacts("{\"name\": \"ok\"}\n{broken").expect_err("must fail");
        assert!(format!("{err:#}").contains("line 2"));
    }
}
