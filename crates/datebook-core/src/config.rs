use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

const RC_ENV_VAR: &str = "DATEBOOKRC";
const RC_FILE_NAME: &str =
  ".datebookrc";

#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    for (key, value) in [
      (
        "contacts.location",
        "~/.datebook/contacts.jsonl"
      ),
      (
        "nameday.calendars",
        "~/.datebook/namedays"
      ),
      ("default.command", "list"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading datebookrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no datebookrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  /// Parses rc text without touching
  /// the filesystem; `include` lines
  /// are rejected.
  pub fn from_rc_text(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();
    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let Some(line) =
        strip_comment(raw_line)
      else {
        continue;
      };
      if line.starts_with("include ") {
        return Err(anyhow!(
          "include is not supported in \
           inline config (line {})",
          line_num + 1
        ));
      }
      let (key, value) =
        split_assignment(line)
          .ok_or_else(|| {
            anyhow!(
              "invalid config line {}: \
               {}",
              line_num + 1,
              raw_line
            )
          })?;
      cfg.map.insert(key, value);
    }
    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn set(
    &mut self,
    key: &str,
    value: &str
  ) {
    self.map.insert(
      key.to_string(),
      value.to_string()
    );
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "invalid boolean for {key}: \
             {v}"
          )
        })
      })
      .transpose()
  }

  pub fn get_u32(
    &self,
    key: &str
  ) -> anyhow::Result<Option<u32>> {
    self
      .map
      .get(key)
      .map(|v| {
        v.trim().parse::<u32>().with_context(
          || {
            format!(
              "invalid non-negative \
               number for {key}: {v}"
            )
          }
        )
      })
      .transpose()
  }

  pub fn get_path(
    &self,
    key: &str
  ) -> Option<PathBuf> {
    self
      .map
      .get(key)
      .map(|v| v.trim())
      .filter(|v| !v.is_empty())
      .map(|v| expand_tilde(Path::new(v)))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let Some(line) =
        strip_comment(raw_line)
      else {
        continue;
      };

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (key, value) =
        split_assignment(line)
          .ok_or_else(|| {
            anyhow!(
              "invalid config line \
               {}:{}: {}",
              path.display(),
              line_num + 1,
              raw_line
            )
          })?;

      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

fn strip_comment(
  raw_line: &str
) -> Option<&str> {
  let mut line = raw_line.trim();
  if let Some((before, _)) =
    line.split_once('#')
  {
    line = before.trim();
  }
  (!line.is_empty()).then_some(line)
}

fn split_assignment(
  line: &str
) -> Option<(String, String)> {
  let (k, v) = line.split_once('=')?;
  Some((
    k.trim().to_string(),
    v.trim().to_string()
  ))
}

#[tracing::instrument(skip(
  cfg,
  override_path
))]
pub fn resolve_contacts_path(
  cfg: &Config,
  override_path: Option<&Path>
) -> anyhow::Result<PathBuf> {
  if let Some(path) = override_path {
    return Ok(path.to_path_buf());
  }
  cfg
    .get_path("contacts.location")
    .ok_or_else(|| {
      anyhow!(
        "contacts.location is not set"
      )
    })
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

pub(crate) fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::Config;

  #[test]
  fn loads_includes_relative_to_file() {
    let dir = tempfile::tempdir()
      .expect("tempdir");
    fs::write(
      dir.path().join("extra.rc"),
      "threshold.event = 60\n"
    )
    .expect("write include");
    let main = dir.path().join("main.rc");
    fs::write(
      &main,
      "# comment\n\
       show.namedays = off # trailing\n\
       include extra.rc\n\
       include missing.rc\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(main.as_path()))
      .expect("load");
    assert_eq!(
      cfg.get_bool("show.namedays")
        .expect("bool"),
      Some(false)
    );
    assert_eq!(
      cfg.get_u32("threshold.event")
        .expect("number"),
      Some(60)
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides([(
      "rc.color".to_string(),
      "off".to_string()
    )]);
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
  }

  #[test]
  fn rejects_bad_lines_and_values() {
    assert!(
      Config::from_rc_text("no equals")
        .is_err()
    );
    let cfg = Config::from_rc_text(
      "threshold.past = -1\ncolor = maybe"
    )
    .expect("parse");
    assert!(
      cfg.get_u32("threshold.past")
        .is_err()
    );
    assert!(
      cfg.get_bool("color").is_err()
    );
  }
}
