use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::datetime::lenient_date;

/// Snapshot of one address-book contact, reduced to the fields the event
/// list needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventFact {
    pub name: String,

    #[serde(default)]
    pub nickname: Option<String>,

    #[serde(default, alias = "givenName")]
    pub given_name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, alias = "url")]
    pub homepage: Option<String>,

    #[serde(default, with = "lenient_date::option")]
    pub birthday: Option<NaiveDate>,

    #[serde(default, alias = "customDates", with = "lenient_date::map")]
    pub custom_dates: BTreeMap<String, NaiveDate>,

    #[serde(default, alias = "customFields")]
    pub custom_fields: BTreeMap<String, String>,

    #[serde(default)]
    pub categories: BTreeSet<String>,
}

impl EventFact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Name shown in the list: the nickname when enabled and non-empty.
    pub fn display_name(&self, prefer_nickname: bool) -> &str {
        match self.nickname.as_deref() {
            Some(nick) if prefer_nickname && !nick.trim().is_empty() => nick,
            _ => &self.name,
        }
    }

    /// First valid date stored under any of `keys`, tried in order.
    pub fn date_field<I, K>(&self, keys: I) -> Option<NaiveDate>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter().find_map(|key| {
            let key = key.as_ref();
            self.custom_dates.get(key).copied().or_else(|| {
                self.custom_fields
                    .get(key)
                    .and_then(|raw| lenient_date::parse(raw))
            })
        })
    }

    pub fn custom_field(&self, key: &str) -> Option<&str> {
        self.custom_fields.get(key).map(String::as_str)
    }
}
