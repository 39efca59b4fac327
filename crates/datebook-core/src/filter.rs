use tracing::trace;

use crate::contact::EventFact;

/// Restricts the list to a subset of
/// contacts. At most one kind is
/// active.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContactFilter {
  #[default]
  Off,
  Category(String),
  CustomField {
    field: String,
    value: String
  },
  CustomFieldPrefix {
    prefix: String,
    value:  String
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
  Off,
  Category,
  CustomField,
  CustomFieldPrefix
}

impl FilterKind {
  pub fn parse(
    token: &str
  ) -> Option<Self> {
    match token
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "" | "off" | "none" => {
        Some(Self::Off)
      }
      | "category" => {
        Some(Self::Category)
      }
      | "field" | "custom"
      | "customfield" => {
        Some(Self::CustomField)
      }
      | "prefix" | "fieldprefix"
      | "customfieldprefix" => {
        Some(Self::CustomFieldPrefix)
      }
      | _ => None
    }
  }
}

impl ContactFilter {
  #[must_use]
  pub fn new(
    kind: FilterKind,
    field: &str,
    value: &str
  ) -> Self {
    match kind {
      | FilterKind::Off => Self::Off,
      | FilterKind::Category => {
        Self::Category(value.to_string())
      }
      | FilterKind::CustomField => {
        Self::CustomField {
          field: field.to_string(),
          value: value.to_string()
        }
      }
      | FilterKind::CustomFieldPrefix => {
        Self::CustomFieldPrefix {
          prefix: field.to_string(),
          value:  value.to_string()
        }
      }
    }
  }

  /// An empty field name or prefix
  /// matches nothing.
  #[must_use]
  pub fn matches(
    &self,
    fact: &EventFact
  ) -> bool {
    let ok = match self {
      | Self::Off => true,
      | Self::Category(value) => {
        fact.categories.contains(value)
      }
      | Self::CustomField {
        field,
        value
      } => {
        !field.is_empty()
          && fact.custom_field(field)
            == Some(value.as_str())
      }
      | Self::CustomFieldPrefix {
        prefix,
        value
      } => {
        !prefix.is_empty()
          && fact
            .custom_fields
            .iter()
            .any(|(key, v)| {
              key.starts_with(
                prefix.as_str()
              ) && v == value
            })
      }
    };
    trace!(contact = %fact.name, ok, "evaluated contact filter");
    ok
  }
}
