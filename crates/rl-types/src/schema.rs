use serde::{Deserialize, Serialize};

use crate::domain::EnumDomain;

/// Validation rule for a single field.
///
/// Predicates apply in a fixed order: presence, then integer, then domain
/// membership. An optional field that is empty passes without running the
/// remaining predicates; once non-empty it is checked like a mandatory one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub integer: bool,
    #[serde(default)]
    pub one_of: Option<EnumDomain>,
}

impl FieldRule {
    /// A field that must be present and non-empty.
    pub fn mandatory(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            optional: false,
            integer: false,
            one_of: None,
        }
    }

    /// A field that may be empty but is checked when present.
    pub fn optional(field: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::mandatory(field)
        }
    }

    /// Require the value to parse as a signed integer.
    pub fn integer(mut self) -> Self {
        self.integer = true;
        self
    }

    /// Require the value to be a member of `domain`.
    pub fn one_of(mut self, domain: EnumDomain) -> Self {
        self.one_of = Some(domain);
        self
    }
}

/// Names of the caller-supplied creation timestamp and the engine-maintained
/// update timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampFields {
    pub created: String,
    pub updated: String,
}

impl Default for TimestampFields {
    fn default() -> Self {
        Self {
            created: "createdAt".into(),
            updated: "updatedAt".into(),
        }
    }
}

/// Declarative description of one record kind.
///
/// A schema is immutable configuration: the engine builds one validator and
/// one manager per schema and never mutates it afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Kind tag persisted with every record of this schema.
    pub kind: String,
    /// Primary key field. Always mandatory and checked before `rules`.
    #[serde(default = "default_id_field")]
    pub id_field: String,
    /// Ordered validation rules; the first failure is reported.
    #[serde(default)]
    pub rules: Vec<FieldRule>,
    /// Fields a status update may overlay onto the stored record.
    #[serde(default)]
    pub mutable: Vec<String>,
    /// Alternate field that status updates may address records by.
    #[serde(default)]
    pub lookup: Option<String>,
    #[serde(default)]
    pub timestamps: TimestampFields,
}

fn default_id_field() -> String {
    "id".into()
}

impl RecordSchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id_field: default_id_field(),
            rules: Vec::new(),
            mutable: Vec::new(),
            lookup: None,
            timestamps: TimestampFields::default(),
        }
    }

    /// Append a rule. A rule for the id field is ignored since the id is
    /// always checked first.
    pub fn rule(mut self, rule: FieldRule) -> Self {
        if rule.field != self.id_field {
            self.rules.push(rule);
        }
        self
    }

    pub fn mutable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mutable = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn lookup(mut self, field: impl Into<String>) -> Self {
        self.lookup = Some(field.into());
        self
    }

    pub fn timestamps(mut self, created: impl Into<String>, updated: impl Into<String>) -> Self {
        self.timestamps = TimestampFields {
            created: created.into(),
            updated: updated.into(),
        };
        self
    }

    /// Upper-case tag used in event names (`scrub_token` -> `SCRUB_TOKEN`).
    pub fn event_tag(&self) -> String {
        self.kind
            .chars()
            .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect()
    }

    pub fn rule_for(&self, field: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.field == field)
    }

    pub fn is_mutable(&self, field: &str) -> bool {
        self.mutable.iter().any(|f| f == field)
    }

    /// Every field the schema names: id, rule fields, timestamps, and
    /// mutable fields, without duplicates.
    pub fn declared_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = vec![self.id_field.as_str()];
        let candidates = self
            .rules
            .iter()
            .map(|r| r.field.as_str())
            .chain([
                self.timestamps.created.as_str(),
                self.timestamps.updated.as_str(),
            ])
            .chain(self.mutable.iter().map(String::as_str))
            .chain(self.lookup.as_deref());
        for field in candidates {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}
