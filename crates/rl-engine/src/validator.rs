use std::sync::Arc;

use rl_types::{FieldRule, Record, RecordSchema};

/// Outcome of validating one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { field: String, reason: String },
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    fn fail(field: &str, reason: String) -> Self {
        Self::Fail {
            field: field.to_string(),
            reason,
        }
    }
}

/// Checks records against one kind's schema.
///
/// Rules run in declaration order with the id field first; the first
/// failing rule decides the verdict. Values are never corrected.
#[derive(Clone, Debug)]
pub struct RecordValidator {
    schema: Arc<RecordSchema>,
}

impl RecordValidator {
    pub fn new(schema: Arc<RecordSchema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn validate(&self, record: &Record) -> Verdict {
        let id_rule = FieldRule::mandatory(self.schema.id_field.as_str());
        std::iter::once(&id_rule)
            .chain(self.schema.rules.iter())
            .map(|rule| check_rule(rule, record))
            .find(|verdict| !verdict.is_pass())
            .unwrap_or(Verdict::Pass)
    }

    /// `(ok, reason)` form of [`Self::validate`]; `reason` is empty on pass.
    pub fn check(&self, record: &Record) -> (bool, String) {
        match self.validate(record) {
            Verdict::Pass => (true, String::new()),
            Verdict::Fail { reason, .. } => (false, reason),
        }
    }
}

fn check_rule(rule: &FieldRule, record: &Record) -> Verdict {
    let field = rule.field.as_str();
    let value = record.text_or_empty(field);

    if value.trim().is_empty() {
        return if rule.optional {
            Verdict::Pass
        } else {
            Verdict::fail(field, format!("{field} is mandatory"))
        };
    }

    if rule.integer && value.parse::<i64>().is_err() {
        return Verdict::fail(field, format!("{field} must be an integer, got '{value}'"));
    }

    if let Some(domain) = &rule.one_of {
        if !domain.contains(value) {
            return Verdict::fail(
                field,
                format!(
                    "{field} '{value}' is not a valid {}; expected one of {}",
                    domain.name(),
                    domain.values().join(", ")
                ),
            );
        }
    }

    Verdict::Pass
}
