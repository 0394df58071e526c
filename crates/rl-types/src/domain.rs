use std::fmt;

use serde::{Deserialize, Serialize};

/// A named, closed set of allowed string values for a field.
///
/// Values keep their declaration order so that validation messages listing
/// the domain are deterministic. Domains are immutable once built and are
/// owned by the [`RecordSchema`](crate::RecordSchema) that declares them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDomain {
    name: String,
    values: Vec<String>,
}

impl EnumDomain {
    /// Build a domain from a name and its allowed values.
    ///
    /// Duplicate values are dropped, keeping the first occurrence.
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for value in values {
            let value = value.into();
            if !unique.contains(&value) {
                unique.push(value);
            }
        }
        Self {
            name: name.into(),
            values: unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Exact, case-sensitive membership test.
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for EnumDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{{}}}", self.name, self.values.join(", "))
    }
}
