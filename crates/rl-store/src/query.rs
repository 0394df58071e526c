//! Selector queries over JSON values.
//!
//! The supported language is a subset of CouchDB Mango selectors:
//!
//! - implicit equality: `{"status": "A"}`
//! - dotted or nested paths: `{"owner.name": "x"}`, `{"owner": {"name": "x"}}`
//! - field operators: `$eq $ne $gt $gte $lt $lte $in $nin $exists $not`
//! - combinators: `$and $or $nor $not`
//!
//! A query document is either `{"selector": {...}, "limit": n, "skip": n}`
//! or a bare selector object.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Parsed query document.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDoc {
    pub selector: Selector,
    pub limit: Option<usize>,
    pub skip: usize,
}

impl QueryDoc {
    pub fn parse(query: &str) -> StoreResult<Self> {
        let value: Value =
            serde_json::from_str(query).map_err(|e| StoreError::InvalidQuery(e.to_string()))?;
        let Value::Object(mut doc) = value else {
            return Err(StoreError::InvalidQuery(
                "query must be a JSON object".into(),
            ));
        };

        if !doc.contains_key("selector") {
            return Ok(Self {
                selector: Selector::from_object(&doc)?,
                limit: None,
                skip: 0,
            });
        }

        let selector = match doc.remove("selector") {
            Some(Value::Object(sel)) => Selector::from_object(&sel)?,
            _ => {
                return Err(StoreError::InvalidQuery(
                    "'selector' must be an object".into(),
                ))
            }
        };
        let limit = match doc.remove("limit") {
            None => None,
            Some(v) => Some(as_count(&v, "limit")?),
        };
        let skip = match doc.remove("skip") {
            None => 0,
            Some(v) => as_count(&v, "skip")?,
        };
        // Index hints carry no meaning for this store.
        doc.remove("use_index");
        if let Some(key) = doc.keys().next() {
            return Err(StoreError::InvalidQuery(format!(
                "unsupported query field '{key}'"
            )));
        }

        Ok(Self {
            selector,
            limit,
            skip,
        })
    }
}

fn as_count(value: &Value, name: &str) -> StoreResult<usize> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| StoreError::InvalidQuery(format!("'{name}' must be a non-negative integer")))
}

/// A parsed selector.
#[derive(Clone, Debug, PartialEq)]
pub enum Selector {
    And(Vec<Selector>),
    Or(Vec<Selector>),
    Nor(Vec<Selector>),
    Not(Box<Selector>),
    Field {
        path: Vec<String>,
        condition: Condition,
    },
}

/// A condition on a single field value.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Not(Box<Condition>),
    All(Vec<Condition>),
}

impl Selector {
    /// Match-everything selector.
    pub fn all() -> Self {
        Self::And(Vec::new())
    }

    /// Parse a selector object.
    pub fn from_object(obj: &Map<String, Value>) -> StoreResult<Self> {
        Self::parse_object(obj, &[])
    }

    fn parse_object(obj: &Map<String, Value>, prefix: &[String]) -> StoreResult<Self> {
        let mut clauses = Vec::with_capacity(obj.len());
        for (key, value) in obj {
            clauses.push(Self::parse_entry(key, value, prefix)?);
        }
        Ok(if clauses.len() == 1 {
            clauses.remove(0)
        } else {
            Self::And(clauses)
        })
    }

    fn parse_entry(key: &str, value: &Value, prefix: &[String]) -> StoreResult<Self> {
        match key {
            "$and" => Ok(Self::And(Self::parse_list(key, value, prefix)?)),
            "$or" => Ok(Self::Or(Self::parse_list(key, value, prefix)?)),
            "$nor" => Ok(Self::Nor(Self::parse_list(key, value, prefix)?)),
            "$not" => match value {
                Value::Object(inner) => {
                    Ok(Self::Not(Box::new(Self::parse_object(inner, prefix)?)))
                }
                _ => Err(StoreError::InvalidQuery("'$not' takes an object".into())),
            },
            op if op.starts_with('$') => Err(StoreError::InvalidQuery(format!(
                "unsupported combinator '{op}'"
            ))),
            field => {
                let mut path = prefix.to_vec();
                path.extend(field.split('.').map(str::to_string));
                match value {
                    Value::Object(inner) if is_operator_object(inner) => Ok(Self::Field {
                        condition: Condition::parse(inner)?,
                        path,
                    }),
                    Value::Object(inner) if !inner.is_empty() => {
                        if inner.keys().any(|k| k.starts_with('$')) {
                            return Err(StoreError::InvalidQuery(format!(
                                "field '{field}' mixes operators and sub-fields"
                            )));
                        }
                        Self::parse_object(inner, &path)
                    }
                    other => Ok(Self::Field {
                        path,
                        condition: Condition::Eq(other.clone()),
                    }),
                }
            }
        }
    }

    fn parse_list(op: &str, value: &Value, prefix: &[String]) -> StoreResult<Vec<Self>> {
        let Value::Array(items) = value else {
            return Err(StoreError::InvalidQuery(format!("'{op}' takes an array")));
        };
        items
            .iter()
            .map(|item| match item {
                Value::Object(obj) => Self::parse_object(obj, prefix),
                _ => Err(StoreError::InvalidQuery(format!(
                    "'{op}' entries must be objects"
                ))),
            })
            .collect()
    }

    /// Evaluate the selector against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::And(clauses) => clauses.iter().all(|c| c.matches(doc)),
            Self::Or(clauses) => clauses.iter().any(|c| c.matches(doc)),
            Self::Nor(clauses) => !clauses.iter().any(|c| c.matches(doc)),
            Self::Not(inner) => !inner.matches(doc),
            Self::Field { path, condition } => condition.matches(resolve(doc, path)),
        }
    }
}

fn is_operator_object(obj: &Map<String, Value>) -> bool {
    !obj.is_empty() && obj.keys().all(|k| k.starts_with('$'))
}

impl Condition {
    fn parse(obj: &Map<String, Value>) -> StoreResult<Self> {
        let mut conditions = Vec::with_capacity(obj.len());
        for (op, arg) in obj {
            let condition = match op.as_str() {
                "$eq" => Self::Eq(arg.clone()),
                "$ne" => Self::Ne(arg.clone()),
                "$gt" => Self::Gt(arg.clone()),
                "$gte" => Self::Gte(arg.clone()),
                "$lt" => Self::Lt(arg.clone()),
                "$lte" => Self::Lte(arg.clone()),
                "$in" => Self::In(array_arg(op, arg)?),
                "$nin" => Self::Nin(array_arg(op, arg)?),
                "$exists" => match arg {
                    Value::Bool(b) => Self::Exists(*b),
                    _ => {
                        return Err(StoreError::InvalidQuery(
                            "'$exists' takes a boolean".into(),
                        ))
                    }
                },
                "$not" => match arg {
                    Value::Object(inner) if is_operator_object(inner) => {
                        Self::Not(Box::new(Self::parse(inner)?))
                    }
                    other => Self::Not(Box::new(Self::Eq(other.clone()))),
                },
                other => {
                    return Err(StoreError::InvalidQuery(format!(
                        "unsupported operator '{other}'"
                    )))
                }
            };
            conditions.push(condition);
        }
        Ok(if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::All(conditions)
        })
    }

    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Exists(expected) => value.is_some() == *expected,
            Self::Not(inner) => !inner.matches(value),
            Self::All(all) => all.iter().all(|c| c.matches(value)),
            _ => {
                // Every remaining operator requires the field to be present.
                let Some(v) = value else { return false };
                match self {
                    Self::Eq(expected) => json_eq(v, expected),
                    Self::Ne(expected) => !json_eq(v, expected),
                    Self::Gt(bound) => compare(v, bound) == Some(Ordering::Greater),
                    Self::Gte(bound) => matches!(
                        compare(v, bound),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    Self::Lt(bound) => compare(v, bound) == Some(Ordering::Less),
                    Self::Lte(bound) => {
                        matches!(compare(v, bound), Some(Ordering::Less | Ordering::Equal))
                    }
                    Self::In(options) => options.iter().any(|o| json_eq(v, o)),
                    Self::Nin(options) => !options.iter().any(|o| json_eq(v, o)),
                    Self::Exists(_) | Self::Not(_) | Self::All(_) => unreachable!(),
                }
            }
        }
    }
}

fn array_arg(op: &str, arg: &Value) -> StoreResult<Vec<Value>> {
    match arg {
        Value::Array(items) => Ok(items.clone()),
        _ => Err(StoreError::InvalidQuery(format!("'{op}' takes an array"))),
    }
}

fn resolve<'a>(doc: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        _ => None,
    })
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match compare(a, b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => a == b,
    }
}
