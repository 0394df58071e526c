use std::collections::BTreeMap;
use std::sync::Arc;

use rl_types::RecordSchema;

use crate::error::{EngineError, EngineResult};
use crate::kinds;

/// Immutable-after-build map from kind tag to schema.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<RecordSchema>>,
}

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every builtin kind.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for schema in kinds::builtin() {
            registry
                .schemas
                .insert(schema.kind.clone(), Arc::new(schema));
        }
        registry
    }

    /// Add a kind. Re-registering an existing kind is a config error.
    pub fn register(&mut self, schema: RecordSchema) -> EngineResult<()> {
        if schema.kind.trim().is_empty() {
            return Err(EngineError::Config("record kind must not be empty".into()));
        }
        if schema.id_field.trim().is_empty() {
            return Err(EngineError::Config(format!(
                "kind {}: id field must not be empty",
                schema.kind
            )));
        }
        if self.schemas.contains_key(&schema.kind) {
            return Err(EngineError::Config(format!(
                "kind {} is already registered",
                schema.kind
            )));
        }
        self.schemas.insert(schema.kind.clone(), Arc::new(schema));
        Ok(())
    }

    pub fn get(&self, kind: &str) -> EngineResult<Arc<RecordSchema>> {
        self.schemas
            .get(kind)
            .cloned()
            .ok_or_else(|| EngineError::UnknownKind(kind.to_string()))
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &RecordSchema> {
        self.schemas.values().map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builtin_registry_knows_every_kind() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.len(), 7);
        assert!(registry.get("header").is_ok());
        assert!(registry.get("scrub_token").is_ok());
    }

    #[test]
    fn unknown_kind_is_tagged() {
        let err = SchemaRegistry::builtin().get("invoice").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKind);
    }

    #[test]
    fn register_rejects_clashes() {
        let mut registry = SchemaRegistry::builtin();
        let err = registry.register(RecordSchema::new("header")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        registry.register(RecordSchema::new("vendor")).unwrap();
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn register_rejects_blank_kind() {
        let mut registry = SchemaRegistry::empty();
        assert!(registry.register(RecordSchema::new(" ")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn kinds_are_sorted() {
        let registry = SchemaRegistry::builtin();
        let kinds: Vec<&str> = registry.kinds().collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }
}
