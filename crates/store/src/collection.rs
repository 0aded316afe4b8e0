//! Typed in-memory document collections.
//!
//! The document store proper is an external collaborator; this collection is
//! its in-process stand-in with the same narrow contract: CRUD by id, unique
//! indexes surfacing duplicate-key conflicts, and value-level queries driven
//! by [`QueryFeatures`].

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use trekly_core::{DomainError, DomainResult};

use crate::features::{Predicate, QueryFeatures};

/// A persisted entity.
///
/// `validate` runs before every insert and save (the before-persist
/// extension point); `apply_patch` implements the entity's partial-update
/// semantics for the generic update handler.
pub trait Document: Clone + Serialize + Send + Sync + 'static {
    /// Collection name, used in index and error messages.
    const NAME: &'static str;

    fn id(&self) -> Uuid;

    fn validate(&self) -> DomainResult<()>;

    /// Produce the updated document from a partial JSON patch.
    ///
    /// Implementations decide which fields are writable and must re-run
    /// validation on the merged result.
    fn apply_patch(&self, patch: &Map<String, Value>) -> DomainResult<Self>;
}

/// A unique constraint over a derived key.
///
/// Returning `None` exempts the document from the constraint (e.g. an unset
/// optional field).
pub struct UniqueIndex<T> {
    pub field: &'static str,
    pub key: fn(&T) -> Option<String>,
}

/// In-memory collection of one document type.
pub struct Collection<T: Document> {
    docs: RwLock<HashMap<Uuid, T>>,
    unique: Vec<UniqueIndex<T>>,
}

impl<T: Document> Collection<T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            unique: Vec::new(),
        }
    }

    pub fn with_unique(mut self, field: &'static str, key: fn(&T) -> Option<String>) -> Self {
        self.unique.push(UniqueIndex { field, key });
        self
    }

    /// Validate and insert a new document.
    pub fn insert(&self, doc: T) -> DomainResult<T> {
        doc.validate()?;
        let mut docs = self.write()?;
        self.check_unique(&docs, &doc)?;
        docs.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.docs.read().ok()?.get(&id).cloned()
    }

    /// Fetch by id or fail with the canonical not-found message.
    pub fn require(&self, id: Uuid) -> DomainResult<T> {
        self.get(id)
            .ok_or_else(|| DomainError::not_found("No document found with that ID"))
    }

    /// Apply a partial update, re-running validation and unique checks.
    pub fn update(&self, id: Uuid, patch: &Map<String, Value>) -> DomainResult<T> {
        let mut docs = self.write()?;
        let current = docs
            .get(&id)
            .ok_or_else(|| DomainError::not_found("No document found with that ID"))?;
        let updated = current.apply_patch(patch)?;
        self.check_unique_excluding(&docs, &updated, id)?;
        docs.insert(id, updated.clone());
        Ok(updated)
    }

    /// Persist a typed mutation of an existing document.
    ///
    /// Used where partial updates would bypass entity hooks (password
    /// changes, aggregate recomputes).
    pub fn save(&self, doc: T) -> DomainResult<T> {
        doc.validate()?;
        let mut docs = self.write()?;
        if !docs.contains_key(&doc.id()) {
            return Err(DomainError::not_found("No document found with that ID"));
        }
        self.check_unique_excluding(&docs, &doc, doc.id())?;
        docs.insert(doc.id(), doc.clone());
        Ok(doc)
    }

    pub fn remove(&self, id: Uuid) -> DomainResult<()> {
        let mut docs = self.write()?;
        docs.remove(&id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("No document found with that ID"))
    }

    pub fn all(&self) -> Vec<T> {
        self.docs
            .read()
            .map(|d| d.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First document satisfying a typed predicate.
    pub fn find_one(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.docs
            .read()
            .ok()?
            .values()
            .find(|doc| pred(doc))
            .cloned()
    }

    /// All documents satisfying a typed predicate.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.docs
            .read()
            .map(|docs| docs.values().filter(|d| pred(d)).cloned().collect())
            .unwrap_or_default()
    }

    /// Run a value-level query: scope predicates first (the before-query
    /// extension point: default listing exclusions, parent scoping), then the
    /// request's own features.
    pub fn query(&self, scope: &[Predicate], features: &QueryFeatures) -> Vec<Value> {
        let mut docs: Vec<Value> = self
            .all()
            .iter()
            .filter_map(|d| serde_json::to_value(d).ok())
            .collect();
        docs.retain(|doc| scope.iter().all(|p| p.matches(doc)));
        features.apply(docs)
    }

    fn check_unique(&self, docs: &HashMap<Uuid, T>, doc: &T) -> DomainResult<()> {
        self.check_unique_excluding(docs, doc, Uuid::nil())
    }

    fn check_unique_excluding(
        &self,
        docs: &HashMap<Uuid, T>,
        doc: &T,
        exclude: Uuid,
    ) -> DomainResult<()> {
        for index in &self.unique {
            let Some(key) = (index.key)(doc) else {
                continue;
            };
            let taken = docs
                .values()
                .any(|other| other.id() != exclude && (index.key)(other).as_deref() == Some(&key));
            if taken {
                return Err(DomainError::conflict(format!(
                    "{}.{} \"{}\"",
                    T::NAME,
                    index.field,
                    key
                )));
            }
        }
        Ok(())
    }

    fn write(&self) -> DomainResult<std::sync::RwLockWriteGuard<'_, HashMap<Uuid, T>>> {
        self.docs
            .write()
            .map_err(|_| DomainError::internal(format!("{} collection lock poisoned", T::NAME)))
    }
}

impl<T: Document> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        id: Uuid,
        name: String,
        price: i64,
        created_at: DateTime<Utc>,
    }

    impl Document for Widget {
        const NAME: &'static str = "widgets";

        fn id(&self) -> Uuid {
            self.id
        }

        fn validate(&self) -> DomainResult<()> {
            if self.name.is_empty() {
                return Err(DomainError::validation("A widget must have a name"));
            }
            Ok(())
        }

        fn apply_patch(&self, patch: &Map<String, Value>) -> DomainResult<Self> {
            let mut merged = serde_json::to_value(self)
                .map_err(|e| DomainError::internal(e.to_string()))?;
            let obj = merged.as_object_mut().expect("widget serializes to object");
            for (k, v) in patch {
                if k == "id" || k == "created_at" {
                    continue;
                }
                obj.insert(k.clone(), v.clone());
            }
            let updated: Widget = serde_json::from_value(merged)
                .map_err(|e| DomainError::validation(e.to_string()))?;
            updated.validate()?;
            Ok(updated)
        }
    }

    fn widget(name: &str, price: i64) -> Widget {
        Widget {
            id: Uuid::now_v7(),
            name: name.to_string(),
            price,
            created_at: Utc::now(),
        }
    }

    fn collection() -> Collection<Widget> {
        Collection::new().with_unique("name", |w: &Widget| Some(w.name.clone()))
    }

    #[test]
    fn insert_then_get() {
        let col = collection();
        let w = col.insert(widget("anvil", 10)).unwrap();
        assert_eq!(col.get(w.id).unwrap(), w);
    }

    #[test]
    fn insert_rejects_invalid_documents() {
        let col = collection();
        let err = col.insert(widget("", 10)).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(col.is_empty());
    }

    #[test]
    fn duplicate_unique_key_is_a_conflict() {
        let col = collection();
        col.insert(widget("anvil", 10)).unwrap();
        let err = col.insert(widget("anvil", 20)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_merges_patch_and_revalidates() {
        let col = collection();
        let w = col.insert(widget("anvil", 10)).unwrap();

        let mut patch = Map::new();
        patch.insert("price".into(), Value::from(25));
        let updated = col.update(w.id, &patch).unwrap();
        assert_eq!(updated.price, 25);
        assert_eq!(updated.name, "anvil");

        let mut bad = Map::new();
        bad.insert("name".into(), Value::from(""));
        assert!(matches!(
            col.update(w.id, &bad).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn update_missing_document_is_not_found() {
        let col = collection();
        let err = col.update(Uuid::now_v7(), &Map::new()).unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn update_may_keep_its_own_unique_key() {
        let col = collection();
        let w = col.insert(widget("anvil", 10)).unwrap();
        let mut patch = Map::new();
        patch.insert("name".into(), Value::from("anvil"));
        // Re-asserting the same name must not collide with itself.
        col.update(w.id, &patch).unwrap();
    }

    #[test]
    fn remove_then_require_is_not_found() {
        let col = collection();
        let w = col.insert(widget("anvil", 10)).unwrap();
        col.remove(w.id).unwrap();
        assert!(matches!(
            col.require(w.id).unwrap_err(),
            DomainError::NotFound(_)
        ));
        assert!(matches!(
            col.remove(w.id).unwrap_err(),
            DomainError::NotFound(_)
        ));
    }

    #[test]
    fn query_applies_scope_before_features() {
        let col = collection();
        col.insert(widget("anvil", 10)).unwrap();
        col.insert(widget("hammer", 99)).unwrap();
        col.insert(widget("chisel", 45)).unwrap();

        let scope = vec![Predicate {
            field: "price".into(),
            cmp: crate::features::Cmp::Gt,
            value: Value::from(20),
        }];
        let features = QueryFeatures::default();
        let out = col.query(&scope, &features);
        assert_eq!(out.len(), 2);
    }
}
